//! The routing table: action kind → resolved plan, built once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::descriptor::{Descriptor, Entry};
use crate::error::MediatorError;
use crate::step::Plan;

/// Immutable mapping from inbound kind to its plan.
///
/// Kinds whose entries hold no valid descriptor are not stored, so they behave
/// exactly like kinds that were never routed.
pub struct RoutingTable<S> {
    plans: HashMap<String, Plan<S>>,
}

impl<S> RoutingTable<S> {
    pub fn builder() -> RoutingTableBuilder<S> {
        RoutingTableBuilder {
            entries: Vec::new(),
        }
    }

    pub fn plan(&self, kind: &str) -> Option<&Plan<S>> {
        self.plans.get(kind)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.plans.keys().map(String::as_str)
    }

    /// Build from declarative routing data (see [`EntryConfig`]).
    pub fn from_config(config: TableConfig) -> Self {
        config
            .into_iter()
            .map(|(kind, entry)| (kind, Entry::<S>::from(entry)))
            .collect()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, MediatorError> {
        let config: TableConfig =
            toml::from_str(raw).map_err(|e| MediatorError::Config(e.to_string()))?;
        Ok(Self::from_config(config))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, MediatorError> {
        let config: TableConfig =
            serde_json::from_str(raw).map_err(|e| MediatorError::Config(e.to_string()))?;
        Ok(Self::from_config(config))
    }
}

impl<S> Default for RoutingTable<S> {
    fn default() -> Self {
        Self {
            plans: HashMap::new(),
        }
    }
}

impl<S> fmt::Debug for RoutingTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("RoutingTable").field("kinds", &kinds).finish()
    }
}

impl<S, K, E> FromIterator<(K, E)> for RoutingTable<S>
where
    K: Into<String>,
    E: Into<Entry<S>>,
{
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::builder(), |builder, (kind, entry)| {
                builder.route(kind, entry)
            })
            .build()
    }
}

pub struct RoutingTableBuilder<S> {
    entries: Vec<(String, Entry<S>)>,
}

impl<S> RoutingTableBuilder<S> {
    /// Route `kind` to one descriptor or an ordered list of them.
    /// Routing the same kind twice keeps the later entry.
    pub fn route(mut self, kind: impl Into<String>, entry: impl Into<Entry<S>>) -> Self {
        self.entries.push((kind.into(), entry.into()));
        self
    }

    pub fn build(self) -> RoutingTable<S> {
        let mut plans = HashMap::with_capacity(self.entries.len());
        for (kind, entry) in self.entries {
            match Plan::from_entry(entry) {
                Some(plan) => {
                    if plans.insert(kind.clone(), plan).is_some() {
                        warn!(kind = %kind, "Routing entry replaced an earlier one");
                    }
                }
                None => {
                    // A later empty entry still shadows an earlier valid one.
                    if plans.remove(&kind).is_some() {
                        warn!(kind = %kind, "Routing entry replaced an earlier one");
                    }
                    debug!(kind = %kind, "No valid descriptors, kind passes through");
                }
            }
        }
        RoutingTable { plans }
    }
}

// ---------------------------------------------------------------------------
// Declarative routing data
// ---------------------------------------------------------------------------

/// A descriptor expressible in data. Creators and predicates are code and
/// can only be attached through [`Descriptor`]'s builder, so creator `args`
/// and unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorConfig {
    #[serde(default, alias = "type")]
    pub out_kind: Option<String>,
    #[serde(default)]
    pub suppress: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryConfig {
    Multi(Vec<DescriptorConfig>),
    Single(DescriptorConfig),
}

/// Kind → entry, as read from TOML or JSON.
pub type TableConfig = BTreeMap<String, EntryConfig>;

impl<S> From<DescriptorConfig> for Descriptor<S> {
    fn from(config: DescriptorConfig) -> Self {
        let descriptor = Descriptor::new().suppress(config.suppress);
        match config.out_kind {
            Some(kind) => descriptor.out_kind(kind),
            None => descriptor,
        }
    }
}

impl<S> From<EntryConfig> for Entry<S> {
    fn from(config: EntryConfig) -> Self {
        match config {
            EntryConfig::Single(d) => Entry::Single(d.into()),
            EntryConfig::Multi(ds) => Entry::Multi(ds.into_iter().map(Into::into).collect()),
        }
    }
}
