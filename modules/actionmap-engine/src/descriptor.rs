//! Declarative routing rules for one inbound action kind.
//!
//! Whether a creator or predicate reads the state snapshot is decided when the
//! closure is registered (`creator` vs `creator_with_state`), never by
//! inspecting it at dispatch time.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::action::Action;

type StatelessCreator = dyn Fn(&Action, &[Value]) -> Result<Action> + Send + Sync;
type StatefulCreator<S> = dyn Fn(&Action, &[Value], &S) -> Result<Action> + Send + Sync;
type StatelessPredicate = dyn Fn(&Action) -> Result<bool> + Send + Sync;
type StatefulPredicate<S> = dyn Fn(&Action, &S) -> Result<bool> + Send + Sync;

/// Builds a derived action from the inbound one and the descriptor's args.
pub enum Creator<S> {
    Stateless(Arc<StatelessCreator>),
    Stateful(Arc<StatefulCreator<S>>),
}

impl<S> Creator<S> {
    pub fn needs_state(&self) -> bool {
        matches!(self, Self::Stateful(_))
    }
}

impl<S> Clone for Creator<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Stateless(f) => Self::Stateless(Arc::clone(f)),
            Self::Stateful(f) => Self::Stateful(Arc::clone(f)),
        }
    }
}

/// Decides whether a descriptor fires for a given action.
pub enum Predicate<S> {
    Stateless(Arc<StatelessPredicate>),
    Stateful(Arc<StatefulPredicate<S>>),
}

impl<S> Predicate<S> {
    pub fn needs_state(&self) -> bool {
        matches!(self, Self::Stateful(_))
    }
}

impl<S> Clone for Predicate<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Stateless(f) => Self::Stateless(Arc::clone(f)),
            Self::Stateful(f) => Self::Stateful(Arc::clone(f)),
        }
    }
}

/// How actions of one inbound kind are handled.
///
/// A descriptor needs an `out_kind` or a creator to be valid. Invalid
/// descriptors are dropped during normalization rather than rejected.
pub struct Descriptor<S> {
    pub(crate) out_kind: Option<String>,
    pub(crate) creator: Option<Creator<S>>,
    pub(crate) args: Vec<Value>,
    pub(crate) predicate: Option<Predicate<S>>,
    pub(crate) suppress: bool,
}

impl<S> Descriptor<S> {
    pub fn new() -> Self {
        Self {
            out_kind: None,
            creator: None,
            args: Vec::new(),
            predicate: None,
            suppress: false,
        }
    }

    /// Shorthand for a descriptor that only renames the action kind.
    pub fn rename(out_kind: impl Into<String>) -> Self {
        Self::new().out_kind(out_kind)
    }

    /// Literal output kind. Alongside a creator it overrides the kind the
    /// creator produced.
    pub fn out_kind(mut self, kind: impl Into<String>) -> Self {
        self.out_kind = Some(kind.into());
        self
    }

    pub fn creator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Action, &[Value]) -> Result<Action> + Send + Sync + 'static,
    {
        self.creator = Some(Creator::Stateless(Arc::new(f)));
        self
    }

    pub fn creator_with_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&Action, &[Value], &S) -> Result<Action> + Send + Sync + 'static,
    {
        self.creator = Some(Creator::Stateful(Arc::new(f)));
        self
    }

    /// Positional values handed to the creator after the action.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Action) -> Result<bool> + Send + Sync + 'static,
    {
        self.predicate = Some(Predicate::Stateless(Arc::new(f)));
        self
    }

    pub fn predicate_with_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&Action, &S) -> Result<bool> + Send + Sync + 'static,
    {
        self.predicate = Some(Predicate::Stateful(Arc::new(f)));
        self
    }

    /// Stop the original action from reaching the next stage.
    pub fn suppress(mut self, suppress: bool) -> Self {
        self.suppress = suppress;
        self
    }

    /// An empty `out_kind` counts as absent.
    pub fn is_valid(&self) -> bool {
        self.creator.is_some() || self.out_kind.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl<S> Default for Descriptor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for Descriptor<S> {
    fn clone(&self) -> Self {
        Self {
            out_kind: self.out_kind.clone(),
            creator: self.creator.clone(),
            args: self.args.clone(),
            predicate: self.predicate.clone(),
            suppress: self.suppress,
        }
    }
}

impl<S> fmt::Debug for Descriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("out_kind", &self.out_kind)
            .field("creator", &self.creator.as_ref().map(Creator::needs_state))
            .field("args", &self.args)
            .field("predicate", &self.predicate.as_ref().map(Predicate::needs_state))
            .field("suppress", &self.suppress)
            .finish()
    }
}

/// A routing-table entry: one descriptor, or several applied in order.
#[derive(Debug, Clone)]
pub enum Entry<S> {
    Single(Descriptor<S>),
    Multi(Vec<Descriptor<S>>),
}

impl<S> From<Descriptor<S>> for Entry<S> {
    fn from(descriptor: Descriptor<S>) -> Self {
        Self::Single(descriptor)
    }
}

impl<S> From<Vec<Descriptor<S>>> for Entry<S> {
    fn from(descriptors: Vec<Descriptor<S>>) -> Self {
        Self::Multi(descriptors)
    }
}

impl<S, const N: usize> From<[Descriptor<S>; N]> for Entry<S> {
    fn from(descriptors: [Descriptor<S>; N]) -> Self {
        Self::Multi(descriptors.into())
    }
}
