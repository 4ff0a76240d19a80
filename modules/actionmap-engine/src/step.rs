//! Normalization of descriptors into executable steps.

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::action::Action;
use crate::descriptor::{Creator, Descriptor, Entry, Predicate};

enum Build<S> {
    /// Shallow copy of the inbound action under a new kind.
    Rename(String),
    Create {
        creator: Creator<S>,
        args: Vec<Value>,
        out_kind: Option<String>,
    },
}

/// The executable form of a valid [`Descriptor`].
pub struct ResolvedStep<S> {
    build: Build<S>,
    predicate: Option<Predicate<S>>,
    needs_state: bool,
    suppress: bool,
}

impl<S> ResolvedStep<S> {
    /// Returns `None` for descriptors with neither an output kind nor a creator.
    pub fn resolve(descriptor: Descriptor<S>) -> Option<Self> {
        let out_kind = descriptor.out_kind.filter(|k| !k.is_empty());
        let build = match (descriptor.creator, out_kind) {
            (Some(creator), out_kind) => Build::Create {
                creator,
                args: descriptor.args,
                out_kind,
            },
            (None, Some(kind)) => Build::Rename(kind),
            (None, None) => return None,
        };

        let creator_needs_state = match &build {
            Build::Create { creator, .. } => creator.needs_state(),
            Build::Rename(_) => false,
        };
        let predicate_needs_state = descriptor
            .predicate
            .as_ref()
            .is_some_and(Predicate::needs_state);

        Some(Self {
            build,
            predicate: descriptor.predicate,
            needs_state: creator_needs_state || predicate_needs_state,
            suppress: descriptor.suppress,
        })
    }

    pub fn needs_state(&self) -> bool {
        self.needs_state
    }

    pub fn suppress(&self) -> bool {
        self.suppress
    }

    /// Evaluate the guard. Steps without a predicate always fire.
    pub fn test(&self, action: &Action, state: Option<&S>) -> Result<bool> {
        match &self.predicate {
            None => Ok(true),
            Some(Predicate::Stateless(f)) => f(action),
            Some(Predicate::Stateful(f)) => f(action, require_state(state)?),
        }
    }

    /// Construct the derived action. The inbound action is never mutated.
    pub fn build(&self, action: &Action, state: Option<&S>) -> Result<Action> {
        match &self.build {
            Build::Rename(kind) => Ok(action.with_kind(kind.as_str())),
            Build::Create {
                creator,
                args,
                out_kind,
            } => {
                let derived = match creator {
                    Creator::Stateless(f) => f(action, args)?,
                    Creator::Stateful(f) => f(action, args, require_state(state)?)?,
                };
                Ok(match out_kind {
                    Some(kind) => derived.into_kind(kind.as_str()),
                    None => derived,
                })
            }
        }
    }
}

fn require_state<S>(state: Option<&S>) -> Result<&S> {
    state.ok_or_else(|| anyhow!("step declared a state dependency but no snapshot was taken"))
}

/// Turn a raw table entry into its ordered steps, dropping invalid descriptors.
pub fn normalize<S>(entry: Entry<S>) -> Vec<ResolvedStep<S>> {
    match entry {
        Entry::Single(descriptor) => ResolvedStep::resolve(descriptor).into_iter().collect(),
        Entry::Multi(descriptors) => descriptors
            .into_iter()
            .filter_map(ResolvedStep::resolve)
            .collect(),
    }
}

/// The resolved plan for one action kind, with flags aggregated up front.
pub enum Plan<S> {
    Single(ResolvedStep<S>),
    Multi {
        steps: Vec<ResolvedStep<S>>,
        needs_state: bool,
        suppress: bool,
    },
}

impl<S> Plan<S> {
    /// `None` when no valid step survived normalization.
    pub fn from_entry(entry: Entry<S>) -> Option<Self> {
        let mut steps = normalize(entry);
        match steps.len() {
            0 => None,
            1 => steps.pop().map(Self::Single),
            _ => Some(Self::Multi {
                needs_state: steps.iter().any(ResolvedStep::needs_state),
                suppress: steps.iter().any(ResolvedStep::suppress),
                steps,
            }),
        }
    }

    pub fn steps(&self) -> &[ResolvedStep<S>] {
        match self {
            Self::Single(step) => std::slice::from_ref(step),
            Self::Multi { steps, .. } => steps,
        }
    }

    /// True if any step reads state, whether or not its predicate fires.
    pub fn needs_state(&self) -> bool {
        match self {
            Self::Single(step) => step.needs_state(),
            Self::Multi { needs_state, .. } => *needs_state,
        }
    }

    /// True if any step suppresses forwarding, whether or not its predicate fires.
    pub fn suppress(&self) -> bool {
        match self {
            Self::Single(step) => step.suppress(),
            Self::Multi { suppress, .. } => *suppress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type D = Descriptor<u32>;

    fn input() -> Action {
        Action::new("A.in").with("src", "foo").with("dst", "bar")
    }

    #[test]
    fn invalid_descriptor_resolves_to_nothing() {
        assert!(ResolvedStep::resolve(D::new().suppress(true)).is_none());
        assert!(ResolvedStep::resolve(D::new().out_kind("")).is_none());
        assert!(ResolvedStep::resolve(D::new().args([1, 2])).is_none());
    }

    #[test]
    fn normalize_drops_invalid_and_keeps_order() {
        let steps = normalize(Entry::Multi(vec![
            D::rename("first"),
            D::new(),
            D::rename("second"),
        ]));
        assert_eq!(steps.len(), 2);

        let kinds: Vec<String> = steps
            .iter()
            .map(|s| s.build(&input(), None).unwrap().kind().to_string())
            .collect();
        assert_eq!(kinds, ["first", "second"]);
    }

    #[test]
    fn single_entry_normalizes_to_one_step() {
        assert_eq!(normalize(Entry::from(D::rename("out"))).len(), 1);
        assert!(normalize(Entry::from(D::new())).is_empty());
    }

    #[test]
    fn needs_state_follows_registered_closures() {
        let plain = ResolvedStep::resolve(D::rename("out")).unwrap();
        assert!(!plain.needs_state());

        let stateless = ResolvedStep::resolve(
            D::new()
                .creator(|a, _| Ok(a.with_kind("out")))
                .predicate(|_| Ok(true)),
        )
        .unwrap();
        assert!(!stateless.needs_state());

        let stateful_creator =
            ResolvedStep::resolve(D::new().creator_with_state(|a, _, _s| Ok(a.with_kind("out"))))
                .unwrap();
        assert!(stateful_creator.needs_state());

        let stateful_predicate =
            ResolvedStep::resolve(D::rename("out").predicate_with_state(|_, s| Ok(*s > 0)))
                .unwrap();
        assert!(stateful_predicate.needs_state());
    }

    #[test]
    fn rename_copies_every_other_field() {
        let step = ResolvedStep::resolve(D::rename("A.out")).unwrap();
        let derived = step.build(&input(), None).unwrap();
        assert_eq!(
            derived.into_value(),
            json!({ "kind": "A.out", "src": "foo", "dst": "bar" })
        );
    }

    #[test]
    fn creator_receives_args_in_order() {
        let step = ResolvedStep::resolve(
            D::new()
                .creator(|a, args| {
                    Ok(Action::new("built")
                        .with("args", args.to_vec())
                        .with("src", a.get("src").cloned().unwrap_or_default()))
                })
                .args([1, 2, 3]),
        )
        .unwrap();
        let derived = step.build(&input(), None).unwrap();
        assert_eq!(
            derived.into_value(),
            json!({ "kind": "built", "args": [1, 2, 3], "src": "foo" })
        );
    }

    #[test]
    fn out_kind_overrides_creator_kind() {
        let step = ResolvedStep::resolve(
            D::new()
                .out_kind("forced")
                .creator(|_, _| Ok(Action::new("ignored").with("x", 1))),
        )
        .unwrap();
        let derived = step.build(&input(), None).unwrap();
        assert_eq!(derived.into_value(), json!({ "kind": "forced", "x": 1 }));
    }

    #[test]
    fn stateful_creator_sees_snapshot() {
        let step = ResolvedStep::resolve(
            D::new().creator_with_state(|_, _, s: &u32| Ok(Action::new("out").with("seen", *s))),
        )
        .unwrap();
        let derived = step.build(&input(), Some(&42)).unwrap();
        assert_eq!(derived.get("seen"), Some(&json!(42)));
    }

    #[test]
    fn stateful_step_without_snapshot_errors() {
        let step =
            ResolvedStep::resolve(D::rename("out").predicate_with_state(|_, s| Ok(*s > 0)))
                .unwrap();
        assert!(step.test(&input(), None).is_err());
    }

    #[test]
    fn missing_predicate_always_fires() {
        let step = ResolvedStep::resolve(D::rename("out")).unwrap();
        assert!(step.test(&input(), None).unwrap());
    }

    #[test]
    fn plan_aggregates_flags_across_steps() {
        let plan = Plan::from_entry(Entry::Multi(vec![
            D::rename("one").predicate(|_| Ok(false)),
            D::rename("two").suppress(true),
            D::rename("three").predicate_with_state(|_, _| Ok(false)),
        ]))
        .unwrap();
        assert_eq!(plan.steps().len(), 3);
        assert!(plan.needs_state());
        assert!(plan.suppress());
    }

    #[test]
    fn plan_is_absent_when_nothing_is_valid() {
        assert!(Plan::<u32>::from_entry(Entry::Multi(vec![D::new(), D::new()])).is_none());
        assert!(Plan::<u32>::from_entry(Entry::Multi(Vec::new())).is_none());
    }
}
