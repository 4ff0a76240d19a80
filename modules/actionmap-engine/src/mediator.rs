//! The mediation stage.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, trace};

use crate::action::Action;
use crate::table::RoutingTable;
use crate::traits::{Next, Store};

/// Routes inbound actions through a fixed [`RoutingTable`].
///
/// table → bind(store) → then(next) → handle(action).
/// Each matching step emits its derived action to the store in declared
/// order; the original is forwarded afterwards unless a step suppresses it.
pub struct Mediator<S> {
    table: Arc<RoutingTable<S>>,
}

impl<S> Mediator<S> {
    pub fn new(table: RoutingTable<S>) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &RoutingTable<S> {
        &self.table
    }

    /// Bind to the host's store.
    pub fn bind<St>(&self, store: St) -> Stage<S, St>
    where
        St: Store<State = S>,
    {
        Stage {
            table: Arc::clone(&self.table),
            store,
        }
    }
}

impl<S> Clone for Mediator<S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<S> From<RoutingTable<S>> for Mediator<S> {
    fn from(table: RoutingTable<S>) -> Self {
        Self::new(table)
    }
}

/// A mediator bound to a store, waiting for its next stage.
pub struct Stage<S, St> {
    table: Arc<RoutingTable<S>>,
    store: St,
}

impl<S, St> Stage<S, St>
where
    St: Store<State = S>,
{
    pub fn then<N: Next>(self, next: N) -> Handler<S, St, N> {
        Handler {
            table: self.table,
            store: self.store,
            next,
        }
    }
}

impl<S, St: Clone> Clone for Stage<S, St> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            store: self.store.clone(),
        }
    }
}

/// The per-action handler. Holds no mutable state between calls.
pub struct Handler<S, St, N> {
    table: Arc<RoutingTable<S>>,
    store: St,
    next: N,
}

impl<S, St, N> Handler<S, St, N>
where
    St: Store<State = S>,
    N: Next,
{
    /// Mediate one action.
    ///
    /// Returns the next stage's output, or `None` when the action was
    /// suppressed. A failing creator, predicate, dispatch or forward aborts
    /// the call: later steps do not run and nothing is forwarded.
    pub fn handle(&self, action: Action) -> Result<Option<N::Output>> {
        let Some(plan) = self.table.plan(action.kind()) else {
            trace!(kind = action.kind(), "No route, forwarding");
            return self.next.next(action).map(Some);
        };

        // One snapshot per action, shared by every step that reads state.
        let snapshot = plan.needs_state().then(|| self.store.get_state());

        let mut emitted = 0usize;
        for step in plan.steps() {
            let state = if step.needs_state() {
                snapshot.as_ref()
            } else {
                None
            };

            if !step.test(&action, state)? {
                continue;
            }

            let derived = step.build(&action, state)?;
            trace!(
                kind = action.kind(),
                derived = derived.kind(),
                "Dispatching derived action"
            );
            self.store.dispatch(derived)?;
            emitted += 1;
        }

        debug!(
            kind = action.kind(),
            steps = plan.steps().len(),
            emitted,
            read_state = snapshot.is_some(),
            suppressed = plan.suppress(),
            "Mediated action"
        );

        if plan.suppress() {
            return Ok(None);
        }
        self.next.next(action).map(Some)
    }
}

/// A handler is itself a valid next stage, so mediators chain.
impl<S, St, N> Next for Handler<S, St, N>
where
    St: Store<State = S>,
    N: Next,
{
    type Output = Option<N::Output>;

    fn next(&self, action: Action) -> Result<Self::Output> {
        self.handle(action)
    }
}
