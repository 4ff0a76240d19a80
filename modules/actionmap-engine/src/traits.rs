//! Collaborator contracts for the host pipeline.

use std::sync::Arc;

use anyhow::Result;

use crate::action::Action;

/// The host's store: a state snapshot accessor plus a dispatch sink.
///
/// `get_state` may be expensive. The mediator calls it at most once per
/// inbound action, and not at all when no step reads state.
pub trait Store {
    type State;

    fn get_state(&self) -> Self::State;

    /// Emit a derived action. Must complete before the mediator moves on.
    fn dispatch(&self, action: Action) -> Result<()>;
}

/// The next pipeline stage. Receives the original, unmodified action.
pub trait Next {
    type Output;

    fn next(&self, action: Action) -> Result<Self::Output>;
}

impl<F, O> Next for F
where
    F: Fn(Action) -> Result<O>,
{
    type Output = O;

    fn next(&self, action: Action) -> Result<O> {
        self(action)
    }
}

// ---------------------------------------------------------------------------
// Reference blankets — let tests keep a handle on the store for assertions
// ---------------------------------------------------------------------------

impl<T: Store + ?Sized> Store for &T {
    type State = T::State;

    fn get_state(&self) -> Self::State {
        (**self).get_state()
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        (**self).dispatch(action)
    }
}

impl<T: Store + ?Sized> Store for Arc<T> {
    type State = T::State;

    fn get_state(&self) -> Self::State {
        (**self).get_state()
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        (**self).dispatch(action)
    }
}
