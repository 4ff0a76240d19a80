//! In-memory collaborators for tests and local hosts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;

use crate::action::Action;
use crate::traits::{Next, Store};

/// One observable side effect, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Dispatched(Action),
    Forwarded(Action),
}

/// In-memory store. Holds a state value, counts snapshot reads, and records
/// dispatched actions alongside anything its [`MemoryForwarder`] receives.
/// Thread-safe.
pub struct MemoryStore<S> {
    state: Mutex<S>,
    state_reads: AtomicUsize,
    log: Mutex<Vec<Recorded>>,
}

impl<S: Clone> MemoryStore<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            state_reads: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn set_state(&self, state: S) {
        *lock(&self.state) = state;
    }

    /// A next-stage forwarder that records into this store's log.
    pub fn forwarder(&self) -> MemoryForwarder<'_, S> {
        MemoryForwarder { store: self }
    }

    /// Everything recorded so far, in order.
    pub fn log(&self) -> Vec<Recorded> {
        lock(&self.log).clone()
    }

    pub fn dispatched(&self) -> Vec<Action> {
        lock(&self.log)
            .iter()
            .filter_map(|r| match r {
                Recorded::Dispatched(action) => Some(action.clone()),
                Recorded::Forwarded(_) => None,
            })
            .collect()
    }

    pub fn forwarded(&self) -> Vec<Action> {
        lock(&self.log)
            .iter()
            .filter_map(|r| match r {
                Recorded::Forwarded(action) => Some(action.clone()),
                Recorded::Dispatched(_) => None,
            })
            .collect()
    }

    pub fn state_reads(&self) -> usize {
        self.state_reads.load(Ordering::SeqCst)
    }

    /// Clear the log and the read counter. State is kept.
    pub fn reset(&self) {
        lock(&self.log).clear();
        self.state_reads.store(0, Ordering::SeqCst);
    }
}

impl<S: Clone> Store for MemoryStore<S> {
    type State = S;

    fn get_state(&self) -> S {
        self.state_reads.fetch_add(1, Ordering::SeqCst);
        lock(&self.state).clone()
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        lock(&self.log).push(Recorded::Dispatched(action));
        Ok(())
    }
}

/// Forwarder handed out by [`MemoryStore::forwarder`].
pub struct MemoryForwarder<'a, S> {
    store: &'a MemoryStore<S>,
}

impl<S> Next for MemoryForwarder<'_, S> {
    type Output = ();

    fn next(&self, action: Action) -> Result<()> {
        lock(&self.store.log).push(Recorded::Forwarded(action));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
