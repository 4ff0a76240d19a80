//! Action mediation for unidirectional data-flow pipelines.
//!
//! A [`Mediator`] sits between a host's dispatch and its next stage. For each
//! inbound action it looks up the action's kind in a static [`RoutingTable`],
//! emits zero or more derived actions to the host [`Store`], then forwards the
//! original to the [`Next`] stage unless a matching entry suppresses it.
//!
//! Routing entries are [`Descriptor`]s, normalized once into resolved steps.
//! The store's state snapshot is read at most once per action, and only when
//! some step of the entry was registered as reading it.

pub mod action;
pub mod descriptor;
pub mod error;
pub mod mediator;
pub mod memory;
pub mod step;
pub mod table;
pub mod traits;

pub use action::{Action, KIND_FIELD};
pub use descriptor::{Creator, Descriptor, Entry, Predicate};
pub use error::MediatorError;
pub use mediator::{Handler, Mediator, Stage};
pub use memory::{MemoryForwarder, MemoryStore, Recorded};
pub use step::{normalize, Plan, ResolvedStep};
pub use table::{DescriptorConfig, EntryConfig, RoutingTable, RoutingTableBuilder, TableConfig};
pub use traits::{Next, Store};
