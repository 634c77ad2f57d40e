//! Capability contracts for the calculator's external collaborators.
//!
//! Wire formats belong to the remote services; the calculator only depends
//! on these traits. [`memory`] provides in-process implementations used by
//! tests and the offline replay binary.

pub mod environment;
pub mod event_counter;
pub mod experiment;
pub mod memory;
pub mod storage;

pub use environment::{EnvironmentClient, EnvironmentPage};
pub use event_counter::{CountQuery, EventCounterClient};
pub use experiment::{ExperimentClient, ExperimentPage, ListExperimentsRequest};
pub use storage::ResultStorage;
