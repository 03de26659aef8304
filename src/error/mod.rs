//! Error handling for knapsack.
//!
//! Errors are grouped by the collaborator that raised them so that the export
//! task can decide what is fatal for a job and what is only worth a log line:
//! - [`SessionError`]: the archive session could not be opened, written or closed
//! - [`ClusterError`]: a settings, mapping, alias, search or scroll call failed
//! - [`RegistryError`]: the running-job registry could not be updated
//! - [`ConfigError`]: configuration could not be loaded or is invalid

pub mod kinds;

pub use kinds::{
    ClusterError, ConfigError, KnapsackError, RegistryError, Result, SessionError,
};
