//! Persistent action state consulted by status checks.
//!
//! This is the record of which version of each action last ran
//! successfully. Scheduler state is never persisted.

pub mod version_store;

pub use version_store::{
    FileVersionStore, MemoryVersionStore, VERSION_FILE_PATH, VersionRecord, VersionStore,
    store_for_mode,
};
