//! Playbook library - versioned remediation recipes with lifecycle
//! governance and self-updating execution statistics

mod lifecycle;
mod store;
mod version;

pub use lifecycle::{next_status, LifecycleAction};
pub use store::{PlaybookStore, StoreError};
pub use version::{classify_change, VersionBump};
