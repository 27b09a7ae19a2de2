//! Decision engine - fuse specialist evidence into one graded decision

mod engine;
pub mod policy;
mod strategy;

pub use engine::DecisionEngine;
pub use policy::ThresholdPolicy;
pub use strategy::{ConfidenceStrategy, WeightedScore};

use crate::types::AutomationLevel;

/// Parse the configured default automation level; validation guarantees
/// one of the three names.
pub fn automation_from_name(name: &str) -> AutomationLevel {
    match name.to_uppercase().as_str() {
        "FULL" => AutomationLevel::Full,
        "MANUAL" => AutomationLevel::Manual,
        _ => AutomationLevel::Assisted,
    }
}
