//! System Configuration Module
//!
//! Deployment configuration comes from TOML with environment overrides,
//! so pipeline tunables are operator-settable instead of baked into the
//! binary.
//!
//! ## Loading Order
//!
//! 1. `STRANDS_CONFIG` environment variable (path to TOML file)
//! 2. `strands.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! `main` validates and installs the configuration once; after that any
//! module reads it through `config::get()`:
//!
//! ```ignore
//! // During startup:
//! config::init(SystemConfig::load());
//!
//! // Later, from any subsystem:
//! let deadline = config::get().controller.global_deadline_secs;
//! ```

pub mod defaults;
mod settings;
pub mod validation;

pub use settings::*;

use std::sync::OnceLock;

/// Process-wide configuration slot, filled once during startup.
static SYSTEM_CONFIG: OnceLock<SystemConfig> = OnceLock::new();

/// Install the configuration for the lifetime of the process.
///
/// Expected to run exactly once, before anything calls `get()`. A second
/// call keeps the first value and logs the attempt.
pub fn init(config: SystemConfig) {
    if SYSTEM_CONFIG.set(config).is_err() {
        tracing::warn!("duplicate config::init() call dropped; keeping the first configuration");
    }
}

/// Read the installed configuration.
///
/// Panics when startup never ran `init()`. Reaching this without a
/// configuration means the binary's boot sequence is broken, and there is
/// nothing sensible to fall back to.
#[allow(clippy::expect_used)]
pub fn get() -> &'static SystemConfig {
    SYSTEM_CONFIG
        .get()
        .expect("configuration read before startup installed it")
}

/// Whether `init()` has run. Lets tests and optional paths avoid the
/// panic in `get()`.
pub fn is_initialized() -> bool {
    SYSTEM_CONFIG.get().is_some()
}
