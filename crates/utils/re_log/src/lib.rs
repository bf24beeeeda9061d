//! Text logging for the `LeRobot` tools.
//!
//! Libraries only use the macros re-exported here.
//! Binaries call `setup_logging` (feature `setup`) once at startup.
//!
//! * `trace`: spammy things
//! * `debug`: things that might be useful when debugging
//! * `info`: things that we want to show to users
//! * `warn`: problems that we can recover from
//! * `error`: problems that lead to loss of functionality or data
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

#[cfg(feature = "setup")]
mod setup;

pub use log::{Level, LevelFilter, debug, error, info, log_enabled, trace, warn};

#[cfg(feature = "setup")]
pub use self::setup::{default_log_filter, setup_logging};

/// Re-exports of other crates.
pub mod external {
    pub use log;
}

/// Crates that are so noisy that we turn them down to `warn` by default.
///
/// They can still be made more verbose by naming them explicitly in `RUST_LOG`.
pub const LOUD_CRATES: &[&str] = &[
    // These are quite spammy on debug, drowning out what we care about:
    "rustls",
    "ureq",
    "ureq_proto",
];
