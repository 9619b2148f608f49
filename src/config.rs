//! Runtime configuration threaded explicitly through the verification engine.
//!
//! Nothing here is read from ambient globals or environment variables; callers build a
//! `CoreConfig` and pass it to the entry points that need it (loading a file, parsing a CLI
//! flag, or wiring up defaults is left to the embedding application).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hash::HashKind;

/// Source of the wall-clock time used to evaluate expiry on root-of-trust metadata and
/// attestations. `System` is the default; `Fixed` lets tests and replay tooling pin "now" to a
/// specific instant so verification is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockSource {
    System,
    Fixed(i64),
}

impl Default for ClockSource {
    fn default() -> Self {
        ClockSource::System
    }
}

impl ClockSource {
    /// Current time as a Unix timestamp, per this clock source.
    pub fn now(&self) -> i64 {
        match self {
            ClockSource::System => chrono::Utc::now().timestamp(),
            ClockSource::Fixed(ts) => *ts,
        }
    }
}

/// Crate-wide configuration for the reference state log, policy engine, and verification engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Hash algorithm new objects are created with. Existing objects are read back at whatever
    /// width they were written, regardless of this setting.
    pub hash_kind: HashKind,

    /// Relaxes signature-count enforcement to a warning instead of a hard rejection. Mirrors
    /// upstream's "developer mode" escape hatch for local iteration; off by default so library
    /// consumers get strict enforcement unless they opt in.
    pub developer_mode: bool,

    /// Overrides the expected Sigstore trust root, for environments pinning a non-default
    /// transparency log. `None` uses whatever the embedding application's default is.
    pub sigstore_root_override: Option<PathBuf>,

    /// Clock used to evaluate metadata and attestation expiry.
    pub clock: ClockSource,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            hash_kind: HashKind::default(),
            developer_mode: false,
            sigstore_root_override: None,
            clock: ClockSource::default(),
        }
    }
}
