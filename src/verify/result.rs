//! Outcome types for the Verification Engine (§4.4): either every transition in the requested
//! range was authorized, or the first offending transition is named along with why.

use crate::hash::ObjectHash;

/// What matched and rejected a transition: a namespace-scoped delegation rule, or a
/// repository-wide global rule (§3 "Global rule").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailingConstraint {
    /// A delegation rule named `rule_name` in the rule file named `rule_file`.
    Rule { rule_file: String, rule_name: String },
    /// A global threshold rule declared in the root.
    GlobalThreshold { pattern: String },
    /// A global force-push-blocking rule declared in the root.
    GlobalBlockForcePush { pattern: String },
}

/// §4.4.2: every rejected result identifies the first failing entry, the rule that failed, the
/// namespace that triggered it, and the signers that were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub failing_entry: ObjectHash,
    pub constraint: FailingConstraint,
    pub namespace: String,
    pub signers_found: Vec<String>,
    pub reason: String,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entry {} rejected at namespace {:?} ({:?}): {} (signers found: {:?})",
            self.failing_entry, self.namespace, self.constraint, self.reason, self.signers_found
        )
    }
}

/// Outcome of a single call to [`crate::verify::engine::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Every transition in the requested range was authorized. Carries the RSL entry hashes
    /// consumed, oldest first, so the caller can cache or display the verified chain.
    Verified { entries_consumed: Vec<ObjectHash> },
    Rejected(Rejection),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }
}
