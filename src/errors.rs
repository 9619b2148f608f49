//! Error types for the policy-ledger crate.
//!
//! This module defines a unified error enumeration used across the object model, the
//! object store, the metadata layer, the reference state log, and the verification
//! engine. It integrates with `thiserror` to provide rich `Display` implementations and
//! error source chaining where applicable.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - Propagation policy (spec §7): I/O errors from the object store surface unchanged;
//!   cryptographic failures and invariant violations are never recovered locally.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the policy-ledger library.
pub enum CoreError {
    /// Object, RSL entry, or reference missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying object bytes could not be parsed as the requested type.
    #[error("corrupt object {0}: {1}")]
    CorruptObject(String, String),

    /// Schema violation, unknown version, or otherwise malformed metadata.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Signature set present on an entry or envelope does not meet any applicable rule.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Human-readable description of which rule/threshold was not met.
        reason: String,
    },

    /// A rule or role references a principal ID that is not defined in the same file.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Attempted to remove a principal still referenced by a rule or role.
    #[error("principal in use: {0}")]
    PrincipalInUse(String),

    /// A mutation named a rule that does not exist in the rule file.
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    /// Two rules in the same file share a name.
    #[error("duplicate rule name: {0}")]
    DuplicateRuleName(String),

    /// The delegation graph walk revisited a rule file already on the path.
    #[error("cyclic delegation at: {0}")]
    CyclicDelegation(String),

    /// Concurrent append to the RSL or metadata reference lost the compare-and-set race.
    #[error("rsl divergence: reference {reference} expected {expected} found {found}")]
    RslDivergence {
        reference: String,
        expected: String,
        found: String,
    },

    /// Requested target commit is not present among reference entries for that ref.
    #[error("target not in log: {target} for ref {reference}")]
    TargetNotInLog { reference: String, target: String },

    /// Appending would duplicate the latest unskipped entry for the reference; informational.
    #[error("duplicate entry: {reference} already at {target}")]
    DuplicateEntry { reference: String, target: String },

    /// An RSL entry carried a header this implementation does not recognize.
    #[error("unknown RSL entry type: {0}")]
    UnknownEntryType(String),

    /// A signature did not verify under the supplied key.
    #[error("signature invalid for object {0}")]
    SignatureInvalid(String),

    /// A signature verified but the key is not one the object claims to be signed with.
    #[error("wrong key for object {0}")]
    WrongKey(String),

    /// A threshold above the available principal count, or removal of a role's last principal.
    #[error("threshold unreachable: {0}")]
    ThresholdUnreachable(String),

    /// Invalid CLI-, config-, or API-level argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error from the underlying object store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Canonical-JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic custom error for miscellaneous failures.
    #[error("{0}")]
    Custom(String),
}
