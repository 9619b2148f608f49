//! The Verification Engine (§4.4): the component that actually enforces policy, by replaying a
//! reference's RSL history against the policy bundle in force at each transition.
//!
//! [`engine::verify`] is the entry point; [`policy_walk`] resolves which rules govern a given
//! namespace, [`attestation`] supplies additional signers beyond the RSL entry's own signature,
//! and [`result`] carries the pass/fail outcome back to the caller.

pub mod attestation;
pub mod engine;
pub mod policy_walk;
pub mod result;

pub use engine::{verify, verify_to_target, verify_up_to};
pub use result::{FailingConstraint, Rejection, VerificationOutcome};
