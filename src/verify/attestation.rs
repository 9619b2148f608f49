//! Attestations (§4.4 step 3d, §9): signed claims that supplement the RSL entry's own
//! signature for a `(reference, from, to)` transition — a reference authorization naming
//! repository-internal approvers, or an external approval imported from a code-review platform
//! and trusted only via a role named in [`Root::external_approval_trust`]. Stored as DSSE
//! envelopes on a dedicated reference, the same tree-of-blobs shape
//! [`crate::policy::store::MetadataBundle`] uses for metadata.

use std::path::PathBuf;

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::TreeItemMode;
use crate::policy::envelope::Envelope;
use crate::policy::root::Root;
use crate::signing::{KeyMaterial, Signer};
use crate::store::{ObjectStore, TreeBuildEntry};

pub const ATTESTATIONS_REF: &str = "refs/gittuf/attestations";

pub const REFERENCE_AUTHORIZATION_TYPE: &str = "https://gittuf.dev/attestations/reference-authorization/v0.1";
pub const EXTERNAL_APPROVAL_TYPE: &str = "https://gittuf.dev/attestations/external-approval/v0.1";

/// A repository-internal approval: one or more principals vouching for a specific transition
/// out of band from the push itself (e.g. a reviewer who approved but didn't perform the push).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceAuthorization {
    pub reference: String,
    pub from_target: Option<ObjectHash>,
    pub to_target: ObjectHash,
    pub approvers: Vec<String>,
}

/// An approval imported from an external code-review platform (§3 "external approval trust").
/// `dismissed_approvers` records approvals the platform itself later withdrew (e.g. a reviewer
/// whose approval was invalidated by a subsequent force-push on the platform side).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExternalApproval {
    pub reference: String,
    pub from_target: Option<ObjectHash>,
    pub to_target: ObjectHash,
    pub approvers: Vec<String>,
    pub dismissed_approvers: Vec<String>,
}

fn transition_dir(reference: &str, from: Option<ObjectHash>, to: ObjectHash) -> PathBuf {
    let sanitized: String = reference.chars().map(|c| if c == '/' { '_' } else { c }).collect();
    let from_part = from.map(|h| h.to_string()).unwrap_or_else(|| "none".to_string());
    PathBuf::from("attestations").join(format!("{sanitized}-{from_part}-{to}"))
}

/// Records one more attestation envelope for a transition, keyed by the signing key's ID so
/// independent approvers accumulate rather than overwrite each other.
#[allow(clippy::too_many_arguments)]
pub fn record_attestation(
    store: &mut dyn ObjectStore,
    reference: &str,
    from: Option<ObjectHash>,
    to: ObjectHash,
    envelope: &Envelope,
    key_id: &str,
    author: Signature,
    committer: Signature,
    message: &str,
    signer: Option<&dyn Signer>,
) -> Result<ObjectHash, CoreError> {
    let tip = store.get_reference(ATTESTATIONS_REF)?;
    let mut entries = Vec::new();
    if let Some(head) = tip {
        let commit = store.read_commit(&head)?;
        let flat = store.flatten_tree(&commit.tree_id)?;
        for (path, hash) in flat {
            entries.push(TreeBuildEntry { path, mode: TreeItemMode::Blob, hash });
        }
    }

    let bytes = serde_json::to_vec(envelope)?;
    let blob = store.write_blob(&bytes)?;
    let path = transition_dir(reference, from, to).join(format!("{key_id}.json"));
    entries.retain(|e| e.path != path);
    entries.push(TreeBuildEntry { path, mode: TreeItemMode::Blob, hash: blob });

    let tree = store.build_tree(entries)?;
    let parents = tip.into_iter().collect();
    let commit = store.commit(tree, parents, author, committer, message, signer)?;
    store.compare_and_set_reference(ATTESTATIONS_REF, tip, commit)?;
    Ok(commit)
}

/// Every attestation envelope recorded for a given transition; empty if the attestations
/// reference doesn't exist yet or nothing was recorded for it.
pub fn attestations_for(
    store: &dyn ObjectStore,
    reference: &str,
    from: Option<ObjectHash>,
    to: ObjectHash,
) -> Result<Vec<Envelope>, CoreError> {
    let Some(head) = store.get_reference(ATTESTATIONS_REF)? else { return Ok(Vec::new()) };
    let commit = store.read_commit(&head)?;
    let flat = store.flatten_tree(&commit.tree_id)?;
    let dir = transition_dir(reference, from, to);
    let mut out = Vec::new();
    for (path, hash) in &flat {
        if path.starts_with(&dir) {
            let (_, bytes) = store.read_object(hash)?;
            out.push(serde_json::from_slice(&bytes)?);
        }
    }
    Ok(out)
}

/// Decodes `envelope` as a reference authorization. Its approvers are not trust-checked here —
/// they still have to be known principals bound to the rule in question, which the
/// verification engine checks the same way it checks the base RSL signer.
pub fn decode_reference_authorization(envelope: &Envelope) -> Result<ReferenceAuthorization, CoreError> {
    envelope.decode()
}

/// Decodes `envelope` as an external approval and returns its approvers (minus dismissals), but
/// only if the envelope's own signatures meet the threshold of at least one role named in
/// `root.external_approval_trust` — an external platform's approver list is meaningless unless
/// the integration that produced this attestation is itself trusted by the root.
pub fn trusted_external_approvers(
    envelope: &Envelope,
    root: &Root,
    principal_keys: &[(String, KeyMaterial)],
) -> Result<Vec<String>, CoreError> {
    let approval: ExternalApproval = envelope.decode()?;
    let trusted = root.external_approval_trust.iter().any(|role_name| {
        root.role(role_name)
            .map(|role| {
                let keys = principal_keys.iter().map(|(id, key)| (id.as_str(), key));
                envelope.verify_threshold(role, keys).is_ok()
            })
            .unwrap_or(false)
    });
    if !trusted {
        return Ok(Vec::new());
    }
    Ok(approval
        .approvers
        .into_iter()
        .filter(|id| !approval.dismissed_approvers.contains(id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};
    use crate::internal::object::signature::SignatureType;
    use crate::policy::principal::{KeyPrincipal, Principal};
    use crate::policy::root::RoleBinding;
    use crate::store::MemoryStore;
    use crate::testkit::TestPrincipal;

    fn sig(name: &str) -> Signature {
        Signature::new(SignatureType::Committer, name.to_string(), format!("{name}@example.com"))
    }

    #[test]
    fn records_and_reads_back_reference_authorization() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let mut store = MemoryStore::new();
        let to = ObjectHash::new(b"to-target");

        let auth = ReferenceAuthorization {
            reference: "refs/heads/main".to_string(),
            from_target: None,
            to_target: to,
            approvers: vec!["carol".to_string()],
        };
        let envelope = Envelope::new(&auth, REFERENCE_AUTHORIZATION_TYPE).unwrap();
        record_attestation(
            &mut store,
            "refs/heads/main",
            None,
            to,
            &envelope,
            "carol-key",
            sig("carol"),
            sig("carol"),
            "attest",
            None,
        )
        .unwrap();

        let found = attestations_for(&store, "refs/heads/main", None, to).unwrap();
        assert_eq!(found.len(), 1);
        let decoded = decode_reference_authorization(&found[0]).unwrap();
        assert_eq!(decoded.approvers, vec!["carol".to_string()]);
    }

    #[test]
    fn external_approval_ignored_unless_platform_role_trusted() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let platform = TestPrincipal::generate("ci-platform");
        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "ci-platform".to_string(), key: platform.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();
        root.set_role("platform-integration", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();

        let approval = ExternalApproval {
            reference: "refs/heads/main".to_string(),
            from_target: None,
            to_target: ObjectHash::new(b"to"),
            approvers: vec!["dave".to_string()],
            dismissed_approvers: vec![],
        };
        let mut envelope = Envelope::new(&approval, EXTERNAL_APPROVAL_TYPE).unwrap();
        let principal_keys = vec![("ci-platform".to_string(), platform.public_key())];

        // Unsigned: not trusted yet.
        assert!(trusted_external_approvers(&envelope, &root, &principal_keys).unwrap().is_empty());

        envelope.add_signature(&platform.signing_key).unwrap();
        // Signed, but root doesn't name the role as trusted.
        assert!(trusted_external_approvers(&envelope, &root, &principal_keys).unwrap().is_empty());

        root.enable_external_approval_trust("platform-integration").unwrap();
        let approvers = trusted_external_approvers(&envelope, &root, &principal_keys).unwrap();
        assert_eq!(approvers, vec!["dave".to_string()]);
    }

    #[test]
    fn dismissed_approvers_are_excluded() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let platform = TestPrincipal::generate("ci-platform");
        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "ci-platform".to_string(), key: platform.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();
        root.set_role("platform-integration", RoleBinding { principal_ids: vec!["ci-platform".to_string()], threshold: 1 }).unwrap();
        root.enable_external_approval_trust("platform-integration").unwrap();

        let approval = ExternalApproval {
            reference: "refs/heads/main".to_string(),
            from_target: None,
            to_target: ObjectHash::new(b"to"),
            approvers: vec!["dave".to_string(), "erin".to_string()],
            dismissed_approvers: vec!["erin".to_string()],
        };
        let mut envelope = Envelope::new(&approval, EXTERNAL_APPROVAL_TYPE).unwrap();
        envelope.add_signature(&platform.signing_key).unwrap();
        let principal_keys = vec![("ci-platform".to_string(), platform.public_key())];

        let approvers = trusted_external_approvers(&envelope, &root, &principal_keys).unwrap();
        assert_eq!(approvers, vec!["dave".to_string()]);
    }
}
