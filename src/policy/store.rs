//! Persists the policy metadata graph (root + delegated rule files, each a DSSE envelope)
//! into the object store, on two dedicated references (§4.2): a staging ref anyone with
//! write access can advance, and an applied ref that only advances once the staged bundle's
//! signatures meet the threshold the *previous* applied root demands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::TreeItemMode;
use crate::policy::envelope::Envelope;
use crate::policy::root::Root;
use crate::signing::Signer;
use crate::store::{ObjectStore, TreeBuildEntry};

pub const POLICY_REF: &str = "refs/gittuf/policy";
pub const POLICY_STAGING_REF: &str = "refs/gittuf/policy-staging";

const ROOT_PATH: &str = "root.json";
const RULES_DIR: &str = "rules";

/// The full metadata graph at one point in the log: the root-of-trust envelope plus every
/// delegated rule file envelope, keyed by the name under which it was delegated.
#[derive(Debug, Clone)]
pub struct MetadataBundle {
    pub root: Envelope,
    pub rule_files: BTreeMap<String, Envelope>,
}

impl MetadataBundle {
    pub fn new(root: Envelope) -> MetadataBundle {
        MetadataBundle { root, rule_files: BTreeMap::new() }
    }

    fn to_tree(&self, store: &mut dyn ObjectStore) -> Result<ObjectHash, CoreError> {
        let mut entries = Vec::new();
        let root_bytes = serde_json::to_vec(&self.root)?;
        let root_hash = store.write_blob(&root_bytes)?;
        entries.push(TreeBuildEntry { path: PathBuf::from(ROOT_PATH), mode: TreeItemMode::Blob, hash: root_hash });

        for (name, envelope) in &self.rule_files {
            let bytes = serde_json::to_vec(envelope)?;
            let hash = store.write_blob(&bytes)?;
            entries.push(TreeBuildEntry {
                path: PathBuf::from(RULES_DIR).join(format!("{name}.json")),
                mode: TreeItemMode::Blob,
                hash,
            });
        }
        store.build_tree(entries)
    }

    pub(crate) fn from_tree(store: &dyn ObjectStore, tree: &ObjectHash) -> Result<MetadataBundle, CoreError> {
        let flat = store.flatten_tree(tree)?;
        let root_hash = flat
            .get(&PathBuf::from(ROOT_PATH))
            .ok_or_else(|| CoreError::InvalidMetadata("bundle missing root.json".to_string()))?;
        let (_, root_bytes) = store.read_object(root_hash)?;
        let root: Envelope = serde_json::from_slice(&root_bytes)?;

        let mut rule_files = BTreeMap::new();
        for (path, hash) in &flat {
            let Ok(rel) = path.strip_prefix(RULES_DIR) else { continue };
            let Some(file_name) = rel.file_stem().and_then(|s| s.to_str()) else { continue };
            let (_, bytes) = store.read_object(hash)?;
            let envelope: Envelope = serde_json::from_slice(&bytes)?;
            rule_files.insert(file_name.to_string(), envelope);
        }
        Ok(MetadataBundle { root, rule_files })
    }
}

/// Appends `bundle` as a new commit on the staging ref, parented on the current staging head
/// (if any). Returns the new commit's hash.
pub fn stage(
    store: &mut dyn ObjectStore,
    bundle: &MetadataBundle,
    author: Signature,
    committer: Signature,
    message: &str,
    signer: Option<&dyn Signer>,
) -> Result<ObjectHash, CoreError> {
    let tree = bundle.to_tree(store)?;
    let parent = store.get_reference(POLICY_STAGING_REF)?;
    let commit = store.commit(tree, parent.into_iter().collect(), author, committer, message, signer)?;
    store.compare_and_set_reference(POLICY_STAGING_REF, parent, commit)?;
    Ok(commit)
}

/// Reads back the bundle staged at the tip of the staging ref, if any.
pub fn staged_bundle(store: &dyn ObjectStore) -> Result<Option<MetadataBundle>, CoreError> {
    let Some(head) = store.get_reference(POLICY_STAGING_REF)? else { return Ok(None) };
    let commit = store.read_commit(&head)?;
    Ok(Some(MetadataBundle::from_tree(store, &commit.tree_id)?))
}

/// Reads back the bundle currently applied (enforced) for verification.
pub fn applied_bundle(store: &dyn ObjectStore) -> Result<Option<MetadataBundle>, CoreError> {
    let Some(head) = store.get_reference(POLICY_REF)? else { return Ok(None) };
    let commit = store.read_commit(&head)?;
    Ok(Some(MetadataBundle::from_tree(store, &commit.tree_id)?))
}

/// Promotes the staged bundle to applied, iff its root envelope carries enough valid
/// signatures to meet the root-succession check (§4.2): the threshold of the root role under
/// BOTH `previous_root` (the currently applied root) AND the staged root's own root role, via
/// [`crate::policy::root::Root::authorizes_succession`]. This holds even when the staged root
/// is identical to `previous_root` (the dual check degenerates to checking the same threshold
/// twice), so every promotion — rotation or not — goes through the same path.
///
/// Also appends an RSL reference entry for [`POLICY_REF`] itself: the policy state in force at
/// any point in history is reconstructed by replaying the RSL the same way as any other
/// reference's history (§4.4 step 3a), so a promotion must be logged there too, not just
/// reflected in the fast-access `POLICY_REF` pointer.
pub fn promote_if_authorized(
    store: &mut dyn ObjectStore,
    previous_root: &Root,
    author: Signature,
    committer: Signature,
) -> Result<ObjectHash, CoreError> {
    let span = tracing::info_span!("promote_policy");
    let _enter = span.enter();

    let staging_head = store
        .get_reference(POLICY_STAGING_REF)?
        .ok_or_else(|| CoreError::NotFound(POLICY_STAGING_REF.to_string()))?;
    let bundle = MetadataBundle::from_tree(store, &store.read_commit(&staging_head)?.tree_id)?;
    let staged_root: Root = bundle.root.decode()?;

    // Candidate signer key material is drawn from the union of the old and new principal
    // rosters, since a rotation's signer set can include principals named only in one of them.
    let mut principal_keys: BTreeMap<String, crate::signing::KeyMaterial> = BTreeMap::new();
    for principal in previous_root.principals.iter().chain(staged_root.principals.iter()) {
        if let Some(key) = principal.keys().into_iter().next() {
            principal_keys.insert(principal.id().to_string(), key.clone());
        }
    }
    let key_refs = principal_keys.iter().map(|(id, key)| (id.as_str(), key));
    let signer_ids = bundle.root.valid_signer_ids(key_refs);

    if let Err(err) = previous_root.authorizes_succession(&staged_root, &signer_ids) {
        tracing::warn!(staged = %staging_head, "staged root rotation failed succession check, not promoting");
        return Err(err);
    }

    let applied = store.get_reference(POLICY_REF)?;
    store.compare_and_set_reference(POLICY_REF, applied, staging_head)?;
    crate::rsl::log::append_reference_entry(
        store,
        POLICY_REF,
        staging_head,
        None,
        false,
        author,
        committer,
        None,
    )?;
    tracing::info!(staged = %staging_head, "promoted staged policy bundle");
    Ok(staging_head)
}
