//! The Object Store Interface (OSI): a thin, synchronous capability abstraction over a
//! content-addressed object store. Everything above this layer (policy, RSL, verification)
//! is written purely in terms of this trait, so it never depends on how objects are physically
//! persisted.

pub mod loose;
pub mod memory;

use std::path::PathBuf;

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::TreeEntry;
use crate::internal::object::types::ObjectType;
use crate::signing::{KeyMaterial, SignatureEntry, Signer};

pub use loose::LooseObjectStore;
pub use memory::MemoryStore;

/// Outcome of `verify_signature`, matching §4.1's four-way result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Ok,
    WrongKey,
    Malformed,
    NotSigned,
}

/// A `(path, mode, hash)` triple as consumed by `build_tree`. Paths containing `/` implicitly
/// create intermediate trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuildEntry {
    pub path: PathBuf,
    pub mode: crate::internal::object::tree::TreeItemMode,
    pub hash: ObjectHash,
}

/// Deterministic, side-effect-isolated view of the host object store.
///
/// Every method is synchronous (§4.1: "all operations are synchronous") and must be
/// deterministic: identical inputs over identical underlying state return identical outputs.
pub trait ObjectStore {
    /// Reads raw object bytes and its type; fails with `NotFound` or `CorruptObject`.
    fn read_object(&self, hash: &ObjectHash) -> Result<(ObjectType, Vec<u8>), CoreError>;

    /// Writes content as a blob; idempotent — identical bytes produce the same hash.
    fn write_blob(&mut self, data: &[u8]) -> Result<ObjectHash, CoreError>;

    /// Builds a tree (and any implied intermediate trees for slash-containing paths) from a
    /// flat entry list, returning the root tree's hash.
    fn build_tree(&mut self, entries: Vec<TreeBuildEntry>) -> Result<ObjectHash, CoreError>;

    /// Creates a commit object. When `signer` is `Some`, a detached signature over the
    /// commit's content-addressed bytes is recorded in the sidecar signature table, keyed by
    /// the resulting commit hash — the commit's hash itself is unaffected by signing.
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        tree: ObjectHash,
        parents: Vec<ObjectHash>,
        author: Signature,
        committer: Signature,
        message: &str,
        signer: Option<&dyn Signer>,
    ) -> Result<ObjectHash, CoreError>;

    /// Atomically advances `reference` to `new` iff its current value is `old` (`None` means
    /// "must not exist yet"). Fails with `RslDivergence`-shaped contention at the caller's
    /// discretion; the store itself reports the observed value on conflict.
    fn compare_and_set_reference(
        &mut self,
        reference: &str,
        old: Option<ObjectHash>,
        new: ObjectHash,
    ) -> Result<(), CoreError>;

    /// Current value of a reference, or `None` if it does not exist.
    fn get_reference(&self, reference: &str) -> Result<Option<ObjectHash>, CoreError>;

    /// Reachability: is `ancestor` an ancestor of (or equal to) `descendant` in the commit DAG.
    fn knows(&self, descendant: &ObjectHash, ancestor: &ObjectHash) -> Result<bool, CoreError>;

    /// Merges the trees of `ours` and `theirs` against their common `base`, returning the
    /// resulting tree hash. Non-conflicting changes from both sides are applied; conflicting
    /// paths keep `ours`' content (no interactive conflict resolution in the core).
    fn merge_tree(
        &mut self,
        base: Option<ObjectHash>,
        ours: ObjectHash,
        theirs: ObjectHash,
    ) -> Result<ObjectHash, CoreError>;

    /// Checks a detached signature previously recorded for `object` against `key`.
    fn verify_signature(
        &self,
        object: &ObjectHash,
        key: &KeyMaterial,
    ) -> Result<SignatureStatus, CoreError>;

    /// Convenience: read and parse a commit object.
    fn read_commit(&self, hash: &ObjectHash) -> Result<Commit, CoreError> {
        use crate::internal::object::ObjectTrait;
        let (kind, bytes) = self.read_object(hash)?;
        if kind != ObjectType::Commit {
            return Err(CoreError::CorruptObject(
                hash.to_string(),
                format!("expected commit, found {kind}"),
            ));
        }
        Commit::from_bytes(&bytes, *hash)
    }

    /// Convenience: read and parse a tag object (§4.1 "read tag").
    fn read_tag(&self, hash: &ObjectHash) -> Result<crate::internal::object::tag::Tag, CoreError> {
        use crate::internal::object::ObjectTrait;
        use crate::internal::object::tag::Tag;
        let (kind, bytes) = self.read_object(hash)?;
        if kind != ObjectType::Tag {
            return Err(CoreError::CorruptObject(
                hash.to_string(),
                format!("expected tag, found {kind}"),
            ));
        }
        Tag::from_bytes(&bytes, *hash)
    }

    /// Convenience: write a tag object, optionally recording a detached signature over it the
    /// same way `commit` does (§4.1 "sign/verify a commit or tag object").
    fn write_tag(&mut self, tag: &crate::internal::object::tag::Tag, signer: Option<&dyn Signer>) -> Result<ObjectHash, CoreError> {
        use crate::internal::object::ObjectTrait;
        let data = tag.to_data()?;
        let hash = self.write_object(ObjectType::Tag, &data)?;
        if let Some(signer) = signer {
            self.record_signature(&hash, signer)?;
        }
        Ok(hash)
    }

    /// Writes a raw object of the given type, used by [`write_tag`](ObjectStore::write_tag)
    /// since tags, unlike blobs, don't get their own top-level write method.
    #[doc(hidden)]
    fn write_object(&mut self, kind: ObjectType, data: &[u8]) -> Result<ObjectHash, CoreError>;

    /// Records a detached signature over an already-written object, the same sidecar table
    /// `commit` uses. Exposed so [`write_tag`](ObjectStore::write_tag) can sign without a
    /// dedicated commit-shaped entry point.
    #[doc(hidden)]
    fn record_signature(&mut self, object: &ObjectHash, signer: &dyn Signer) -> Result<(), CoreError>;

    /// Convenience: read and parse a tree object.
    fn read_tree(&self, hash: &ObjectHash) -> Result<crate::internal::object::tree::Tree, CoreError> {
        use crate::internal::object::ObjectTrait;
        use crate::internal::object::tree::Tree;
        let (kind, bytes) = self.read_object(hash)?;
        if kind != ObjectType::Tree {
            return Err(CoreError::CorruptObject(
                hash.to_string(),
                format!("expected tree, found {kind}"),
            ));
        }
        Tree::from_bytes(&bytes, *hash)
    }

    /// Signature recorded against `object`, if any.
    fn get_signature(&self, object: &ObjectHash) -> Option<SignatureEntry>;

    /// Recursively expands a tree into a flat `path -> blob hash` map. Directory entries do
    /// not appear in the result, only leaves (blobs and submodule-style commit pointers).
    fn flatten_tree(&self, tree: &ObjectHash) -> Result<std::collections::HashMap<PathBuf, ObjectHash>, CoreError> {
        let mut out = std::collections::HashMap::new();
        self.flatten_tree_into(tree, &PathBuf::new(), &mut out)?;
        Ok(out)
    }

    #[doc(hidden)]
    fn flatten_tree_into(
        &self,
        tree: &ObjectHash,
        prefix: &std::path::Path,
        out: &mut std::collections::HashMap<PathBuf, ObjectHash>,
    ) -> Result<(), CoreError> {
        use crate::internal::object::tree::TreeItemMode;
        let parsed = self.read_tree(tree)?;
        for entry in &parsed.tree_items {
            let path = prefix.join(&entry.name);
            match entry.mode {
                TreeItemMode::Tree => self.flatten_tree_into(&entry.id, &path, out)?,
                _ => {
                    out.insert(path, entry.id);
                }
            }
        }
        Ok(())
    }

    /// Commits reachable from `descendant` and not from `ancestor` (§4.1 "enumerate commits
    /// reachable from A and not from B"). `ancestor = None` means "nothing is excluded" — every
    /// commit reachable from `descendant` is returned, as at the start of a reference's history.
    fn commits_reachable_not_in(
        &self,
        descendant: &ObjectHash,
        ancestor: Option<&ObjectHash>,
    ) -> Result<Vec<ObjectHash>, CoreError> {
        let mut excluded = std::collections::HashSet::new();
        if let Some(ancestor) = ancestor {
            let mut frontier = vec![*ancestor];
            while let Some(current) = frontier.pop() {
                if !excluded.insert(current) {
                    continue;
                }
                if let Ok(commit) = self.read_commit(&current) {
                    frontier.extend(commit.parent_commit_ids);
                }
            }
        }

        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut frontier = vec![*descendant];
        while let Some(current) = frontier.pop() {
            if excluded.contains(&current) || !seen.insert(current) {
                continue;
            }
            out.push(current);
            let commit = self.read_commit(&current)?;
            frontier.extend(commit.parent_commit_ids);
        }
        out.sort();
        Ok(out)
    }

    /// Paths whose blob identity differs between `commit` and any of its parents (§4.1). For a
    /// merge commit, a path is reported only if it differs from *every* parent.
    fn paths_changed(&self, commit: &ObjectHash) -> Result<Vec<PathBuf>, CoreError> {
        let target = self.read_commit(commit)?;
        let target_paths = self.flatten_tree(&target.tree_id)?;

        if target.parent_commit_ids.is_empty() {
            let mut paths: Vec<PathBuf> = target_paths.into_keys().collect();
            paths.sort();
            return Ok(paths);
        }

        let parent_path_sets: Vec<std::collections::HashMap<PathBuf, ObjectHash>> = target
            .parent_commit_ids
            .iter()
            .map(|p| {
                let parent = self.read_commit(p)?;
                self.flatten_tree(&parent.tree_id)
            })
            .collect::<Result<_, CoreError>>()?;

        let mut union: std::collections::HashSet<PathBuf> = target_paths.keys().cloned().collect();
        for parent_paths in &parent_path_sets {
            union.extend(parent_paths.keys().cloned());
        }

        let mut changed: Vec<PathBuf> = union
            .into_iter()
            .filter(|path| {
                let here = target_paths.get(path);
                parent_path_sets
                    .iter()
                    .all(|parent_paths| parent_paths.get(path) != here)
            })
            .collect();
        changed.sort();
        Ok(changed)
    }
}
