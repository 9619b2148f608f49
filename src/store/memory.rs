//! An in-process, non-persistent `ObjectStore` — no real repository required. Used by the test
//! harness ([`crate::testkit`]) and by end-to-end scenario tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeEntry, TreeItemMode};
use crate::internal::object::types::ObjectType;
use crate::signing::{KeyMaterial, SignatureEntry, Signer};
use crate::store::{ObjectStore, SignatureStatus, TreeBuildEntry};

#[derive(Default)]
pub struct MemoryStore {
    objects: HashMap<ObjectHash, (ObjectType, Vec<u8>)>,
    refs: HashMap<String, ObjectHash>,
    signatures: HashMap<ObjectHash, SignatureEntry>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn insert(&mut self, kind: ObjectType, data: Vec<u8>) -> ObjectHash {
        let hash = ObjectHash::from_type_and_data(kind, &data);
        self.objects.entry(hash).or_insert((kind, data));
        hash
    }

    /// Groups flat `(path, mode, hash)` entries into a nested structure and recursively
    /// writes trees bottom-up, mirroring how `Tree::from_tree_items` expects a single
    /// directory's worth of entries at a time.
    fn build_tree_recursive(&mut self, entries: &[TreeBuildEntry], dir: &Path) -> Result<ObjectHash, CoreError> {
        let mut direct: Vec<TreeEntry> = Vec::new();
        let mut subdirs: HashMap<String, Vec<TreeBuildEntry>> = HashMap::new();

        for entry in entries {
            let rel = entry.path.strip_prefix(dir).unwrap_or(&entry.path);
            let mut components = rel.components();
            let Some(first) = components.next() else { continue };
            let first = first.as_os_str().to_string_lossy().to_string();
            let remainder: PathBuf = components.collect();

            if remainder.as_os_str().is_empty() {
                direct.push(TreeEntry {
                    mode: entry.mode,
                    name: first,
                    id: entry.hash,
                });
            } else {
                subdirs.entry(first).or_default().push(TreeBuildEntry {
                    path: remainder,
                    mode: entry.mode,
                    hash: entry.hash,
                });
            }
        }

        for (name, sub_entries) in subdirs {
            let sub_hash = self.build_tree_recursive(&sub_entries, Path::new(""))?;
            direct.push(TreeEntry {
                mode: TreeItemMode::Tree,
                name,
                id: sub_hash,
            });
        }

        let tree = Tree::from_tree_items(direct)?;
        let data = tree.to_data()?;
        Ok(self.insert(ObjectType::Tree, data))
    }
}

impl ObjectStore for MemoryStore {
    fn read_object(&self, hash: &ObjectHash) -> Result<(ObjectType, Vec<u8>), CoreError> {
        self.objects
            .get(hash)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(hash.to_string()))
    }

    fn write_blob(&mut self, data: &[u8]) -> Result<ObjectHash, CoreError> {
        Ok(self.insert(ObjectType::Blob, data.to_vec()))
    }

    fn write_object(&mut self, kind: ObjectType, data: &[u8]) -> Result<ObjectHash, CoreError> {
        Ok(self.insert(kind, data.to_vec()))
    }

    fn record_signature(&mut self, object: &ObjectHash, signer: &dyn Signer) -> Result<(), CoreError> {
        let entry = SignatureEntry::sign(signer, object.as_ref())?;
        self.signatures.insert(*object, entry);
        Ok(())
    }

    fn build_tree(&mut self, entries: Vec<TreeBuildEntry>) -> Result<ObjectHash, CoreError> {
        self.build_tree_recursive(&entries, Path::new(""))
    }

    fn commit(
        &mut self,
        tree: ObjectHash,
        parents: Vec<ObjectHash>,
        author: Signature,
        committer: Signature,
        message: &str,
        signer: Option<&dyn Signer>,
    ) -> Result<ObjectHash, CoreError> {
        let commit = Commit::new(author, committer, tree, parents, message);
        let data = commit.to_data()?;
        let hash = self.insert(ObjectType::Commit, data);

        if let Some(signer) = signer {
            self.record_signature(&hash, signer)?;
        }

        Ok(hash)
    }

    fn compare_and_set_reference(
        &mut self,
        reference: &str,
        old: Option<ObjectHash>,
        new: ObjectHash,
    ) -> Result<(), CoreError> {
        let current = self.refs.get(reference).copied();
        if current != old {
            return Err(CoreError::RslDivergence {
                reference: reference.to_string(),
                expected: old.map(|h| h.to_string()).unwrap_or_else(|| "<none>".to_string()),
                found: current.map(|h| h.to_string()).unwrap_or_else(|| "<none>".to_string()),
            });
        }
        self.refs.insert(reference.to_string(), new);
        Ok(())
    }

    fn get_reference(&self, reference: &str) -> Result<Option<ObjectHash>, CoreError> {
        Ok(self.refs.get(reference).copied())
    }

    fn knows(&self, descendant: &ObjectHash, ancestor: &ObjectHash) -> Result<bool, CoreError> {
        if descendant == ancestor {
            return Ok(true);
        }
        let mut frontier = vec![*descendant];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = frontier.pop() {
            if !seen.insert(current) {
                continue;
            }
            if current == *ancestor {
                return Ok(true);
            }
            if let Ok(commit) = self.read_commit(&current) {
                frontier.extend(commit.parent_commit_ids);
            }
        }
        Ok(false)
    }

    fn merge_tree(
        &mut self,
        base: Option<ObjectHash>,
        ours: ObjectHash,
        theirs: ObjectHash,
    ) -> Result<ObjectHash, CoreError> {
        let ours_map = self.flatten_tree(&ours)?;
        let theirs_map = self.flatten_tree(&theirs)?;
        let base_map = match base {
            Some(b) => self.flatten_tree(&b)?,
            None => HashMap::new(),
        };

        let mut merged: HashMap<PathBuf, ObjectHash> = ours_map.clone();
        for (path, their_hash) in &theirs_map {
            let base_hash = base_map.get(path);
            let our_hash = ours_map.get(path);
            if our_hash == base_hash {
                merged.insert(path.clone(), *their_hash);
            }
            // else: keep ours' content, per the no-interactive-resolution contract.
        }

        let entries: Vec<TreeBuildEntry> = merged
            .into_iter()
            .map(|(path, hash)| TreeBuildEntry {
                path,
                mode: TreeItemMode::Blob,
                hash,
            })
            .collect();
        self.build_tree(entries)
    }

    fn verify_signature(
        &self,
        object: &ObjectHash,
        key: &KeyMaterial,
    ) -> Result<SignatureStatus, CoreError> {
        let Some(entry) = self.signatures.get(object) else {
            return Ok(SignatureStatus::NotSigned);
        };
        if entry.key_id != key.key_id() {
            return Ok(SignatureStatus::WrongKey);
        }
        match key.verify(object.as_ref(), &entry.signature) {
            Ok(()) => Ok(SignatureStatus::Ok),
            Err(_) => Ok(SignatureStatus::Malformed),
        }
    }

    fn get_signature(&self, object: &ObjectHash) -> Option<SignatureEntry> {
        self.signatures.get(object).cloned()
    }
}
