//! A directory-backed `ObjectStore`: one zlib-deflated file per object (`type size\0content`,
//! the same physical framing [`crate::internal::zlib::stream::inflate::ReadBoxed`] decodes),
//! references as flat files under `refs/`, and a JSON sidecar for detached signatures.
//!
//! This exists so the crate is independently exercisable without a live host repository; it is
//! not a general-purpose Git object database (no packfiles, no alternates, no gc).

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeEntry, TreeItemMode};
use crate::internal::object::types::ObjectType;
use crate::internal::zlib::stream::inflate::ReadBoxed;
use crate::signing::{KeyMaterial, SignatureEntry, Signer};
use crate::store::{ObjectStore, SignatureStatus, TreeBuildEntry};

pub struct LooseObjectStore {
    root: PathBuf,
}

impl LooseObjectStore {
    /// Opens (creating if needed) a loose object store rooted at `root`, with `objects/`,
    /// `refs/`, and a `signatures.json` sidecar alongside it.
    pub fn open(root: impl Into<PathBuf>) -> Result<LooseObjectStore, CoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("refs"))?;
        Ok(LooseObjectStore { root })
    }

    fn object_path(&self, hash: &ObjectHash) -> PathBuf {
        let hex = hash.to_string();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn ref_path(&self, reference: &str) -> PathBuf {
        self.root.join("refs").join(reference.replace('/', "_"))
    }

    fn signatures_path(&self) -> PathBuf {
        self.root.join("signatures.json")
    }

    fn load_signatures(&self) -> Result<HashMap<String, SignatureEntry>, CoreError> {
        let path = self.signatures_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_signatures(&self, table: &HashMap<String, SignatureEntry>) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec_pretty(table)?;
        fs::write(self.signatures_path(), bytes)?;
        Ok(())
    }

    fn write_object_inner(&mut self, kind: ObjectType, data: &[u8]) -> Result<ObjectHash, CoreError> {
        let hash = ObjectHash::from_type_and_data(kind, data);
        let path = self.object_path(&hash);
        if path.exists() {
            return Ok(hash);
        }
        fs::create_dir_all(path.parent().unwrap())?;

        let mut framed = Vec::new();
        framed.extend(kind.to_bytes());
        framed.push(b' ');
        framed.extend(data.len().to_string().as_bytes());
        framed.push(0x00);
        framed.extend(data);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&framed)?;
        let compressed = encoder.finish()?;
        fs::write(path, compressed)?;
        Ok(hash)
    }

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
                direct.push(TreeEntry { mode: entry.mode, name: first, id: entry.hash });
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
            direct.push(TreeEntry { mode: TreeItemMode::Tree, name, id: sub_hash });
        }

        let tree = Tree::from_tree_items(direct)?;
        let data = tree.to_data()?;
        self.write_object_inner(ObjectType::Tree, &data)
    }
}

impl ObjectStore for LooseObjectStore {
    fn read_object(&self, hash: &ObjectHash) -> Result<(ObjectType, Vec<u8>), CoreError> {
        let path = self.object_path(hash);
        let file = fs::File::open(&path).map_err(|_| CoreError::NotFound(hash.to_string()))?;
        let mut reader = BufReader::new(file);

        // Peek the header to learn the type and declared size before handing off to ReadBoxed,
        // which needs both to seed its running hash the same way the host store does.
        let mut all = Vec::new();
        reader.read_to_end(&mut all)?;
        let cursor = BufReader::new(std::io::Cursor::new(all));
        let mut inflater = ReadBoxed::new_for_delta(cursor);
        let mut framed = Vec::new();
        inflater
            .read_to_end(&mut framed)
            .map_err(|e| CoreError::CorruptObject(hash.to_string(), e.to_string()))?;

        let space = framed
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| CoreError::CorruptObject(hash.to_string(), "missing type".to_string()))?;
        let nul = framed
            .iter()
            .position(|b| *b == 0x00)
            .ok_or_else(|| CoreError::CorruptObject(hash.to_string(), "missing nul".to_string()))?;
        let kind = ObjectType::from_string(std::str::from_utf8(&framed[..space]).unwrap_or(""))?;
        let body = framed[nul + 1..].to_vec();
        Ok((kind, body))
    }

    fn write_blob(&mut self, data: &[u8]) -> Result<ObjectHash, CoreError> {
        self.write_object_inner(ObjectType::Blob, data)
    }

    fn write_object(&mut self, kind: ObjectType, data: &[u8]) -> Result<ObjectHash, CoreError> {
        self.write_object_inner(kind, data)
    }

    fn record_signature(&mut self, object: &ObjectHash, signer: &dyn Signer) -> Result<(), CoreError> {
        let entry = SignatureEntry::sign(signer, object.as_ref())?;
        let mut table = self.load_signatures()?;
        table.insert(object.to_string(), entry);
        self.save_signatures(&table)?;
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
        let hash = self.write_object_inner(ObjectType::Commit, &data)?;

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
        let current = self.get_reference(reference)?;
        if current != old {
            return Err(CoreError::RslDivergence {
                reference: reference.to_string(),
                expected: old.map(|h| h.to_string()).unwrap_or_else(|| "<none>".to_string()),
                found: current.map(|h| h.to_string()).unwrap_or_else(|| "<none>".to_string()),
            });
        }
        fs::write(self.ref_path(reference), new.to_string())?;
        Ok(())
    }

    fn get_reference(&self, reference: &str) -> Result<Option<ObjectHash>, CoreError> {
        let path = self.ref_path(reference);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let hash = text
            .trim()
            .parse::<ObjectHash>()
            .map_err(|e| CoreError::CorruptObject(reference.to_string(), e))?;
        Ok(Some(hash))
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

        let mut merged = ours_map.clone();
        for (path, their_hash) in &theirs_map {
            if ours_map.get(path) == base_map.get(path) {
                merged.insert(path.clone(), *their_hash);
            }
        }

        let entries: Vec<TreeBuildEntry> = merged
            .into_iter()
            .map(|(path, hash)| TreeBuildEntry { path, mode: TreeItemMode::Blob, hash })
            .collect();
        self.build_tree(entries)
    }

    fn verify_signature(
        &self,
        object: &ObjectHash,
        key: &KeyMaterial,
    ) -> Result<SignatureStatus, CoreError> {
        let table = self.load_signatures()?;
        let Some(entry) = table.get(&object.to_string()) else {
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
        self.load_signatures().ok()?.get(&object.to_string()).cloned()
    }
}
