//! The Tree object represents a directory listing: an ordered set of (mode, name, hash) entries,
//! each pointing at a blob (file) or another tree (subdirectory).

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::types::ObjectType;

/// Git's file mode encoding, as stored in a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Tree,
    Link,
    Commit,
}

impl TreeItemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeItemMode::Blob => "100644",
            TreeItemMode::BlobExecutable => "100755",
            TreeItemMode::Tree => "40000",
            TreeItemMode::Link => "120000",
            TreeItemMode::Commit => "160000",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<TreeItemMode, CoreError> {
        match bytes {
            b"100644" => Ok(TreeItemMode::Blob),
            b"100755" => Ok(TreeItemMode::BlobExecutable),
            b"40000" => Ok(TreeItemMode::Tree),
            b"120000" => Ok(TreeItemMode::Link),
            b"160000" => Ok(TreeItemMode::Commit),
            other => Err(CoreError::CorruptObject(
                "tree".to_string(),
                format!("unknown mode {:?}", String::from_utf8_lossy(other)),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: TreeItemMode,
    pub name: String,
    pub id: ObjectHash,
}

#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub id: ObjectHash,
    pub tree_items: Vec<TreeEntry>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for item in &self.tree_items {
            writeln!(f, "{:o} {} {}\t{}", 0, item.mode.as_str(), item.id, item.name)?;
        }
        Ok(())
    }
}

impl Tree {
    /// Build a tree from entries, sorted the way Git requires (byte order over entry names).
    pub fn from_tree_items(mut items: Vec<TreeEntry>) -> Result<Tree, CoreError> {
        items.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        let mut tree = Tree {
            id: ObjectHash::default(),
            tree_items: items,
        };
        let data = tree.to_data()?;
        tree.id = ObjectHash::from_type_and_data(ObjectType::Tree, &data);
        Ok(tree)
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.tree_items.iter().find(|e| e.name == name)
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, CoreError>
    where
        Self: Sized,
    {
        let mut items = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .find_byte(b' ')
                .ok_or_else(|| CoreError::CorruptObject("tree".to_string(), "missing mode separator".to_string()))?;
            let mode = TreeItemMode::from_bytes(&rest[..space])?;

            let nul = rest
                .find_byte(0x00)
                .ok_or_else(|| CoreError::CorruptObject("tree".to_string(), "missing name terminator".to_string()))?;
            let name = String::from_utf8(rest[space + 1..nul].to_vec())
                .map_err(|e| CoreError::CorruptObject("tree".to_string(), e.to_string()))?;

            let hash_len = hash.size();
            let hash_start = nul + 1;
            let id = ObjectHash::from_bytes(&rest[hash_start..hash_start + hash_len])
                .map_err(|e| CoreError::CorruptObject("tree".to_string(), e))?;

            items.push(TreeEntry { mode, name, id });
            rest = &rest[hash_start + hash_len..];
        }
        Ok(Tree {
            id: hash,
            tree_items: items,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        0
    }

    fn to_data(&self) -> Result<Vec<u8>, CoreError> {
        let mut data = Vec::new();
        for item in &self.tree_items {
            data.extend(item.mode.as_str().as_bytes());
            data.push(b' ');
            data.extend(item.name.as_bytes());
            data.push(0x00);
            data.extend(item.id.as_ref());
        }
        Ok(data)
    }
}

impl FromStr for TreeItemMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TreeItemMode::from_bytes(s.as_bytes())
    }
}
