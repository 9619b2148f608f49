//! The four object types a content-addressed store needs to represent a versioned tree:
//! blobs, trees, commits, and tags.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TAG_OBJECT_TYPE: &[u8] = b"tag";

/// Each object type is assigned a unique integer value, used to identify the type of an
/// object without parsing its body.
///
/// * `Commit` (1): a point in history, with a tree, zero or more parents, and a message.
/// * `Tree` (2): a directory listing mapping names to other objects by hash.
/// * `Blob` (3): the raw content of a file.
/// * `Tag` (4): a named, optionally signed pointer to another object.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit = 1,
    Tree,
    Blob,
    Tag,
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tag => write!(f, "tag"),
        }
    }
}

impl ObjectType {
    /// Header bytes as used in the `"<type> <len>\0"` object framing.
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tag => TAG_OBJECT_TYPE,
        }
    }

    pub fn from_string(s: &str) -> Result<ObjectType, crate::errors::CoreError> {
        match s {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            other => Err(crate::errors::CoreError::UnknownEntryType(other.to_string())),
        }
    }
}
