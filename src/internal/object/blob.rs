//! The Blob object stores the raw content of a single file, addressed by the hash of its
//! `"blob <len>\0<content>"` framing.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::types::ObjectType;

#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: ObjectHash,
    pub data: Vec<u8>,
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "blob {}", self.id)
    }
}

impl Blob {
    pub fn from_content(content: &[u8]) -> Blob {
        let id = ObjectHash::from_type_and_data(ObjectType::Blob, content);
        Blob {
            id,
            data: content.to_vec(),
        }
    }
}

impl ObjectTrait for Blob {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, CoreError>
    where
        Self: Sized,
    {
        Ok(Blob {
            id: hash,
            data: data.to_vec(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn get_size(&self) -> usize {
        self.data.len()
    }

    fn to_data(&self) -> Result<Vec<u8>, CoreError> {
        Ok(self.data.clone())
    }
}
