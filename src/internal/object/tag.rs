//! The Tag object is a named, optionally signed pointer to another object (usually a commit).

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;

#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: ObjectHash,
    pub object_hash: ObjectHash,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Signature,
    pub message: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "object {}", self.object_hash)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        writeln!(f, "{}", self.tagger)?;
        writeln!(f, "{}", self.message)
    }
}

impl Tag {
    pub fn new(
        object_hash: ObjectHash,
        object_type: ObjectType,
        tag_name: String,
        tagger: Signature,
        message: String,
    ) -> Tag {
        let mut tag = Tag {
            id: ObjectHash::default(),
            object_hash,
            object_type,
            tag_name,
            tagger,
            message,
        };
        let data = tag.to_data().expect("tag fields always serialize");
        tag.id = ObjectHash::from_type_and_data(ObjectType::Tag, &data);
        tag
    }
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, CoreError>
    where
        Self: Sized,
    {
        let mut rest = data;

        let object_end = rest
            .find_byte(0x0a)
            .ok_or_else(|| CoreError::CorruptObject("tag".to_string(), "missing object line".to_string()))?;
        let object_hash = ObjectHash::from_str(
            std::str::from_utf8(&rest[7..object_end]).map_err(|e| CoreError::CorruptObject("tag".to_string(), e.to_string()))?,
        )
        .map_err(|e| CoreError::CorruptObject("tag".to_string(), e))?;
        rest = &rest[object_end + 1..];

        let type_end = rest
            .find_byte(0x0a)
            .ok_or_else(|| CoreError::CorruptObject("tag".to_string(), "missing type line".to_string()))?;
        let object_type = ObjectType::from_string(
            std::str::from_utf8(&rest[5..type_end]).map_err(|e| CoreError::CorruptObject("tag".to_string(), e.to_string()))?,
        )?;
        rest = &rest[type_end + 1..];

        let tag_end = rest
            .find_byte(0x0a)
            .ok_or_else(|| CoreError::CorruptObject("tag".to_string(), "missing tag line".to_string()))?;
        let tag_name = String::from_utf8(rest[4..tag_end].to_vec())
            .map_err(|e| CoreError::CorruptObject("tag".to_string(), e.to_string()))?;
        rest = &rest[tag_end + 1..];

        let tagger_end = rest
            .find_byte(0x0a)
            .ok_or_else(|| CoreError::CorruptObject("tag".to_string(), "missing tagger line".to_string()))?;
        let tagger = Signature::from_data(rest[..tagger_end].to_vec())?;
        rest = &rest[tagger_end + 1..];

        let message = String::from_utf8_lossy(rest).into_owned();

        Ok(Tag {
            id: hash,
            object_hash,
            object_type,
            tag_name,
            tagger,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        0
    }

    fn to_data(&self) -> Result<Vec<u8>, CoreError> {
        let mut data = Vec::new();
        data.extend(b"object ");
        data.extend(self.object_hash.to_string().as_bytes());
        data.push(0x0a);
        data.extend(b"type ");
        data.extend(self.object_type.to_string().as_bytes());
        data.push(0x0a);
        data.extend(b"tag ");
        data.extend(self.tag_name.as_bytes());
        data.push(0x0a);
        data.extend(self.tagger.to_data()?);
        data.push(0x0a);
        data.extend(self.message.as_bytes());
        Ok(data)
    }
}
