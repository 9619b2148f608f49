//! Object model definitions for the four content-addressed object types (blob, tree, commit,
//! tag) and the shared trait that lets the store layer build strongly typed values from raw
//! bytes coming off disk or out of a zlib stream.

pub mod blob;
pub mod commit;
pub mod integrity;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

use std::{
    fmt::Display,
    io::{BufRead, Read},
};

use crate::{
    errors::CoreError,
    hash::ObjectHash,
    internal::{object::types::ObjectType, zlib::stream::inflate::ReadBoxed},
};

/// Defines the common interface for all object types: blobs, trees, commits, and tags.
pub trait ObjectTrait: Send + Sync + Display {
    /// Creates a new object from a byte slice and its already-known hash.
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, CoreError>
    where
        Self: Sized;

    /// Builds an object from a `ReadBoxed<BufRead>`, computing the hash as it reads.
    fn from_buf_read<R: BufRead>(read: &mut ReadBoxed<R>, size: usize) -> Result<Self, CoreError>
    where
        Self: Sized,
    {
        let mut content: Vec<u8> = Vec::with_capacity(size);
        read.read_to_end(&mut content)?;
        let digest = read.hash.clone().finalize();
        let hash = ObjectHash::from_bytes(&digest)
            .map_err(|e| CoreError::CorruptObject("object".to_string(), e))?;
        Self::from_bytes(&content, hash)
    }

    fn get_type(&self) -> ObjectType;

    fn get_size(&self) -> usize;

    fn to_data(&self) -> Result<Vec<u8>, CoreError>;

    /// Computes the object hash from serialized data.
    ///
    /// Override only if you need custom hash computation or caching.
    fn object_hash(&self) -> Result<ObjectHash, CoreError> {
        let data = self.to_data()?;
        Ok(ObjectHash::from_type_and_data(self.get_type(), &data))
    }
}
