//! Signing and verification abstraction over `ring`.
//!
//! The rest of the crate never touches `ring::signature` directly; it works in terms of
//! `KeyMaterial`, `Signer`, and `Verifier`, so adding a scheme later (the spec's "cryptographic
//! agility ... through a verifier abstraction") means adding a `KeyMaterial` variant rather than
//! threading a new dependency through the metadata and RSL layers.

use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};

use crate::errors::CoreError;

/// A public key, tagged by scheme. The principal's `key-id` is derived from these bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyMaterial {
    Ed25519 { public_key: Vec<u8> },
}

impl KeyMaterial {
    /// A stable identifier derived from the canonical key bytes, used as a principal/key ID.
    pub fn key_id(&self) -> String {
        match self {
            KeyMaterial::Ed25519 { public_key } => {
                format!("ed25519:{}", hex::encode(public_key))
            }
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CoreError> {
        match self {
            KeyMaterial::Ed25519 { public_key } => {
                let key = UnparsedPublicKey::new(&signature::ED25519, public_key);
                key.verify(message, signature)
                    .map_err(|_| CoreError::SignatureInvalid(self.key_id()))
            }
        }
    }
}

/// A loaded signing key, able to produce signatures over arbitrary payload bytes.
pub enum SigningKey {
    Ed25519(Ed25519KeyPair),
}

impl SigningKey {
    /// Build a signing key from a PKCS#8-encoded Ed25519 private key.
    pub fn from_pkcs8(bytes: &[u8]) -> Result<SigningKey, CoreError> {
        let pair = Ed25519KeyPair::from_pkcs8(bytes)
            .map_err(|_| CoreError::InvalidArgument("malformed pkcs8 key".to_string()))?;
        Ok(SigningKey::Ed25519(pair))
    }

    /// The public `KeyMaterial` corresponding to this signing key.
    pub fn public_key(&self) -> KeyMaterial {
        match self {
            SigningKey::Ed25519(pair) => KeyMaterial::Ed25519 {
                public_key: pair.public_key().as_ref().to_vec(),
            },
        }
    }
}

/// Something that can sign a message on behalf of exactly one key.
pub trait Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn key_id(&self) -> String;
}

impl Signer for SigningKey {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CoreError> {
        match self {
            SigningKey::Ed25519(pair) => Ok(pair.sign(message).as_ref().to_vec()),
        }
    }

    fn key_id(&self) -> String {
        self.public_key().key_id()
    }
}

/// One (key-id, signature) pair attached to a signed object or envelope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignatureEntry {
    pub key_id: String,
    pub signature: Vec<u8>,
}

impl SignatureEntry {
    pub fn sign(signer: &dyn Signer, message: &[u8]) -> Result<SignatureEntry, CoreError> {
        Ok(SignatureEntry {
            key_id: signer.key_id(),
            signature: signer.sign(message)?,
        })
    }

    pub fn verify(&self, key: &KeyMaterial, message: &[u8]) -> Result<(), CoreError> {
        if key.key_id() != self.key_id {
            return Err(CoreError::WrongKey(self.key_id.clone()));
        }
        key.verify(message, &self.signature)
    }
}
