//! DSSE-style signed envelopes (§3, §4.2): a canonical-JSON payload plus zero or more
//! detached signatures over that payload's PAE (pre-authentication encoding), the same
//! "sign the bytes, not the structure" pattern DSSE uses so verifiers never need to
//! re-derive the exact serialization a signer used.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::CoreError;
use crate::internal::object::integrity::canonical_json_bytes;
use crate::policy::root::RoleBinding;
use crate::signing::{KeyMaterial, SignatureEntry, Signer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct Envelope {
    /// Canonical-JSON-serialized metadata document.
    pub payload: Vec<u8>,
    pub payload_type: String,
    pub signatures: Vec<SignatureEntry>,
}

impl Envelope {
    /// Builds an unsigned envelope around `document`, canonicalizing its JSON representation.
    pub fn new<T: Serialize>(document: &T, payload_type: impl Into<String>) -> Result<Envelope, CoreError> {
        let payload = canonical_json_bytes(document)?;
        Ok(Envelope { payload, payload_type: payload_type.into(), signatures: Vec::new() })
    }

    /// The exact bytes a signer signs over: DSSE's pre-authentication encoding, binding the
    /// payload type into the signed bytes so a signature cannot be replayed against a
    /// differently-typed payload with identical content.
    fn pae(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(b"DSSEv1 ");
        out.extend(self.payload_type.len().to_string().as_bytes());
        out.push(b' ');
        out.extend(self.payload_type.as_bytes());
        out.push(b' ');
        out.extend(self.payload.len().to_string().as_bytes());
        out.push(b' ');
        out.extend(&self.payload);
        out
    }

    pub fn add_signature(&mut self, signer: &dyn Signer) -> Result<(), CoreError> {
        let pae = self.pae();
        let entry = SignatureEntry::sign(signer, &pae)?;
        self.signatures.retain(|existing| existing.key_id != entry.key_id);
        self.signatures.push(entry);
        Ok(())
    }

    /// Decodes and deserializes the payload as `T`. Does not itself verify signatures —
    /// callers walk `signatures` against `verify_threshold` first.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        serde_json::from_slice(&self.payload).map_err(CoreError::from)
    }

    /// Keys and identifiers of signatures that verify under a given principal's key material,
    /// used by the verification engine to compose a signer set against `role`'s threshold.
    pub fn valid_signer_ids<'a>(
        &self,
        principal_keys: impl Iterator<Item = (&'a str, &'a KeyMaterial)>,
    ) -> Vec<String> {
        let pae = self.pae();
        let mut ids = Vec::new();
        for (principal_id, key) in principal_keys {
            if self
                .signatures
                .iter()
                .any(|entry| entry.key_id == key.key_id() && entry.verify(key, &pae).is_ok())
            {
                ids.push(principal_id.to_string());
            }
        }
        ids
    }

    /// Returns `Ok(())` if enough distinct principals bound to `role` have valid signatures
    /// over this envelope to meet `role`'s threshold.
    pub fn verify_threshold<'a>(
        &self,
        role: &RoleBinding,
        principal_keys: impl Iterator<Item = (&'a str, &'a KeyMaterial)>,
    ) -> Result<(), CoreError> {
        let valid = self.valid_signer_ids(principal_keys);
        let met = role.principal_ids.iter().filter(|id| valid.contains(id)).count();
        if met < role.threshold {
            return Err(CoreError::Unauthorized {
                reason: format!("{met} of required {} signers present", role.threshold),
            });
        }
        Ok(())
    }

    /// Base64 wire encoding of the raw payload bytes, for transport/storage formats that
    /// embed the envelope as text (e.g. a blob object's content).
    pub fn payload_base64(&self) -> String {
        BASE64.encode(&self.payload)
    }
}
