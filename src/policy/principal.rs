//! Principals: the entities a rule or role binding can delegate trust to.
//!
//! Three variants exist (§3): `Key` (a single public key, ID derived from its canonical
//! bytes), `Person` (a human identity with one or more keys and optional metadata), and `Team`
//! (a named group of other principals with its own threshold). Persons and teams are only
//! valid under schema version ≥ 2 — under version 1 every principal is treated as a `Key`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::signing::KeyMaterial;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPrincipal {
    pub id: String,
    pub key: KeyMaterial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPrincipal {
    pub id: String,
    pub keys: Vec<KeyMaterial>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPrincipal {
    pub id: String,
    /// Principal IDs of team members, resolved against the same rule file's principal set.
    pub member_ids: Vec<String>,
    pub threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Key(KeyPrincipal),
    Person(PersonPrincipal),
    Team(TeamPrincipal),
}

impl Principal {
    pub fn id(&self) -> &str {
        match self {
            Principal::Key(p) => &p.id,
            Principal::Person(p) => &p.id,
            Principal::Team(p) => &p.id,
        }
    }

    /// Verification keys belonging directly to this principal. Teams have none of their own —
    /// their signer set is composed from their members by the verification engine.
    pub fn keys(&self) -> Vec<&KeyMaterial> {
        match self {
            Principal::Key(p) => vec![&p.key],
            Principal::Person(p) => p.keys.iter().collect(),
            Principal::Team(_) => Vec::new(),
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Principal::Key(_))
    }
}
