//! Schema-version dispatch for root-of-trust and rule-file payload types (§3, §9).
//!
//! Version 1 documents may only declare `Key` principals; version 2 adds `Person` and
//! `Team`. The URI a document's `payload_type` carries is what determines which schema
//! applies — not a bare integer — so old documents keep verifying identically even as new
//! schema URIs are introduced.

use crate::errors::CoreError;
use crate::policy::principal::Principal;
use crate::policy::root::Root;
use crate::policy::rule::RuleFile;

pub const ROOT_SCHEMA_V1: &str = "https://gittuf.dev/policy/root/v0.1";
pub const ROOT_SCHEMA_V2: &str = "https://gittuf.dev/policy/root/v0.2";
pub const RULE_FILE_SCHEMA_V1: &str = "https://gittuf.dev/policy/targets/v0.1";
pub const RULE_FILE_SCHEMA_V2: &str = "https://gittuf.dev/policy/targets/v0.2";

/// Returns the schema version number a known payload-type URI corresponds to.
pub fn version_for_uri(uri: &str) -> Result<u32, CoreError> {
    match uri {
        ROOT_SCHEMA_V1 | RULE_FILE_SCHEMA_V1 => Ok(1),
        ROOT_SCHEMA_V2 | RULE_FILE_SCHEMA_V2 => Ok(2),
        other => Err(CoreError::InvalidMetadata(format!("unrecognized schema URI: {other}"))),
    }
}

pub fn root_schema_uri(version: u32) -> Result<&'static str, CoreError> {
    match version {
        1 => Ok(ROOT_SCHEMA_V1),
        2 => Ok(ROOT_SCHEMA_V2),
        other => Err(CoreError::InvalidMetadata(format!("unsupported root schema version {other}"))),
    }
}

pub fn rule_file_schema_uri(version: u32) -> Result<&'static str, CoreError> {
    match version {
        1 => Ok(RULE_FILE_SCHEMA_V1),
        2 => Ok(RULE_FILE_SCHEMA_V2),
        other => Err(CoreError::InvalidMetadata(format!("unsupported rule file schema version {other}"))),
    }
}

/// Rejects `Person`/`Team` principals under schema version 1.
pub fn validate_principal_versions(principals: &[Principal], schema_version: u32) -> Result<(), CoreError> {
    if schema_version >= 2 {
        return Ok(());
    }
    for principal in principals {
        if !principal.is_key() {
            return Err(CoreError::InvalidMetadata(format!(
                "principal {} requires schema version >= 2",
                principal.id()
            )));
        }
    }
    Ok(())
}

pub fn validate_root(root: &Root) -> Result<(), CoreError> {
    validate_principal_versions(&root.principals, root.schema_version)?;
    root.validate()
}

pub fn validate_rule_file(rule_file: &RuleFile) -> Result<(), CoreError> {
    validate_principal_versions(&rule_file.principals, rule_file.schema_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::principal::{KeyPrincipal, PersonPrincipal};
    use crate::signing::KeyMaterial;

    #[test]
    fn known_uris_round_trip_to_versions() {
        assert_eq!(version_for_uri(ROOT_SCHEMA_V1).unwrap(), 1);
        assert_eq!(version_for_uri(ROOT_SCHEMA_V2).unwrap(), 2);
        assert_eq!(root_schema_uri(1).unwrap(), ROOT_SCHEMA_V1);
    }

    #[test]
    fn person_principal_rejected_under_v1() {
        let principals = vec![Principal::Person(PersonPrincipal {
            id: "alice".to_string(),
            keys: vec![],
            metadata: Default::default(),
        })];
        assert!(validate_principal_versions(&principals, 1).is_err());
        assert!(validate_principal_versions(&principals, 2).is_ok());
    }

    #[test]
    fn key_principal_allowed_under_v1() {
        let principals = vec![Principal::Key(KeyPrincipal {
            id: "alice".to_string(),
            key: KeyMaterial::Ed25519 { public_key: vec![1] },
        })];
        assert!(validate_principal_versions(&principals, 1).is_ok());
    }
}
