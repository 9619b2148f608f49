//! Delegation rules (§4.2): a named, ordered list of (pattern, authorized principals,
//! threshold) entries plus a mandatory trailing catch-all, grouped with the principal set
//! they draw from into a `RuleFile`.

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::policy::pattern;
use crate::policy::principal::Principal;
use crate::policy::schema;

/// Name reserved for this implementation's own bookkeeping; user rule files may not define
/// a non-catch-all rule under this prefix (I7).
pub const RESERVED_PREFIX: &str = "gittuf-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub patterns: Vec<String>,
    pub authorized_principal_ids: Vec<String>,
    pub threshold: usize,
    /// A terminating rule stops delegation traversal for any path it matches, even if a
    /// later rule in the same file would also match (§4.2, §4.4.1).
    pub terminating: bool,
    /// Name of a rule file trusted for the sub-namespace this rule matches (§3 "delegation
    /// tree"). Resolved against [`crate::policy::store::MetadataBundle::rule_files`] at
    /// verification time; the metadata layer itself does not require the named file to exist
    /// yet, since rule files in a delegation tree may be authored in either order.
    #[serde(default)]
    pub delegate: Option<String>,
}

impl Rule {
    pub fn matches_path(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern::matches(pattern, path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    pub principals: Vec<Principal>,
    /// Ordered; the last element must always be the catch-all rule (pattern `*`, no
    /// authorized principals, threshold 0) per spec §4.2.
    pub rules: Vec<Rule>,
    pub expiry: Option<i64>,
    pub schema_version: u32,
}

impl RuleFile {
    /// Builds an empty rule file containing only the mandatory catch-all rule.
    pub fn new(schema_version: u32, expiry: Option<i64>) -> RuleFile {
        RuleFile {
            principals: Vec::new(),
            rules: vec![catch_all_rule()],
            expiry,
            schema_version,
        }
    }

    fn principal_ids(&self) -> Vec<&str> {
        self.principals.iter().map(|p| p.id()).collect()
    }

    fn validate_new_rule(&self, rule: &Rule) -> Result<(), CoreError> {
        if rule.name != RESERVED_PREFIX.trim_end_matches('-')
            && rule.name.starts_with(RESERVED_PREFIX)
        {
            return Err(CoreError::InvalidArgument(format!(
                "rule name {} uses the reserved {RESERVED_PREFIX} prefix",
                rule.name
            )));
        }
        if self.rules.iter().any(|existing| existing.name == rule.name) {
            return Err(CoreError::DuplicateRuleName(rule.name.clone()));
        }
        if rule.threshold > rule.authorized_principal_ids.len() {
            return Err(CoreError::ThresholdUnreachable(format!(
                "rule {} needs {} signers but only names {}",
                rule.name,
                rule.threshold,
                rule.authorized_principal_ids.len()
            )));
        }
        let known = self.principal_ids();
        for id in &rule.authorized_principal_ids {
            if !known.contains(&id.as_str()) {
                return Err(CoreError::UnknownPrincipal(id.clone()));
            }
        }
        Ok(())
    }

    /// Inserts `rule` immediately before the catch-all rule, which always stays last.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), CoreError> {
        self.validate_new_rule(&rule)?;
        let insert_at = self.rules.len() - 1;
        self.rules.insert(insert_at, rule);
        Ok(())
    }

    pub fn update_rule(&mut self, name: &str, updated: Rule) -> Result<(), CoreError> {
        let index = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| CoreError::RuleNotFound(name.to_string()))?;
        if index == self.rules.len() - 1 {
            return Err(CoreError::InvalidArgument("cannot modify the catch-all rule".to_string()));
        }
        let known = self.principal_ids();
        for id in &updated.authorized_principal_ids {
            if !known.contains(&id.as_str()) {
                return Err(CoreError::UnknownPrincipal(id.clone()));
            }
        }
        if updated.threshold > updated.authorized_principal_ids.len() {
            return Err(CoreError::ThresholdUnreachable(format!(
                "rule {} needs {} signers but only names {}",
                updated.name,
                updated.threshold,
                updated.authorized_principal_ids.len()
            )));
        }
        if updated.name != name && self.rules.iter().any(|r| r.name == updated.name) {
            return Err(CoreError::DuplicateRuleName(updated.name.clone()));
        }
        self.rules[index] = updated;
        Ok(())
    }

    pub fn remove_rule(&mut self, name: &str) -> Result<(), CoreError> {
        let index = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| CoreError::RuleNotFound(name.to_string()))?;
        if index == self.rules.len() - 1 {
            return Err(CoreError::InvalidArgument("cannot remove the catch-all rule".to_string()));
        }
        self.rules.remove(index);
        Ok(())
    }

    /// Moves the rule `name` to sit immediately before the rule currently at `before`,
    /// preserving the catch-all rule's position as last.
    pub fn reorder_rule(&mut self, name: &str, before: Option<&str>) -> Result<(), CoreError> {
        let from = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| CoreError::RuleNotFound(name.to_string()))?;
        if from == self.rules.len() - 1 {
            return Err(CoreError::InvalidArgument("cannot reorder the catch-all rule".to_string()));
        }
        let rule = self.rules.remove(from);
        let to = match before {
            Some(marker) => self
                .rules
                .iter()
                .position(|r| r.name == marker)
                .ok_or_else(|| CoreError::RuleNotFound(marker.to_string()))?,
            None => self.rules.len() - 1,
        };
        self.rules.insert(to, rule);
        Ok(())
    }

    /// Adds a principal, rejecting a duplicate ID and rejecting `Person`/`Team` principals
    /// under schema version 1 (§3, §4.2).
    pub fn add_principal(&mut self, principal: Principal) -> Result<(), CoreError> {
        if self.principals.iter().any(|p| p.id() == principal.id()) {
            return Err(CoreError::InvalidArgument(format!("principal {} already exists", principal.id())));
        }
        schema::validate_principal_versions(std::slice::from_ref(&principal), self.schema_version)?;
        self.principals.push(principal);
        Ok(())
    }

    pub fn remove_principal(&mut self, principal_id: &str) -> Result<(), CoreError> {
        let in_use = self
            .rules
            .iter()
            .any(|r| r.authorized_principal_ids.iter().any(|id| id == principal_id));
        if in_use {
            return Err(CoreError::PrincipalInUse(principal_id.to_string()));
        }
        let before = self.principals.len();
        self.principals.retain(|p| p.id() != principal_id);
        if self.principals.len() == before {
            return Err(CoreError::UnknownPrincipal(principal_id.to_string()));
        }
        Ok(())
    }

    /// Returns the first rule, in order, whose patterns match `path`; every `RuleFile` is
    /// guaranteed to return at least the catch-all rule.
    pub fn matching_rule(&self, path: &str) -> &Rule {
        self.rules
            .iter()
            .find(|rule| rule.matches_path(path))
            .unwrap_or_else(|| self.rules.last().expect("rule file always has a catch-all"))
    }

    /// Every rule, in order, whose patterns match `path` (§4.4.1): *all* matches apply, not just
    /// the first, but a `terminating` match stops the scan so later rules in this same file are
    /// not consulted (delegated files already reached by an earlier match are unaffected).
    pub fn matching_rules(&self, path: &str) -> Vec<&Rule> {
        let mut matched = Vec::new();
        for rule in &self.rules {
            if rule.matches_path(path) {
                let stop = rule.terminating;
                matched.push(rule);
                if stop {
                    break;
                }
            }
        }
        matched
    }
}

fn catch_all_rule() -> Rule {
    Rule {
        name: format!("{RESERVED_PREFIX}catch-all"),
        patterns: vec!["*".to_string()],
        authorized_principal_ids: Vec::new(),
        threshold: 0,
        terminating: false,
        delegate: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::principal::KeyPrincipal;
    use crate::signing::KeyMaterial;

    fn key_principal(name: &str) -> Principal {
        Principal::Key(KeyPrincipal {
            id: name.to_string(),
            key: KeyMaterial::Ed25519 { public_key: name.as_bytes().to_vec() },
        })
    }

    #[test]
    fn new_file_has_only_catch_all() {
        let file = RuleFile::new(1, None);
        assert_eq!(file.rules.len(), 1);
        assert_eq!(file.matching_rule("anything").name, "gittuf-catch-all");
    }

    #[test]
    fn add_rule_stays_before_catch_all() {
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        file.add_rule(Rule {
            name: "protect-main".to_string(),
            patterns: vec!["refs/heads/main".to_string()],
            authorized_principal_ids: vec!["alice".to_string()],
            threshold: 1,
            terminating: true,
            delegate: None,
        })
        .unwrap();
        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules.last().unwrap().name, "gittuf-catch-all");
        assert_eq!(file.matching_rule("refs/heads/main").name, "protect-main");
    }

    #[test]
    fn rejects_threshold_above_principal_count() {
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        let err = file
            .add_rule(Rule {
                name: "too-strict".to_string(),
                patterns: vec!["*".to_string()],
                authorized_principal_ids: vec!["alice".to_string()],
                threshold: 2,
                terminating: false,
                delegate: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::ThresholdUnreachable(_)));
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        let rule = Rule {
            name: "r".to_string(),
            patterns: vec!["*".to_string()],
            authorized_principal_ids: vec!["alice".to_string()],
            threshold: 1,
            terminating: false,
            delegate: None,
        };
        file.add_rule(rule.clone()).unwrap();
        assert!(matches!(file.add_rule(rule).unwrap_err(), CoreError::DuplicateRuleName(_)));
    }

    #[test]
    fn rejects_reserved_prefix() {
        let file = RuleFile::new(1, None);
        let mut file = file;
        let err = file
            .add_rule(Rule {
                name: "gittuf-sneaky".to_string(),
                patterns: vec!["*".to_string()],
                authorized_principal_ids: vec![],
                threshold: 0,
                terminating: false,
                delegate: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn add_principal_rejects_duplicate_id() {
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        assert!(matches!(file.add_principal(key_principal("alice")).unwrap_err(), CoreError::InvalidArgument(_)));
    }

    #[test]
    fn add_principal_rejects_person_under_schema_v1() {
        let mut file = RuleFile::new(1, None);
        let person = Principal::Person(crate::policy::principal::PersonPrincipal {
            id: "bob".to_string(),
            keys: vec![],
            metadata: Default::default(),
        });
        assert!(matches!(file.add_principal(person).unwrap_err(), CoreError::InvalidMetadata(_)));
    }

    #[test]
    fn cannot_remove_principal_in_use() {
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        file.add_rule(Rule {
            name: "r".to_string(),
            patterns: vec!["*".to_string()],
            authorized_principal_ids: vec!["alice".to_string()],
            threshold: 1,
            terminating: false,
            delegate: None,
        })
        .unwrap();
        assert!(matches!(file.remove_principal("alice").unwrap_err(), CoreError::PrincipalInUse(_)));
    }

    #[test]
    fn reordering_changes_which_terminating_rule_shadows() {
        // S5: r1 is terminating over `foo/*`; r2 matches the narrower `foo/bar`. Until
        // reordered, r1 shadows r2 for `foo/bar` because it comes first and terminates.
        let mut file = RuleFile::new(1, None);
        file.principals.push(key_principal("alice"));
        file.principals.push(key_principal("bob"));
        file.add_rule(Rule {
            name: "r1".to_string(),
            patterns: vec!["foo/*".to_string()],
            authorized_principal_ids: vec!["alice".to_string()],
            threshold: 1,
            terminating: true,
            delegate: None,
        })
        .unwrap();
        file.add_rule(Rule {
            name: "r2".to_string(),
            patterns: vec!["foo/bar".to_string()],
            authorized_principal_ids: vec!["bob".to_string()],
            threshold: 1,
            terminating: false,
            delegate: None,
        })
        .unwrap();

        let before: Vec<&str> = file.matching_rules("foo/bar").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(before, vec!["r1"]);

        file.reorder_rule("r2", Some("r1")).unwrap();
        let after: Vec<&str> = file.matching_rules("foo/bar").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(after, vec!["r2"]);
    }
}
