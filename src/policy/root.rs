//! Root-of-trust metadata (§3, §4.2): the principal set, role bindings, and global rules
//! that bootstrap a repository's policy, plus root succession and global-rule enforcement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::policy::principal::Principal;
use crate::policy::schema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub principal_ids: Vec<String>,
    pub threshold: usize,
}

impl RoleBinding {
    fn validate(&self) -> Result<(), CoreError> {
        if self.threshold == 0 {
            return Err(CoreError::ThresholdUnreachable("role threshold must be at least 1".to_string()));
        }
        if self.threshold > self.principal_ids.len() {
            return Err(CoreError::ThresholdUnreachable(format!(
                "role needs {} signers but only names {}",
                self.threshold,
                self.principal_ids.len()
            )));
        }
        Ok(())
    }
}

/// Repository-wide rules that apply independent of namespace-specific delegation (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GlobalRule {
    /// Every change under `pattern` additionally requires `threshold` signers, on top of
    /// whatever the matching delegation rule already demands.
    Threshold { pattern: String, threshold: usize },
    /// Force-updates (non-fast-forward reference moves) are rejected for refs under `pattern`.
    BlockForcePushes { pattern: String },
}

/// An opaque, non-executed hook declaration (§9 "hooks are declared, never run by this
/// implementation" design note) — carried through so downstream tooling can act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDefinition {
    pub name: String,
    pub stage: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub principals: Vec<Principal>,
    /// Keyed by role name; "root" and "targets" must always be present (I5).
    pub roles: BTreeMap<String, RoleBinding>,
    pub schema_version: u32,
    pub expiry: Option<i64>,
    pub global_rules: Vec<GlobalRule>,
    pub external_approval_trust: Vec<String>,
    pub propagation_directives: Vec<String>,
    pub multi_repo_controller: bool,
    pub hooks: Vec<HookDefinition>,
}

impl Root {
    pub fn new(schema_version: u32, expiry: Option<i64>) -> Root {
        Root {
            principals: Vec::new(),
            roles: BTreeMap::new(),
            schema_version,
            expiry,
            global_rules: Vec::new(),
            external_approval_trust: Vec::new(),
            propagation_directives: Vec::new(),
            multi_repo_controller: false,
            hooks: Vec::new(),
        }
    }

    fn principal_ids(&self) -> Vec<&str> {
        self.principals.iter().map(|p| p.id()).collect()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.roles.contains_key("root") || !self.roles.contains_key("targets") {
            return Err(CoreError::InvalidMetadata(
                "root metadata must bind both the root and targets roles".to_string(),
            ));
        }
        let known = self.principal_ids();
        for (role_name, binding) in &self.roles {
            binding.validate().map_err(|_| {
                CoreError::ThresholdUnreachable(format!("role {role_name} threshold unreachable"))
            })?;
            for id in &binding.principal_ids {
                if !known.contains(&id.as_str()) {
                    return Err(CoreError::UnknownPrincipal(id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn role(&self, name: &str) -> Option<&RoleBinding> {
        self.roles.get(name)
    }

    pub fn set_role(&mut self, name: &str, binding: RoleBinding) -> Result<(), CoreError> {
        let known = self.principal_ids();
        for id in &binding.principal_ids {
            if !known.contains(&id.as_str()) {
                return Err(CoreError::UnknownPrincipal(id.clone()));
            }
        }
        binding.validate()?;
        self.roles.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn remove_principal(&mut self, principal_id: &str) -> Result<(), CoreError> {
        let in_use = self
            .roles
            .values()
            .any(|binding| binding.principal_ids.iter().any(|id| id == principal_id));
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

    /// Adds a repository-wide global rule (§4.2). Enforces rule (d): a `BlockForcePushes`
    /// rule may only target reference-name patterns, not file paths.
    pub fn add_global_rule(&mut self, rule: GlobalRule) -> Result<(), CoreError> {
        match &rule {
            GlobalRule::BlockForcePushes { pattern } => {
                if !pattern.starts_with("refs/") {
                    return Err(CoreError::InvalidArgument(format!(
                        "block-force-pushes pattern {pattern} must target a reference-name pattern (refs/...)"
                    )));
                }
            }
            GlobalRule::Threshold { threshold, .. } => {
                if *threshold == 0 {
                    return Err(CoreError::ThresholdUnreachable(
                        "global threshold rule must require at least 1 signer".to_string(),
                    ));
                }
                if *threshold > self.principals.len() {
                    return Err(CoreError::ThresholdUnreachable(format!(
                        "global threshold rule needs {threshold} signers but the root only names {}",
                        self.principals.len()
                    )));
                }
            }
        }
        self.global_rules.push(rule);
        Ok(())
    }

    pub fn remove_global_rule(&mut self, rule: &GlobalRule) -> Result<(), CoreError> {
        let before = self.global_rules.len();
        self.global_rules.retain(|existing| existing != rule);
        if self.global_rules.len() == before {
            return Err(CoreError::NotFound(format!("global rule {rule:?}")));
        }
        Ok(())
    }

    /// Adds a propagation directive (§3 "propagation entry"), rejecting a duplicate.
    pub fn add_propagation_directive(&mut self, directive: impl Into<String>) -> Result<(), CoreError> {
        let directive = directive.into();
        if directive.is_empty() {
            return Err(CoreError::InvalidArgument("propagation directive must not be empty".to_string()));
        }
        if self.propagation_directives.contains(&directive) {
            return Err(CoreError::InvalidArgument(format!("propagation directive {directive} already exists")));
        }
        self.propagation_directives.push(directive);
        Ok(())
    }

    pub fn remove_propagation_directive(&mut self, directive: &str) -> Result<(), CoreError> {
        let before = self.propagation_directives.len();
        self.propagation_directives.retain(|d| d != directive);
        if self.propagation_directives.len() == before {
            return Err(CoreError::NotFound(format!("propagation directive {directive}")));
        }
        Ok(())
    }

    /// Trusts `role_name`'s signers for external-approval attestations (§3, §6). The role
    /// must already be bound in this root; enabling trust in an undefined role can never be
    /// satisfied by [`crate::verify::attestation::trusted_external_approvers`].
    pub fn enable_external_approval_trust(&mut self, role_name: &str) -> Result<(), CoreError> {
        if !self.roles.contains_key(role_name) {
            return Err(CoreError::InvalidArgument(format!("role {role_name} is not bound in this root")));
        }
        if !self.external_approval_trust.iter().any(|r| r == role_name) {
            self.external_approval_trust.push(role_name.to_string());
        }
        Ok(())
    }

    pub fn disable_external_approval_trust(&mut self, role_name: &str) -> Result<(), CoreError> {
        let before = self.external_approval_trust.len();
        self.external_approval_trust.retain(|r| r != role_name);
        if self.external_approval_trust.len() == before {
            return Err(CoreError::NotFound(format!("external approval trust role {role_name}")));
        }
        Ok(())
    }

    pub fn add_hook(&mut self, hook: HookDefinition) -> Result<(), CoreError> {
        if self.hooks.iter().any(|h| h.name == hook.name) {
            return Err(CoreError::InvalidArgument(format!("hook {} already exists", hook.name)));
        }
        self.hooks.push(hook);
        Ok(())
    }

    pub fn remove_hook(&mut self, name: &str) -> Result<(), CoreError> {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.name != name);
        if self.hooks.len() == before {
            return Err(CoreError::NotFound(format!("hook {name}")));
        }
        Ok(())
    }

    /// Root succession (§4.2): a proposed new root is authorized only when the signer set
    /// meets the threshold of the root role under BOTH the previous root's policy and the
    /// new root's own policy, so a compromised quorum cannot unilaterally relax its own rules.
    pub fn authorizes_succession(&self, new_root: &Root, signer_ids: &[String]) -> Result<(), CoreError> {
        let old_binding = self
            .role("root")
            .ok_or_else(|| CoreError::InvalidMetadata("missing root role".to_string()))?;
        let new_binding = new_root
            .role("root")
            .ok_or_else(|| CoreError::InvalidMetadata("missing root role in successor".to_string()))?;

        let count_against = |binding: &RoleBinding| {
            signer_ids
                .iter()
                .filter(|id| binding.principal_ids.contains(id))
                .count()
        };

        if count_against(old_binding) < old_binding.threshold {
            return Err(CoreError::Unauthorized {
                reason: "root succession does not meet the previous root's threshold".to_string(),
            });
        }
        if count_against(new_binding) < new_binding.threshold {
            return Err(CoreError::Unauthorized {
                reason: "root succession does not meet the new root's own threshold".to_string(),
            });
        }
        Ok(())
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

    fn root_with(names: &[&str], threshold: usize) -> Root {
        let mut root = Root::new(1, None);
        for name in names {
            root.principals.push(key_principal(name));
        }
        let binding = RoleBinding {
            principal_ids: names.iter().map(|n| n.to_string()).collect(),
            threshold,
        };
        root.set_role("root", binding.clone()).unwrap();
        root.set_role("targets", binding).unwrap();
        root
    }

    #[test]
    fn validate_requires_root_and_targets_roles() {
        let root = Root::new(1, None);
        assert!(root.validate().is_err());
    }

    #[test]
    fn validate_passes_with_both_roles_bound() {
        let root = root_with(&["alice", "bob"], 1);
        assert!(root.validate().is_ok());
    }

    #[test]
    fn succession_requires_both_thresholds() {
        let old = root_with(&["alice", "bob"], 2);
        let new = root_with(&["carol"], 1);

        assert!(old
            .authorizes_succession(&new, &["alice".to_string(), "bob".to_string()])
            .is_err());

        let mut new_with_old_signers = root_with(&["alice", "bob", "carol"], 2);
        new_with_old_signers
            .set_role(
                "root",
                RoleBinding { principal_ids: vec!["carol".to_string()], threshold: 1 },
            )
            .unwrap();
        assert!(old
            .authorizes_succession(
                &new_with_old_signers,
                &["alice".to_string(), "bob".to_string(), "carol".to_string()]
            )
            .is_ok());
    }

    #[test]
    fn cannot_remove_principal_bound_to_a_role() {
        let mut root = root_with(&["alice"], 1);
        assert!(matches!(root.remove_principal("alice").unwrap_err(), CoreError::PrincipalInUse(_)));
    }

    #[test]
    fn add_principal_rejects_duplicate_id() {
        let mut root = root_with(&["alice"], 1);
        assert!(matches!(
            root.add_principal(key_principal("alice")).unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn add_principal_rejects_person_under_schema_v1() {
        let mut root = root_with(&["alice"], 1);
        let person = Principal::Person(crate::policy::principal::PersonPrincipal {
            id: "bob".to_string(),
            keys: vec![],
            metadata: Default::default(),
        });
        assert!(matches!(root.add_principal(person).unwrap_err(), CoreError::InvalidMetadata(_)));
    }

    #[test]
    fn add_global_rule_rejects_force_push_rule_over_a_path_pattern() {
        let mut root = root_with(&["alice"], 1);
        let err = root
            .add_global_rule(GlobalRule::BlockForcePushes { pattern: "src/*".to_string() })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn add_global_rule_accepts_force_push_rule_over_a_ref_pattern() {
        let mut root = root_with(&["alice"], 1);
        root.add_global_rule(GlobalRule::BlockForcePushes { pattern: "refs/heads/*".to_string() }).unwrap();
        assert_eq!(root.global_rules.len(), 1);
    }

    #[test]
    fn add_global_rule_rejects_threshold_above_principal_count() {
        let mut root = root_with(&["alice"], 1);
        let err = root
            .add_global_rule(GlobalRule::Threshold { pattern: "refs/heads/*".to_string(), threshold: 5 })
            .unwrap_err();
        assert!(matches!(err, CoreError::ThresholdUnreachable(_)));
    }

    #[test]
    fn remove_global_rule_requires_an_existing_match() {
        let mut root = root_with(&["alice"], 1);
        let rule = GlobalRule::BlockForcePushes { pattern: "refs/heads/*".to_string() };
        root.add_global_rule(rule.clone()).unwrap();
        root.remove_global_rule(&rule).unwrap();
        assert!(root.global_rules.is_empty());
        assert!(matches!(root.remove_global_rule(&rule).unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn propagation_directives_add_remove_round_trip() {
        let mut root = root_with(&["alice"], 1);
        root.add_propagation_directive("upstream/main->vendor/upstream").unwrap();
        assert!(matches!(
            root.add_propagation_directive("upstream/main->vendor/upstream").unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
        root.remove_propagation_directive("upstream/main->vendor/upstream").unwrap();
        assert!(root.propagation_directives.is_empty());
        assert!(matches!(
            root.remove_propagation_directive("missing").unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn external_approval_trust_requires_a_bound_role() {
        let mut root = root_with(&["alice"], 1);
        assert!(matches!(
            root.enable_external_approval_trust("reviewers").unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
        root.set_role("reviewers", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.enable_external_approval_trust("reviewers").unwrap();
        root.enable_external_approval_trust("reviewers").unwrap(); // idempotent
        assert_eq!(root.external_approval_trust, vec!["reviewers".to_string()]);
        root.disable_external_approval_trust("reviewers").unwrap();
        assert!(root.external_approval_trust.is_empty());
        assert!(matches!(
            root.disable_external_approval_trust("reviewers").unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn hooks_add_remove_round_trip() {
        let mut root = root_with(&["alice"], 1);
        let hook = HookDefinition {
            name: "pre-push".to_string(),
            stage: "pre-push".to_string(),
            command: "./check.sh".to_string(),
        };
        root.add_hook(hook.clone()).unwrap();
        assert!(matches!(root.add_hook(hook).unwrap_err(), CoreError::InvalidArgument(_)));
        root.remove_hook("pre-push").unwrap();
        assert!(root.hooks.is_empty());
        assert!(matches!(root.remove_hook("pre-push").unwrap_err(), CoreError::NotFound(_)));
    }
}
