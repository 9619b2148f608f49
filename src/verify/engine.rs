//! The Verification Engine (§4.4): replays a reference's RSL history transition by transition,
//! reconstructing the policy in force at each step and checking that every matching delegation
//! rule and global rule was satisfied.

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::policy::pattern;
use crate::policy::principal::Principal;
use crate::policy::root::{GlobalRule, Root};
use crate::policy::store::{MetadataBundle, POLICY_REF};
use crate::rsl::log as rsl_log;
use crate::signing::KeyMaterial;
use crate::store::{ObjectStore, SignatureStatus};
use crate::verify::attestation;
use crate::verify::policy_walk::{self, ResolvedRule};
use crate::verify::result::{FailingConstraint, Rejection, VerificationOutcome};

/// Verifies `reference` up to its latest unskipped RSL entry.
pub fn verify(store: &dyn ObjectStore, reference: &str) -> Result<VerificationOutcome, CoreError> {
    match rsl_log::latest_unskipped_for_ref(store, reference)? {
        Some((to_hash, _)) => verify_up_to(store, reference, to_hash),
        None => Ok(VerificationOutcome::Verified { entries_consumed: Vec::new() }),
    }
}

/// Verifies `reference`'s history up to (and including) the first unskipped reference entry
/// that records `target` (§4.4 step 2: "the first reference entry for R whose target equals
/// T"), failing with `TargetNotInLog` if no such entry exists.
pub fn verify_to_target(store: &dyn ObjectStore, reference: &str, target: ObjectHash) -> Result<VerificationOutcome, CoreError> {
    match rsl_log::earliest_unskipped_for_target(store, reference, target, None)? {
        Some(to_hash) => verify_up_to(store, reference, to_hash),
        None => Err(CoreError::TargetNotInLog {
            reference: reference.to_string(),
            target: target.to_string(),
        }),
    }
}

/// Verifies `reference`'s history up to (and including) the RSL entry hashed `to`.
pub fn verify_up_to(store: &dyn ObjectStore, reference: &str, to: ObjectHash) -> Result<VerificationOutcome, CoreError> {
    let span = tracing::info_span!("verify", reference, to = %to);
    let _enter = span.enter();

    let logged = rsl_log::entries_in_range(store, None, to)?;
    let relevant: Vec<_> = logged
        .into_iter()
        .filter(|l| l.entry.reference == reference)
        .filter(|l| !l.annotations.iter().any(|a| a.skip))
        .collect();

    let mut entries_consumed = Vec::new();
    let mut prev_target: Option<ObjectHash> = None;

    for logged_entry in &relevant {
        let curr = &logged_entry.entry;
        let namespace = curr.override_ref.clone().unwrap_or_else(|| curr.reference.clone());

        let Some(bundle) = policy_bundle_at(store, curr.number)? else {
            // No policy has ever been promoted at this point in history: nothing to enforce yet.
            entries_consumed.push(logged_entry.hash);
            prev_target = Some(curr.target);
            continue;
        };
        let root: Root = bundle.root.decode()?;

        let extra_signers = collect_extra_signers(store, &namespace, prev_target, curr.target, &root)?;
        let is_force_update = match prev_target {
            Some(prev) => !store.knows(&curr.target, &prev)?,
            None => false,
        };

        if let Some(rejection) =
            check_global_rules(store, &root, &namespace, logged_entry.hash, &extra_signers, is_force_update)?
        {
            tracing::warn!(entry = %logged_entry.hash, %rejection, "rejected at global rule");
            return Ok(VerificationOutcome::Rejected(rejection));
        }
        if let Some(rejection) = check_namespace(store, &bundle, &namespace, logged_entry.hash, &extra_signers)? {
            tracing::warn!(entry = %logged_entry.hash, %rejection, "rejected at reference namespace");
            return Ok(VerificationOutcome::Rejected(rejection));
        }

        let changed_commits = store.commits_reachable_not_in(&curr.target, prev_target.as_ref())?;
        for commit in &changed_commits {
            for path in store.paths_changed(commit)? {
                let path_str = path.to_string_lossy().to_string();
                if let Some(rejection) =
                    check_global_rules(store, &root, &path_str, logged_entry.hash, &extra_signers, false)?
                {
                    tracing::warn!(entry = %logged_entry.hash, %rejection, "rejected at global rule for changed path");
                    return Ok(VerificationOutcome::Rejected(rejection));
                }
                if let Some(rejection) = check_namespace(store, &bundle, &path_str, logged_entry.hash, &extra_signers)? {
                    tracing::warn!(entry = %logged_entry.hash, %rejection, "rejected at changed path");
                    return Ok(VerificationOutcome::Rejected(rejection));
                }
            }
        }

        entries_consumed.push(logged_entry.hash);
        prev_target = Some(curr.target);
    }

    tracing::debug!(consumed = entries_consumed.len(), "verification passed");
    Ok(VerificationOutcome::Verified { entries_consumed })
}

/// The metadata bundle in force at RSL counter `max_number`: the bundle carried by the most
/// recent unskipped RSL entry for [`POLICY_REF`] whose counter does not exceed it (§4.4 step
/// 3a). `None` before any policy has ever been promoted.
fn policy_bundle_at(store: &dyn ObjectStore, max_number: u64) -> Result<Option<MetadataBundle>, CoreError> {
    let Some((_, policy_entry)) = rsl_log::latest_unskipped_at_or_before(store, POLICY_REF, max_number)? else {
        return Ok(None);
    };
    let commit = store.read_commit(&policy_entry.target)?;
    Ok(Some(MetadataBundle::from_tree(store, &commit.tree_id)?))
}

/// Principal IDs that contributed a valid signature over the RSL entry itself, from among
/// `principals`. A `Team` contributes nothing directly — its membership is resolved separately
/// by [`resolve_team_memberships`].
fn base_signers(store: &dyn ObjectStore, entry_hash: ObjectHash, principals: &[Principal]) -> Vec<String> {
    let mut signers = Vec::new();
    for principal in principals {
        for key in principal.keys() {
            if matches!(store.verify_signature(&entry_hash, key), Ok(SignatureStatus::Ok)) {
                signers.push(principal.id().to_string());
                break;
            }
        }
    }
    signers
}

/// Extends `signers` with any `Team` principal whose member threshold is met by the signers
/// already known, iterating to a fixed point so a team-of-teams resolves correctly regardless
/// of declaration order.
fn resolve_team_memberships(mut signers: Vec<String>, principals: &[Principal]) -> Vec<String> {
    loop {
        let mut changed = false;
        for principal in principals {
            if let Principal::Team(team) = principal {
                if signers.contains(&team.id) {
                    continue;
                }
                let met = team.member_ids.iter().filter(|m| signers.contains(m)).count();
                if met >= team.threshold {
                    signers.push(team.id.clone());
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    signers
}

/// Approver IDs contributed by attestations recorded for this transition: repository-internal
/// reference authorizations (taken at face value — their approvers still have to be known,
/// authorized principals for the check to matter) and externally-trusted approvals.
fn collect_extra_signers(
    store: &dyn ObjectStore,
    reference: &str,
    from: Option<ObjectHash>,
    to: ObjectHash,
    root: &Root,
) -> Result<Vec<String>, CoreError> {
    let envelopes = attestation::attestations_for(store, reference, from, to)?;
    if envelopes.is_empty() {
        return Ok(Vec::new());
    }
    let principal_keys: Vec<(String, KeyMaterial)> = root
        .principals
        .iter()
        .filter_map(|p| p.keys().into_iter().next().map(|k| (p.id().to_string(), k.clone())))
        .collect();

    let mut out = Vec::new();
    for envelope in envelopes {
        match envelope.payload_type.as_str() {
            attestation::REFERENCE_AUTHORIZATION_TYPE => {
                // The authorization's own signatures are the only trustworthy source of who
                // contributed it (§6, I8) — its self-declared `approvers` field is not.
                let keys = principal_keys.iter().map(|(id, key)| (id.as_str(), key));
                out.extend(envelope.valid_signer_ids(keys));
            }
            attestation::EXTERNAL_APPROVAL_TYPE => {
                out.extend(attestation::trusted_external_approvers(&envelope, root, &principal_keys)?);
            }
            _ => {}
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// Walks the delegation tree for `namespace` and checks every matching rule's threshold,
/// returning the first one not met.
fn check_namespace(
    store: &dyn ObjectStore,
    bundle: &MetadataBundle,
    namespace: &str,
    entry_hash: ObjectHash,
    extra_signers: &[String],
) -> Result<Option<Rejection>, CoreError> {
    let resolved = policy_walk::resolve_namespace(bundle, namespace)?;
    for ResolvedRule { rule_file, rule } in resolved {
        if rule.threshold == 0 {
            continue;
        }
        let Some(file) = policy_walk::decode_rule_file(bundle, &rule_file)? else { continue };

        let mut signers = base_signers(store, entry_hash, &file.principals);
        signers.extend(extra_signers.iter().cloned());
        signers.sort();
        signers.dedup();
        let signers = resolve_team_memberships(signers, &file.principals);

        let met = rule.authorized_principal_ids.iter().filter(|id| signers.contains(id)).count();
        if met < rule.threshold {
            return Ok(Some(Rejection {
                failing_entry: entry_hash,
                constraint: FailingConstraint::Rule { rule_file, rule_name: rule.name.clone() },
                namespace: namespace.to_string(),
                signers_found: signers,
                reason: format!("{met} of required {} signers present", rule.threshold),
            }));
        }
    }
    Ok(None)
}

/// Checks `namespace` against every repository-wide global rule in `root`.
fn check_global_rules(
    store: &dyn ObjectStore,
    root: &Root,
    namespace: &str,
    entry_hash: ObjectHash,
    extra_signers: &[String],
    is_force_update: bool,
) -> Result<Option<Rejection>, CoreError> {
    for rule in &root.global_rules {
        match rule {
            GlobalRule::Threshold { pattern: rule_pattern, threshold } => {
                if !pattern::matches(rule_pattern, namespace) {
                    continue;
                }
                let mut signers = base_signers(store, entry_hash, &root.principals);
                signers.extend(extra_signers.iter().cloned());
                signers.sort();
                signers.dedup();
                let signers = resolve_team_memberships(signers, &root.principals);
                if signers.len() < *threshold {
                    return Ok(Some(Rejection {
                        failing_entry: entry_hash,
                        constraint: FailingConstraint::GlobalThreshold { pattern: rule_pattern.clone() },
                        namespace: namespace.to_string(),
                        signers_found: signers,
                        reason: format!("{} of required {threshold} global signers present", signers.len()),
                    }));
                }
            }
            GlobalRule::BlockForcePushes { pattern: rule_pattern } => {
                if is_force_update && pattern::matches(rule_pattern, namespace) {
                    return Ok(Some(Rejection {
                        failing_entry: entry_hash,
                        constraint: FailingConstraint::GlobalBlockForcePush { pattern: rule_pattern.clone() },
                        namespace: namespace.to_string(),
                        signers_found: Vec::new(),
                        reason: "force update to a non-fast-forward target is blocked".to_string(),
                    }));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};
    use crate::internal::object::signature::SignatureType;
    use crate::internal::object::tree::TreeItemMode;
    use crate::policy::envelope::Envelope;
    use crate::policy::principal::KeyPrincipal;
    use crate::policy::root::RoleBinding;
    use crate::policy::rule::{Rule, RuleFile};
    use crate::policy::schema::{ROOT_SCHEMA_V1, RULE_FILE_SCHEMA_V1};
    use crate::policy::store as policy_store;
    use crate::signing::{Signer, SigningKey};
    use crate::store::{MemoryStore, TreeBuildEntry};
    use crate::testkit::TestPrincipal;

    fn sig(name: &str) -> crate::internal::object::signature::Signature {
        crate::internal::object::signature::Signature::new(SignatureType::Committer, name.to_string(), format!("{name}@example.com"))
    }

    /// Builds a repository with one rule, "protect-main", requiring `threshold` signers out of
    /// `alice`/`bob` over `refs/heads/main`, and promotes it as the applied policy.
    fn repo_with_main_rule(threshold: usize) -> (MemoryStore, TestPrincipal, TestPrincipal) {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let mut store = MemoryStore::new();
        let alice = TestPrincipal::generate("alice");
        let bob = TestPrincipal::generate("bob");

        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "alice".to_string(), key: alice.public_key() }));
        root.principals.push(Principal::Key(KeyPrincipal { id: "bob".to_string(), key: bob.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();

        let mut targets = RuleFile::new(1, None);
        targets.principals.push(Principal::Key(KeyPrincipal { id: "alice".to_string(), key: alice.public_key() }));
        targets.principals.push(Principal::Key(KeyPrincipal { id: "bob".to_string(), key: bob.public_key() }));
        targets
            .add_rule(Rule {
                name: "protect-main".to_string(),
                patterns: vec!["refs/heads/main".to_string()],
                authorized_principal_ids: vec!["alice".to_string(), "bob".to_string()],
                threshold,
                terminating: true,
                delegate: None,
            })
            .unwrap();

        let mut root_envelope = Envelope::new(&root, ROOT_SCHEMA_V1).unwrap();
        root_envelope.add_signature(&alice.signing_key).unwrap();
        let mut bundle = policy_store::MetadataBundle::new(root_envelope);
        bundle.rule_files.insert("targets".to_string(), Envelope::new(&targets, RULE_FILE_SCHEMA_V1).unwrap());

        policy_store::stage(&mut store, &bundle, sig("alice"), sig("alice"), "stage root", None).unwrap();
        policy_store::promote_if_authorized(&mut store, &root, sig("alice"), sig("alice")).unwrap();

        (store, alice, bob)
    }

    fn commit_with_file(store: &mut MemoryStore, content: &[u8], parent: Option<ObjectHash>) -> ObjectHash {
        let blob = store.write_blob(content).unwrap();
        let tree = store
            .build_tree(vec![TreeBuildEntry {
                path: std::path::PathBuf::from("file.txt"),
                mode: TreeItemMode::Blob,
                hash: blob,
            }])
            .unwrap();
        store
            .commit(tree, parent.into_iter().collect(), sig("author"), sig("committer"), "change", None)
            .unwrap()
    }

    #[test]
    fn push_signed_by_required_principal_is_verified() {
        let (mut store, alice, _bob) = repo_with_main_rule(1);
        let target = commit_with_file(&mut store, b"v1", None);

        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            target,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        let outcome = verify(&store, "refs/heads/main").unwrap();
        assert!(outcome.is_verified());
    }

    #[test]
    fn unsigned_push_is_rejected() {
        let (mut store, _alice, _bob) = repo_with_main_rule(1);
        let target = commit_with_file(&mut store, b"v1", None);

        rsl_log::append_reference_entry(&mut store, "refs/heads/main", target, None, false, sig("x"), sig("x"), None).unwrap();

        let outcome = verify(&store, "refs/heads/main").unwrap();
        match outcome {
            VerificationOutcome::Rejected(r) => {
                assert_eq!(r.constraint, FailingConstraint::Rule { rule_file: "targets".to_string(), rule_name: "protect-main".to_string() });
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn push_signed_by_unrelated_key_is_rejected() {
        let (mut store, _alice, _bob) = repo_with_main_rule(1);
        let mallory = TestPrincipal::generate("mallory");
        let target = commit_with_file(&mut store, b"v1", None);

        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            target,
            None,
            false,
            sig("mallory"),
            sig("mallory"),
            Some(&mallory.signing_key as &dyn Signer),
        )
        .unwrap();

        assert!(!verify(&store, "refs/heads/main").unwrap().is_verified());
    }

    #[test]
    fn two_signer_threshold_needs_both() {
        let (mut store, alice, _bob) = repo_with_main_rule(2);
        let target = commit_with_file(&mut store, b"v1", None);

        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            target,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        // Only one of the two required signers: still rejected. The base RSL signer mechanism
        // only carries a single signature per commit, so meeting a threshold above one requires
        // attestation-contributed approvers; that path is exercised in the attestation tests.
        assert!(!verify(&store, "refs/heads/main").unwrap().is_verified());
    }

    #[test]
    fn attestation_approver_completes_the_threshold() {
        let (mut store, alice, bob) = repo_with_main_rule(2);
        let target = commit_with_file(&mut store, b"v1", None);

        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            target,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        let auth = attestation::ReferenceAuthorization {
            reference: "refs/heads/main".to_string(),
            from_target: None,
            to_target: target,
            approvers: vec!["bob".to_string()],
        };
        let mut envelope = Envelope::new(&auth, attestation::REFERENCE_AUTHORIZATION_TYPE).unwrap();
        envelope.add_signature(&bob.signing_key).unwrap();
        attestation::record_attestation(
            &mut store,
            "refs/heads/main",
            None,
            target,
            &envelope,
            &bob.signing_key.key_id(),
            sig("bob"),
            sig("bob"),
            "bob approves",
            None,
        )
        .unwrap();

        assert!(verify(&store, "refs/heads/main").unwrap().is_verified());
    }

    #[test]
    fn force_push_blocked_by_global_rule() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let mut store = MemoryStore::new();
        let alice = TestPrincipal::generate("alice");

        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "alice".to_string(), key: alice.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.global_rules.push(GlobalRule::BlockForcePushes { pattern: "refs/heads/*".to_string() });

        let targets = RuleFile::new(1, None);
        let mut root_envelope = Envelope::new(&root, ROOT_SCHEMA_V1).unwrap();
        root_envelope.add_signature(&alice.signing_key).unwrap();
        let mut bundle = policy_store::MetadataBundle::new(root_envelope);
        bundle.rule_files.insert("targets".to_string(), Envelope::new(&targets, RULE_FILE_SCHEMA_V1).unwrap());
        policy_store::stage(&mut store, &bundle, sig("alice"), sig("alice"), "stage root", None).unwrap();
        policy_store::promote_if_authorized(&mut store, &root, sig("alice"), sig("alice")).unwrap();

        let first = commit_with_file(&mut store, b"v1", None);
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            first,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        // A sibling commit not descended from `first`: a force update.
        let diverged = commit_with_file(&mut store, b"v2-diverged", None);
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            diverged,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        let outcome = verify(&store, "refs/heads/main").unwrap();
        match outcome {
            VerificationOutcome::Rejected(r) => {
                assert_eq!(r.constraint, FailingConstraint::GlobalBlockForcePush { pattern: "refs/heads/*".to_string() });
            }
            _ => panic!("expected force-push rejection"),
        }
    }

    #[test]
    fn fast_forward_is_not_treated_as_force_push() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let mut store = MemoryStore::new();
        let alice = TestPrincipal::generate("alice");

        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "alice".to_string(), key: alice.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.global_rules.push(GlobalRule::BlockForcePushes { pattern: "refs/heads/*".to_string() });

        let targets = RuleFile::new(1, None);
        let mut root_envelope = Envelope::new(&root, ROOT_SCHEMA_V1).unwrap();
        root_envelope.add_signature(&alice.signing_key).unwrap();
        let mut bundle = policy_store::MetadataBundle::new(root_envelope);
        bundle.rule_files.insert("targets".to_string(), Envelope::new(&targets, RULE_FILE_SCHEMA_V1).unwrap());
        policy_store::stage(&mut store, &bundle, sig("alice"), sig("alice"), "stage root", None).unwrap();
        policy_store::promote_if_authorized(&mut store, &root, sig("alice"), sig("alice")).unwrap();

        let first = commit_with_file(&mut store, b"v1", None);
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            first,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        let second = commit_with_file(&mut store, b"v2", Some(first));
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            second,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        assert!(verify(&store, "refs/heads/main").unwrap().is_verified());
    }

    #[test]
    fn global_threshold_rule_over_a_path_pattern_is_enforced_on_changed_paths() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let mut store = MemoryStore::new();
        let alice = TestPrincipal::generate("alice");
        let bob = TestPrincipal::generate("bob");

        let mut root = Root::new(1, None);
        root.principals.push(Principal::Key(KeyPrincipal { id: "alice".to_string(), key: alice.public_key() }));
        root.principals.push(Principal::Key(KeyPrincipal { id: "bob".to_string(), key: bob.public_key() }));
        root.set_role("root", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.set_role("targets", RoleBinding { principal_ids: vec!["alice".to_string()], threshold: 1 }).unwrap();
        root.add_global_rule(GlobalRule::Threshold { pattern: "file.txt".to_string(), threshold: 2 }).unwrap();

        let targets = RuleFile::new(1, None);
        let mut root_envelope = Envelope::new(&root, ROOT_SCHEMA_V1).unwrap();
        root_envelope.add_signature(&alice.signing_key).unwrap();
        let mut bundle = policy_store::MetadataBundle::new(root_envelope);
        bundle.rule_files.insert("targets".to_string(), Envelope::new(&targets, RULE_FILE_SCHEMA_V1).unwrap());
        policy_store::stage(&mut store, &bundle, sig("alice"), sig("alice"), "stage root", None).unwrap();
        policy_store::promote_if_authorized(&mut store, &root, sig("alice"), sig("alice")).unwrap();

        let target = commit_with_file(&mut store, b"v1", None);
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            target,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        // No namespace rule covers "file.txt" beyond the mandatory catch-all, but the global
        // threshold rule over that path requires 2 signers and only alice signed.
        let outcome = verify(&store, "refs/heads/main").unwrap();
        match outcome {
            VerificationOutcome::Rejected(r) => {
                assert_eq!(r.constraint, FailingConstraint::GlobalThreshold { pattern: "file.txt".to_string() });
            }
            _ => panic!("expected global threshold rejection over the changed path"),
        }
    }

    #[test]
    fn verify_to_target_stops_at_first_entry_recording_it() {
        let (mut store, alice, _bob) = repo_with_main_rule(1);
        let first = commit_with_file(&mut store, b"v1", None);
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            first,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();
        let second = commit_with_file(&mut store, b"v2", Some(first));
        rsl_log::append_reference_entry(
            &mut store,
            "refs/heads/main",
            second,
            None,
            false,
            sig("alice"),
            sig("alice"),
            Some(&alice.signing_key as &dyn Signer),
        )
        .unwrap();

        let outcome = verify_to_target(&store, "refs/heads/main", first).unwrap();
        assert!(outcome.is_verified());
        match outcome {
            VerificationOutcome::Verified { entries_consumed } => assert_eq!(entries_consumed.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn verify_to_target_fails_when_target_never_logged() {
        let (store, _alice, _bob) = repo_with_main_rule(1);
        let never_logged = ObjectHash::new(b"never logged");

        let err = verify_to_target(&store, "refs/heads/main", never_logged).unwrap_err();
        assert!(matches!(err, CoreError::TargetNotInLog { .. }));
    }
}
