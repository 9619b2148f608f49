//! The delegation-tree walk (§4.4.1): given a namespace (a reference name or a file path) and
//! the current metadata bundle, find every rule across every delegated rule file that protects
//! it, breadth-first, starting from the primary rule file.

use std::collections::{HashSet, VecDeque};

use crate::errors::CoreError;
use crate::policy::rule::{Rule, RuleFile};
use crate::policy::store::MetadataBundle;

/// Key under which the primary (root-delegated) rule file is stored in
/// [`MetadataBundle::rule_files`] — the root's `targets` role binds the principals who may sign
/// it, so it shares that name by convention.
pub const PRIMARY_RULE_FILE: &str = "targets";

/// One rule that matched a namespace, together with the name of the rule file it came from
/// (principals referenced by `rule.authorized_principal_ids` live in that same file).
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub rule_file: String,
    pub rule: Rule,
}

/// Decodes the named rule file out of `bundle`, if present.
pub fn decode_rule_file(bundle: &MetadataBundle, name: &str) -> Result<Option<RuleFile>, CoreError> {
    match bundle.rule_files.get(name) {
        Some(envelope) => Ok(Some(envelope.decode()?)),
        None => Ok(None),
    }
}

/// Walks the delegation tree for `namespace`, breadth-first from [`PRIMARY_RULE_FILE`].
///
/// Every matching rule in every reachable file is returned — terminating rules stop the scan
/// within their own file but do not prevent already-queued delegated files from being visited
/// (§4.4.1). A rule file already on the BFS path is not revisited, breaking delegation cycles
/// without failing the walk: a later metadata update may heal the cycle (§9 design note), so
/// this is silent rather than a hard `cyclic-delegation` error.
pub fn resolve_namespace(bundle: &MetadataBundle, namespace: &str) -> Result<Vec<ResolvedRule>, CoreError> {
    let span = tracing::debug_span!("policy_walk", namespace);
    let _enter = span.enter();

    let mut results = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(PRIMARY_RULE_FILE.to_string());

    while let Some(file_name) = queue.pop_front() {
        if !visited.insert(file_name.clone()) {
            tracing::debug!(file = file_name, "delegation cycle, skipping revisit");
            continue;
        }
        let Some(rule_file) = decode_rule_file(bundle, &file_name)? else { continue };
        for rule in rule_file.matching_rules(namespace) {
            if let Some(delegate) = &rule.delegate {
                queue.push_back(delegate.clone());
            }
            results.push(ResolvedRule { rule_file: file_name.clone(), rule: rule.clone() });
        }
    }
    Ok(results)
}
