//! Operations over the Reference State Log (§4.3): append entries and answer the queries the
//! verification engine and callers need, all on the dedicated `refs/gittuf/reference-state-log`
//! reference.

use crate::errors::CoreError;
use crate::hash::ObjectHash;
use crate::internal::object::signature::Signature;
use crate::rsl::entry::{AnnotationEntry, ReferenceEntry, RslEntry};
use crate::signing::Signer;
use crate::store::ObjectStore;

pub const RSL_REF: &str = "refs/gittuf/reference-state-log";

fn empty_tree(store: &mut dyn ObjectStore) -> Result<ObjectHash, CoreError> {
    store.build_tree(Vec::new())
}

fn decode_tip(store: &dyn ObjectStore, hash: &ObjectHash) -> Result<RslEntry, CoreError> {
    let commit = store.read_commit(hash)?;
    RslEntry::decode(&commit.message)
}

/// Walks the chain backward from the current tip to the first entry, returning `(hash, entry)`
/// pairs oldest-first.
fn walk_all(store: &dyn ObjectStore) -> Result<Vec<(ObjectHash, RslEntry)>, CoreError> {
    let mut out = Vec::new();
    let mut cursor = store.get_reference(RSL_REF)?;
    while let Some(hash) = cursor {
        let commit = store.read_commit(&hash)?;
        let entry = RslEntry::decode(&commit.message)?;
        cursor = commit.parent_commit_ids.first().copied();
        out.push((hash, entry));
    }
    out.reverse();
    Ok(out)
}

/// Appends a reference entry recording that `reference` is intended to point at `target`.
/// When `suppress_duplicate` is set and the latest unskipped entry for `reference` already
/// records the same target, nothing is appended and `Err(CoreError::DuplicateEntry)` is
/// returned instead — a soft error callers may choose to ignore, not a hard failure.
#[allow(clippy::too_many_arguments)]
pub fn append_reference_entry(
    store: &mut dyn ObjectStore,
    reference: &str,
    target: ObjectHash,
    override_ref: Option<String>,
    suppress_duplicate: bool,
    author: Signature,
    committer: Signature,
    signer: Option<&dyn Signer>,
) -> Result<Option<ObjectHash>, CoreError> {
    let span = tracing::info_span!("append_reference_entry", reference, target = %target);
    let _enter = span.enter();

    if suppress_duplicate {
        if let Some((_, latest)) = latest_unskipped_for_ref(store, reference)? {
            if latest.target == target {
                tracing::debug!("suppressed duplicate entry, target unchanged");
                return Err(CoreError::DuplicateEntry {
                    reference: reference.to_string(),
                    target: target.to_string(),
                });
            }
        }
    }

    let tip = store.get_reference(RSL_REF)?;
    let number = match tip {
        Some(hash) => decode_tip(store, &hash)?.number() + 1,
        None => 0,
    };

    let entry = RslEntry::Reference(ReferenceEntry {
        reference: reference.to_string(),
        target,
        number,
        override_ref,
        extra: Vec::new(),
    });

    let tree = empty_tree(store)?;
    let parents = tip.into_iter().collect();
    let commit = store.commit(tree, parents, author, committer, &entry.encode(), signer)?;
    store.compare_and_set_reference(RSL_REF, tip, commit)?;
    tracing::info!(number, commit = %commit, "appended reference entry");
    Ok(Some(commit))
}

/// Appends an annotation over `annotated_entries`, which must all already exist as reference
/// entries in the log.
pub fn append_annotation(
    store: &mut dyn ObjectStore,
    annotated_entries: Vec<ObjectHash>,
    skip: bool,
    message: Vec<u8>,
    author: Signature,
    committer: Signature,
    signer: Option<&dyn Signer>,
) -> Result<ObjectHash, CoreError> {
    let span = tracing::info_span!("append_annotation", skip, entries = annotated_entries.len());
    let _enter = span.enter();

    for id in &annotated_entries {
        let decoded = decode_tip(store, id)?;
        if decoded.as_reference().is_none() {
            return Err(CoreError::InvalidArgument(format!("{id} is not a reference entry")));
        }
    }

    let tip = store.get_reference(RSL_REF)?;
    let number = match tip {
        Some(hash) => decode_tip(store, &hash)?.number() + 1,
        None => 0,
    };

    let entry = RslEntry::Annotation(AnnotationEntry { annotated_entries, skip, number, message, extra: Vec::new() });

    let tree = empty_tree(store)?;
    let parents = tip.into_iter().collect();
    let commit = store.commit(tree, parents, author, committer, &entry.encode(), signer)?;
    store.compare_and_set_reference(RSL_REF, tip, commit)?;
    if skip {
        tracing::warn!(number, commit = %commit, "appended skip annotation, invalidating prior entries");
    } else {
        tracing::info!(number, commit = %commit, "appended annotation");
    }
    Ok(commit)
}

/// Walks backward from the tip, skipping any reference entry for `reference` that a later
/// annotation marks skipped, returning the first (i.e. most recent) surviving entry.
pub fn latest_unskipped_for_ref(
    store: &dyn ObjectStore,
    reference: &str,
) -> Result<Option<(ObjectHash, ReferenceEntry)>, CoreError> {
    let all = walk_all(store)?;
    let mut skipped = std::collections::HashSet::new();
    for (_, entry) in &all {
        if let RslEntry::Annotation(a) = entry {
            if a.skip {
                skipped.extend(a.annotated_entries.iter().copied());
            }
        }
    }

    for (hash, entry) in all.into_iter().rev() {
        if let RslEntry::Reference(reference_entry) = entry {
            if reference_entry.reference == reference && !skipped.contains(&hash) {
                return Ok(Some((hash, reference_entry)));
            }
        }
    }
    Ok(None)
}

/// A reference entry together with the annotations (in log order) that name it.
#[derive(Debug, Clone)]
pub struct LoggedEntry {
    pub hash: ObjectHash,
    pub entry: ReferenceEntry,
    pub annotations: Vec<AnnotationEntry>,
}

/// Reference entries strictly after `from` (or from the start of the log if `None`) up to and
/// including `to`, each paired with the annotations that apply to it.
pub fn entries_in_range(
    store: &dyn ObjectStore,
    from: Option<ObjectHash>,
    to: ObjectHash,
) -> Result<Vec<LoggedEntry>, CoreError> {
    let all = walk_all(store)?;

    let mut annotations_by_target: std::collections::HashMap<ObjectHash, Vec<AnnotationEntry>> =
        std::collections::HashMap::new();
    for (_, entry) in &all {
        if let RslEntry::Annotation(a) = entry {
            for target in &a.annotated_entries {
                annotations_by_target.entry(*target).or_default().push(a.clone());
            }
        }
    }

    let mut out = Vec::new();
    let mut in_range = from.is_none();
    for (hash, entry) in all {
        if !in_range {
            if Some(hash) == from {
                in_range = true;
            }
            continue;
        }
        if let RslEntry::Reference(reference_entry) = entry {
            out.push(LoggedEntry {
                annotations: annotations_by_target.get(&hash).cloned().unwrap_or_default(),
                hash,
                entry: reference_entry,
            });
        }
        if hash == to {
            break;
        }
    }
    Ok(out)
}

/// The most recent unskipped reference entry for `reference` whose counter is `<= max_number`
/// (§4.4 step 3a: "the most recent reference entry on the metadata reference whose counter ≤
/// counter(E_curr)", used to reconstruct the policy state in force at a given point in the log).
pub fn latest_unskipped_at_or_before(
    store: &dyn ObjectStore,
    reference: &str,
    max_number: u64,
) -> Result<Option<(ObjectHash, ReferenceEntry)>, CoreError> {
    let all = walk_all(store)?;
    let mut skipped = std::collections::HashSet::new();
    for (_, entry) in &all {
        if let RslEntry::Annotation(a) = entry {
            if a.skip {
                skipped.extend(a.annotated_entries.iter().copied());
            }
        }
    }

    for (hash, entry) in all.into_iter().rev() {
        if let RslEntry::Reference(reference_entry) = entry {
            if reference_entry.reference == reference
                && reference_entry.number <= max_number
                && !skipped.contains(&hash)
            {
                return Ok(Some((hash, reference_entry)));
            }
        }
    }
    Ok(None)
}

/// The earliest unskipped reference entry for `reference` recording `target`, at or after
/// `from` if given (§4.4 step 2: "the first reference entry for R whose target equals T").
pub fn earliest_unskipped_for_target(
    store: &dyn ObjectStore,
    reference: &str,
    target: ObjectHash,
    from: Option<ObjectHash>,
) -> Result<Option<ObjectHash>, CoreError> {
    let all = walk_all(store)?;
    let mut skipped = std::collections::HashSet::new();
    for (_, entry) in &all {
        if let RslEntry::Annotation(a) = entry {
            if a.skip {
                skipped.extend(a.annotated_entries.iter().copied());
            }
        }
    }

    let mut in_range = from.is_none();
    for (hash, entry) in all {
        if !in_range {
            if Some(hash) == from {
                in_range = true;
            }
            continue;
        }
        if let RslEntry::Reference(reference_entry) = entry {
            if reference_entry.reference == reference
                && reference_entry.target == target
                && !skipped.contains(&hash)
            {
                return Ok(Some(hash));
            }
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    UpToDate,
    LocalAhead,
    RemoteAhead,
    Diverged,
}

/// Compares the local and remote RSL tips by reachability in the commit DAG.
pub fn check_remote_state(
    store: &dyn ObjectStore,
    remote_tip: ObjectHash,
    local_tip: ObjectHash,
) -> Result<RemoteState, CoreError> {
    if remote_tip == local_tip {
        return Ok(RemoteState::UpToDate);
    }
    let local_knows_remote = store.knows(&local_tip, &remote_tip)?;
    let remote_knows_local = store.knows(&remote_tip, &local_tip)?;
    Ok(match (local_knows_remote, remote_knows_local) {
        (true, false) => RemoteState::LocalAhead,
        (false, true) => RemoteState::RemoteAhead,
        _ => RemoteState::Diverged,
    })
}
