//! RSL entry payloads (§4.3, §6): small, line-oriented key/value text embedded in an RSL
//! commit's message. Three variants exist — reference, annotation, propagation — each
//! identified by its header line. Unknown keys are preserved verbatim on round-trip so a
//! newer writer's extensions survive being read back by this implementation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::errors::CoreError;
use crate::hash::ObjectHash;

const REFERENCE_HEADER: &str = "RSL Reference Entry";
const ANNOTATION_HEADER: &str = "RSL Annotation Entry";
const PROPAGATION_HEADER: &str = "RSL Propagation Entry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub reference: String,
    pub target: ObjectHash,
    pub number: u64,
    pub override_ref: Option<String>,
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub annotated_entries: Vec<ObjectHash>,
    pub skip: bool,
    pub number: u64,
    pub message: Vec<u8>,
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationEntry {
    pub upstream_repository: String,
    pub upstream_ref: String,
    pub upstream_target: ObjectHash,
    pub local_ref: String,
    pub local_subtree: String,
    pub number: u64,
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RslEntry {
    Reference(ReferenceEntry),
    Annotation(AnnotationEntry),
    Propagation(PropagationEntry),
}

impl RslEntry {
    pub fn number(&self) -> u64 {
        match self {
            RslEntry::Reference(e) => e.number,
            RslEntry::Annotation(e) => e.number,
            RslEntry::Propagation(e) => e.number,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceEntry> {
        match self {
            RslEntry::Reference(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&AnnotationEntry> {
        match self {
            RslEntry::Annotation(e) => Some(e),
            _ => None,
        }
    }

    /// Serializes this entry into the exact commit-message text format §6 specifies.
    pub fn encode(&self) -> String {
        match self {
            RslEntry::Reference(e) => {
                let mut out = format!("{REFERENCE_HEADER}\n\nRef: {}\nTarget-ID: {}\n", e.reference, e.target);
                if let Some(override_ref) = &e.override_ref {
                    out.push_str(&format!("OverrideRef: {override_ref}\n"));
                }
                out.push_str(&format!("Number: {}\n", e.number));
                append_extra(&mut out, &e.extra);
                out
            }
            RslEntry::Annotation(e) => {
                let mut out = format!("{ANNOTATION_HEADER}\n\n");
                for id in &e.annotated_entries {
                    out.push_str(&format!("RSL-Entry: {id}\n"));
                }
                out.push_str(&format!("Skip: {}\n", e.skip));
                out.push_str(&format!("Number: {}\n", e.number));
                out.push_str(&format!("Message: {}\n", BASE64.encode(&e.message)));
                append_extra(&mut out, &e.extra);
                out
            }
            RslEntry::Propagation(e) => {
                let mut out = format!(
                    "{PROPAGATION_HEADER}\n\nUpstreamRepository: {}\nUpstreamRef: {}\nUpstreamTarget: {}\nLocalRef: {}\nLocalSubtree: {}\nNumber: {}\n",
                    e.upstream_repository, e.upstream_ref, e.upstream_target, e.local_ref, e.local_subtree, e.number
                );
                append_extra(&mut out, &e.extra);
                out
            }
        }
    }

    /// Parses a commit message as an RSL entry payload. Fails with `UnknownEntryType` if the
    /// header line is not one this implementation recognizes.
    pub fn decode(message: &str) -> Result<RslEntry, CoreError> {
        let mut lines = message.lines();
        let header = lines.next().unwrap_or("").trim();
        let rest: Vec<&str> = lines.collect();
        // Skip the blank separator line, if present.
        let body = if rest.first().map(|l| l.trim().is_empty()).unwrap_or(false) { &rest[1..] } else { &rest[..] };
        let kvs = parse_kv_lines(body);

        match header {
            REFERENCE_HEADER => decode_reference(kvs),
            ANNOTATION_HEADER => decode_annotation(kvs),
            PROPAGATION_HEADER => decode_propagation(kvs),
            other => Err(CoreError::UnknownEntryType(other.to_string())),
        }
    }
}

fn append_extra(out: &mut String, extra: &[(String, String)]) {
    for (key, value) in extra {
        out.push_str(&format!("{key}: {value}\n"));
    }
}

fn parse_kv_lines(lines: &[&str]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(": ")?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn take_first<'a>(kvs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    kvs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn remaining(kvs: Vec<(String, String)>, consumed: &[&str]) -> Vec<(String, String)> {
    kvs.into_iter().filter(|(k, _)| !consumed.contains(&k.as_str())).collect()
}

fn decode_reference(kvs: Vec<(String, String)>) -> Result<RslEntry, CoreError> {
    let reference = take_first(&kvs, "Ref")
        .ok_or_else(|| CoreError::CorruptObject("rsl-entry".to_string(), "missing Ref".to_string()))?
        .to_string();
    let target = take_first(&kvs, "Target-ID")
        .ok_or_else(|| CoreError::CorruptObject("rsl-entry".to_string(), "missing Target-ID".to_string()))?
        .parse::<ObjectHash>()
        .map_err(|e| CoreError::CorruptObject("rsl-entry".to_string(), e))?;
    let number = take_first(&kvs, "Number")
        .ok_or_else(|| CoreError::CorruptObject("rsl-entry".to_string(), "missing Number".to_string()))?
        .parse::<u64>()
        .map_err(|e| CoreError::CorruptObject("rsl-entry".to_string(), e.to_string()))?;
    let override_ref = take_first(&kvs, "OverrideRef").map(str::to_string);

    let extra = remaining(kvs, &["Ref", "Target-ID", "Number", "OverrideRef"]);
    Ok(RslEntry::Reference(ReferenceEntry { reference, target, number, override_ref, extra }))
}

fn decode_annotation(kvs: Vec<(String, String)>) -> Result<RslEntry, CoreError> {
    let annotated_entries: Vec<ObjectHash> = kvs
        .iter()
        .filter(|(k, _)| k == "RSL-Entry")
        .map(|(_, v)| {
            v.parse::<ObjectHash>()
                .map_err(|e| CoreError::CorruptObject("rsl-annotation".to_string(), e))
        })
        .collect::<Result<_, _>>()?;
    if annotated_entries.is_empty() {
        return Err(CoreError::CorruptObject("rsl-annotation".to_string(), "missing RSL-Entry".to_string()));
    }
    let skip = take_first(&kvs, "Skip")
        .ok_or_else(|| CoreError::CorruptObject("rsl-annotation".to_string(), "missing Skip".to_string()))?
        .parse::<bool>()
        .map_err(|e| CoreError::CorruptObject("rsl-annotation".to_string(), e.to_string()))?;
    let number = take_first(&kvs, "Number")
        .ok_or_else(|| CoreError::CorruptObject("rsl-annotation".to_string(), "missing Number".to_string()))?
        .parse::<u64>()
        .map_err(|e| CoreError::CorruptObject("rsl-annotation".to_string(), e.to_string()))?;
    let message = BASE64
        .decode(take_first(&kvs, "Message").unwrap_or(""))
        .map_err(|e| CoreError::CorruptObject("rsl-annotation".to_string(), e.to_string()))?;

    let extra: Vec<(String, String)> = kvs
        .into_iter()
        .filter(|(k, _)| !["RSL-Entry", "Skip", "Number", "Message"].contains(&k.as_str()))
        .collect();
    Ok(RslEntry::Annotation(AnnotationEntry { annotated_entries, skip, number, message, extra }))
}

fn decode_propagation(kvs: Vec<(String, String)>) -> Result<RslEntry, CoreError> {
    let get = |key: &str| -> Result<String, CoreError> {
        take_first(&kvs, key)
            .map(str::to_string)
            .ok_or_else(|| CoreError::CorruptObject("rsl-propagation".to_string(), format!("missing {key}")))
    };
    let upstream_repository = get("UpstreamRepository")?;
    let upstream_ref = get("UpstreamRef")?;
    let upstream_target = get("UpstreamTarget")?
        .parse::<ObjectHash>()
        .map_err(|e| CoreError::CorruptObject("rsl-propagation".to_string(), e))?;
    let local_ref = get("LocalRef")?;
    let local_subtree = get("LocalSubtree")?;
    let number = get("Number")?
        .parse::<u64>()
        .map_err(|e| CoreError::CorruptObject("rsl-propagation".to_string(), e.to_string()))?;

    let extra = remaining(
        kvs,
        &["UpstreamRepository", "UpstreamRef", "UpstreamTarget", "LocalRef", "LocalSubtree", "Number"],
    );
    Ok(RslEntry::Propagation(PropagationEntry {
        upstream_repository,
        upstream_ref,
        upstream_target,
        local_ref,
        local_subtree,
        number,
        extra,
    }))
}
