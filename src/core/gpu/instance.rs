//! Decoding of GPU engine counter instance names.
//!
//! Instances look like
//! `pid_1234_luid_0x00000000_0x0000C7A1_phys_0_eng_3_engtype_VideoDecode`;
//! adapter-level instances omit the `pid_` prefix.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::EngineType;

static ADAPTER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"luid_(0x[0-9A-Fa-f]+_0x[0-9A-Fa-f]+)_phys_(\d+)").ok());

pub const DEFAULT_ADAPTER_KEY: &str = "adapter_default";
const ENGINE_TAG: &str = "engtype_";

/// Which instances the engine opens counters for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceScope {
    /// Adapter-level instances only.
    Aggregated,
    /// Every per-process engine instance.
    PerProcess,
}

/// Adapter identity encoded in an instance name: `<luid>_phys_<n>`, the raw
/// `_phys_` segment when the pattern does not match, or [`DEFAULT_ADAPTER_KEY`].
pub fn adapter_key(instance: &str) -> String {
    if let Some(captures) = ADAPTER_PATTERN.as_ref().and_then(|re| re.captures(instance)) {
        return format!("{}_phys_{}", &captures[1], &captures[2]);
    }

    let lower = instance.to_ascii_lowercase();
    if let Some(phys) = lower.find("_phys_") {
        return match lower.find("_eng_") {
            Some(eng) if eng > phys => instance[phys..eng].to_string(),
            _ => instance[phys..].to_string(),
        };
    }

    DEFAULT_ADAPTER_KEY.to_string()
}

/// Adapter LUID portion (`0x..._0x...`) of an adapter key, when present.
pub fn adapter_luid(key: &str) -> Option<&str> {
    let end = key.find("_phys_")?;
    let luid = &key[..end];
    luid.starts_with("0x").then_some(luid)
}

pub fn has_engine_tag(instance: &str) -> bool {
    instance.to_ascii_lowercase().contains(ENGINE_TAG)
}

/// Engine type named after the `engtype_` tag, or `None` for non-engine instances.
pub fn engine_type(instance: &str) -> Option<EngineType> {
    let lower = instance.to_ascii_lowercase();
    let start = lower.find(ENGINE_TAG)? + ENGINE_TAG.len();
    let tag = &lower[start..];

    let engine = if tag.starts_with("3d") {
        EngineType::ThreeD
    } else if tag.starts_with("compute") {
        EngineType::Compute
    } else if tag.starts_with("copy") {
        EngineType::Copy
    } else if tag.starts_with("videodecode") {
        EngineType::VideoDecode
    } else if tag.starts_with("videoencode") {
        EngineType::VideoEncode
    } else {
        EngineType::Other
    };
    Some(engine)
}

fn is_per_process(instance: &str) -> bool {
    instance.to_ascii_lowercase().starts_with("pid_")
}

/// Engine instances to open for `scope`, capped. Falls back to the
/// per-process set when no adapter-level instances exist; the returned
/// scope says which set was used.
pub fn select_instances(
    instances: &[String],
    scope: InstanceScope,
    max_aggregated: usize,
    max_per_process: usize,
) -> (Vec<String>, InstanceScope) {
    let engines = instances.iter().filter(|name| has_engine_tag(name));

    if scope == InstanceScope::Aggregated {
        let aggregated: Vec<String> = engines
            .clone()
            .filter(|name| !is_per_process(name))
            .take(max_aggregated)
            .cloned()
            .collect();
        if !aggregated.is_empty() {
            return (aggregated, InstanceScope::Aggregated);
        }
    }

    let all: Vec<String> = engines.take(max_per_process).cloned().collect();
    (all, InstanceScope::PerProcess)
}
