//! Locale-tolerant resolution of counter category and counter names.

use std::sync::Arc;

use super::CounterBackend;
use crate::error::{Result, TelemetryError};

/// English name of the GPU engine category; also the emergency fallback.
pub const GPU_ENGINE_CATEGORY: &str = "GPU Engine";

/// Localized aliases that trigger the GPU engine emergency fallback.
const GPU_ENGINE_ALIASES: [&str; 2] = [GPU_ENGINE_CATEGORY, "Motor de GPU"];

/// Maps logical metric names onto whatever names the running OS exposes.
///
/// Matching is two-pass and strictly ordered by candidate: every candidate is
/// first tried for an exact case-insensitive match, then every candidate is
/// tried again as a case-insensitive substring.
#[derive(Clone)]
pub struct CounterResolver {
    backend: Arc<dyn CounterBackend>,
}

impl CounterResolver {
    pub fn new(backend: Arc<dyn CounterBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CounterBackend> {
        &self.backend
    }

    /// Resolve the first category matching `candidates`.
    ///
    /// Returns [`TelemetryError::CategoryUnresolvable`] when nothing matches;
    /// callers treat that as "feature unavailable".
    pub fn resolve_category(&self, candidates: &[&str]) -> Result<String> {
        let categories = match self.backend.list_categories() {
            Ok(categories) => categories,
            Err(e) => {
                log::debug!("Counter categories could not be enumerated: {}", e);
                return match candidates.first() {
                    Some(first) if self.backend.category_exists(first) => Ok(first.to_string()),
                    _ => Err(TelemetryError::counter(format!(
                        "cannot enumerate counter categories: {}",
                        e
                    ))),
                };
            }
        };

        if let Some(found) = match_candidates(&categories, candidates) {
            return Ok(found);
        }

        if candidates
            .iter()
            .any(|c| GPU_ENGINE_ALIASES.iter().any(|alias| alias == c))
        {
            return Ok(GPU_ENGINE_CATEGORY.to_string());
        }

        Err(TelemetryError::CategoryUnresolvable(
            candidates.iter().map(|c| c.to_string()).collect(),
        ))
    }

    /// Like [`resolve_category`](Self::resolve_category) but never fails:
    /// on error every candidate is probed directly, and `None` means the
    /// feature is unavailable.
    pub fn try_resolve_category(&self, candidates: &[&str]) -> Option<String> {
        match self.resolve_category(candidates) {
            Ok(name) => Some(name),
            Err(e) => {
                log::debug!("Category resolution failed: {}", e);
                candidates
                    .iter()
                    .find(|c| self.backend.category_exists(c))
                    .map(|c| c.to_string())
            }
        }
    }

    /// Resolve a counter name inside `category`.
    ///
    /// Inspection uses the first instance of the category. When inspection
    /// fails or nothing matches, the first candidate is returned verbatim.
    pub fn resolve_counter(&self, category: &str, candidates: &[&str]) -> String {
        let fallback = candidates.first().map(|c| c.to_string()).unwrap_or_default();

        let instance = match self.backend.instance_names(category) {
            Ok(instances) => instances.into_iter().next(),
            Err(e) => {
                log::debug!("Instances of '{}' unavailable: {}", category, e);
                return fallback;
            }
        };

        match self.backend.counter_names(category, instance.as_deref()) {
            Ok(counters) => match_candidates(&counters, candidates).unwrap_or(fallback),
            Err(e) => {
                log::debug!("Counters of '{}' unavailable: {}", category, e);
                fallback
            }
        }
    }
}

/// Exact (case-insensitive) pass over all candidates, then a containment pass.
fn match_candidates(available: &[String], candidates: &[&str]) -> Option<String> {
    let lowered: Vec<String> = available.iter().map(|a| a.to_lowercase()).collect();

    for candidate in candidates {
        let wanted = candidate.to_lowercase();
        if let Some(idx) = lowered.iter().position(|a| *a == wanted) {
            return Some(available[idx].clone());
        }
    }

    for candidate in candidates {
        let wanted = candidate.to_lowercase();
        if wanted.is_empty() {
            continue;
        }
        if let Some(idx) = lowered.iter().position(|a| a.contains(&wanted)) {
            return Some(available[idx].clone());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::counters::{CounterPath, RawCounterId};

    struct StaticCounters {
        categories: Option<Vec<String>>,
        existing: Vec<String>,
        counters: Vec<String>,
    }

    impl CounterBackend for StaticCounters {
        fn list_categories(&self) -> Result<Vec<String>> {
            self.categories
                .clone()
                .ok_or_else(|| TelemetryError::counter("access denied"))
        }

        fn category_exists(&self, category: &str) -> bool {
            self.existing.iter().any(|c| c == category)
        }

        fn instance_names(&self, _category: &str) -> Result<Vec<String>> {
            Ok(vec!["_Total".to_string()])
        }

        fn counter_names(&self, _category: &str, _instance: Option<&str>) -> Result<Vec<String>> {
            Ok(self.counters.clone())
        }

        fn open(&self, _path: &CounterPath) -> Result<RawCounterId> {
            Ok(1)
        }

        fn read(&self, _id: RawCounterId) -> Result<f64> {
            Ok(0.0)
        }

        fn close(&self, _id: RawCounterId) {}
    }

    fn resolver(categories: Option<Vec<&str>>, existing: Vec<&str>) -> CounterResolver {
        CounterResolver::new(Arc::new(StaticCounters {
            categories: categories.map(|c| c.into_iter().map(String::from).collect()),
            existing: existing.into_iter().map(String::from).collect(),
            counters: vec![
                "% de tiempo de procesador".to_string(),
                "% Processor Time Extended".to_string(),
            ],
        }))
    }

    #[test]
    fn test_exact_match_beats_earlier_substring() {
        let r = resolver(Some(vec!["Processor Information", "processor"]), vec![]);
        assert_eq!(r.resolve_category(&["Processor"]).unwrap(), "processor");
    }

    #[test]
    fn test_exact_pass_runs_over_all_candidates_first() {
        let r = resolver(Some(vec!["Memoria", "Memory Compression"]), vec![]);
        // "Memory" only matches by containment, "Memoria" matches exactly.
        assert_eq!(r.resolve_category(&["Memory", "Memoria"]).unwrap(), "Memoria");
    }

    #[test]
    fn test_substring_pass_in_candidate_order() {
        let r = resolver(Some(vec!["Disco físico (x)", "Physical Disk Stats"]), vec![]);
        assert_eq!(
            r.resolve_category(&["physical disk", "disco físico"]).unwrap(),
            "Physical Disk Stats"
        );
    }

    #[test]
    fn test_enumeration_failure_probes_first_candidate() {
        let r = resolver(None, vec!["GPU Engine"]);
        assert_eq!(r.resolve_category(&["GPU Engine", "Motor de GPU"]).unwrap(), "GPU Engine");

        let r = resolver(None, vec!["Motor de GPU"]);
        assert!(r.resolve_category(&["GPU Engine", "Motor de GPU"]).is_err());
        // The lenient variant probes every candidate.
        assert_eq!(
            r.try_resolve_category(&["GPU Engine", "Motor de GPU"]).as_deref(),
            Some("Motor de GPU")
        );
    }

    #[test]
    fn test_gpu_engine_emergency_fallback() {
        let r = resolver(Some(vec!["Processor"]), vec![]);
        assert_eq!(r.resolve_category(&["Motor de GPU"]).unwrap(), GPU_ENGINE_CATEGORY);
    }

    #[test]
    fn test_unresolvable_category() {
        let r = resolver(Some(vec!["Processor"]), vec![]);
        let err = r.resolve_category(&["Network Interface", "Interfaz de red"]).unwrap_err();
        assert!(matches!(err, TelemetryError::CategoryUnresolvable(ref c) if c.len() == 2));
        assert!(r.try_resolve_category(&["Network Interface"]).is_none());
    }

    #[test]
    fn test_counter_resolution_and_fallback() {
        let r = resolver(Some(vec!["Procesador"]), vec![]);
        assert_eq!(
            r.resolve_counter("Procesador", &["% Processor Time", "% de tiempo de procesador"]),
            "% de tiempo de procesador"
        );
        assert_eq!(r.resolve_counter("Procesador", &["Interrupts/sec"]), "Interrupts/sec");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let r = resolver(Some(vec!["GPU Engine", "GPU Adapter Memory"]), vec![]);
        let first = r.resolve_category(&["GPU Adapter", "GPU"]).unwrap();
        let second = r.resolve_category(&["GPU Adapter", "GPU"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "GPU Adapter Memory");
    }
}
