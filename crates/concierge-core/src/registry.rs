//! Model registry: one entry per domain, loaded once at startup and shared.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{parse_domain, Domain, ModelSpec, ModelStatus};
use crate::device::{ComputeTarget, DeviceProfile};
use crate::models::{LoadedModel, ModelSource};

struct Entry {
    spec: ModelSpec,
    model: Option<Arc<LoadedModel>>,
}

/// Outcome of one pass over the registry entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryReport {
    pub loaded: Vec<Domain>,
    pub failed: Vec<Domain>,
}

impl RegistryReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ModelRegistry {
    device: DeviceProfile,
    entries: Vec<Entry>,
}

impl ModelRegistry {
    /// Registry with every spec `Unloaded`, whatever status it arrived with.
    /// Later duplicates of a domain are ignored.
    pub fn new(device: DeviceProfile, specs: Vec<ModelSpec>) -> Self {
        let mut entries: Vec<Entry> = Vec::with_capacity(specs.len());
        for mut spec in specs {
            if entries.iter().any(|e| e.spec.domain == spec.domain) {
                warn!("Duplicate model spec for {}, keeping the first", spec.domain);
                continue;
            }
            spec.reset();
            entries.push(Entry { spec, model: None });
        }
        Self { device, entries }
    }

    /// Attempt every `Unloaded` entry in order. A failing or panicking
    /// loader marks only its own entry `Failed`.
    pub fn load_all(&mut self, source: &dyn ModelSource) -> RegistryReport {
        let device = &self.device;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.spec.status == ModelStatus::Unloaded)
        {
            info!(
                "Loading {} model from {}",
                entry.spec.domain, entry.spec.source
            );
            let started = std::time::Instant::now();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.load(&entry.spec, device)));
            match outcome {
                Ok(Ok(model)) => {
                    entry.spec.mark_loaded();
                    entry.model = Some(Arc::new(model));
                    info!(
                        "Loaded {} model in {:.1}s",
                        entry.spec.domain,
                        started.elapsed().as_secs_f32()
                    );
                }
                Ok(Err(e)) => {
                    warn!("Failed to load {} model: {}", entry.spec.domain, e);
                    entry.spec.mark_failed(e.to_string());
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!("Loader panicked for {} model: {}", entry.spec.domain, reason);
                    entry.spec.mark_failed(format!("loader panicked: {reason}"));
                }
            }
        }

        RegistryReport {
            loaded: self.loaded_domains(),
            failed: self.failed_domains(),
        }
    }

    /// Loaded model for a domain key; `None` for unknown or unavailable keys.
    pub fn get(&self, key: &str) -> Option<Arc<LoadedModel>> {
        let domain = parse_domain(key).ok()?;
        self.entries
            .iter()
            .find(|e| e.spec.domain == domain)
            .and_then(|e| e.model.clone())
    }

    pub fn specs(&self) -> impl Iterator<Item = &ModelSpec> {
        self.entries.iter().map(|e| &e.spec)
    }

    pub fn status(&self, domain: Domain) -> Option<ModelStatus> {
        self.entries
            .iter()
            .find(|e| e.spec.domain == domain)
            .map(|e| e.spec.status)
    }

    pub fn loaded_domains(&self) -> Vec<Domain> {
        self.domains_with(ModelStatus::Loaded)
    }

    pub fn failed_domains(&self) -> Vec<Domain> {
        self.domains_with(ModelStatus::Failed)
    }

    pub fn compute_target(&self) -> ComputeTarget {
        self.device.compute_target()
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    fn domains_with(&self, status: ModelStatus) -> Vec<Domain> {
        self.entries
            .iter()
            .filter(|e| e.spec.status == status)
            .map(|e| e.spec.domain)
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{default_specs, FakeBehavior, FakeSource};

    fn loaded_registry(source: &FakeSource) -> ModelRegistry {
        let mut registry = ModelRegistry::new(DeviceProfile::cpu(), default_specs());
        registry.load_all(source);
        registry
    }

    #[test]
    fn loads_every_domain() {
        let source = FakeSource::new();
        let mut registry = ModelRegistry::new(DeviceProfile::cpu(), default_specs());
        let report = registry.load_all(&source);

        assert!(report.all_loaded());
        assert_eq!(report.loaded, Domain::all().to_vec());
        for domain in Domain::all() {
            assert!(registry.get(domain.key()).is_some());
            assert_eq!(registry.status(*domain), Some(ModelStatus::Loaded));
        }
    }

    #[test]
    fn failed_domain_does_not_block_others() {
        let source = FakeSource::new().with(Domain::Medical, FakeBehavior::LoadError);
        let registry = loaded_registry(&source);

        assert!(registry.get("medical").is_none());
        assert!(registry.get("ecommerce").is_some());
        assert!(registry.get("restaurant").is_some());
        assert!(registry.get("classify").is_some());
        assert_eq!(registry.failed_domains(), vec![Domain::Medical]);

        let medical = registry
            .specs()
            .find(|s| s.domain == Domain::Medical)
            .unwrap();
        assert_eq!(medical.status, ModelStatus::Failed);
        assert!(medical
            .error_message
            .as_deref()
            .unwrap()
            .contains("not a seq2seq checkpoint"));
    }

    #[test]
    fn loader_panic_is_recorded_as_failure() {
        let source = FakeSource::new().with(Domain::Restaurant, FakeBehavior::LoadPanic);
        let registry = loaded_registry(&source);

        assert_eq!(registry.failed_domains(), vec![Domain::Restaurant]);
        assert_eq!(registry.loaded_domains().len(), 3);
        let reason = registry
            .specs()
            .find(|s| s.domain == Domain::Restaurant)
            .and_then(|s| s.error_message.clone())
            .unwrap();
        assert!(reason.contains("loader crashed"));
    }

    #[test]
    fn unknown_key_resolves_to_none() {
        let registry = loaded_registry(&FakeSource::new());
        assert!(registry.get("legal").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn second_load_pass_is_a_noop() {
        let source = FakeSource::new().with(Domain::Classify, FakeBehavior::LoadError);
        let mut registry = ModelRegistry::new(DeviceProfile::cpu(), default_specs());
        registry.load_all(&source);
        assert_eq!(source.attempts(), 4);

        let report = registry.load_all(&source);
        assert_eq!(source.attempts(), 4);
        assert_eq!(report.failed, vec![Domain::Classify]);
        assert_eq!(registry.status(Domain::Classify), Some(ModelStatus::Failed));
    }

    #[test]
    fn duplicate_specs_are_ignored() {
        let mut specs = default_specs();
        specs.push(ModelSpec::new(Domain::Medical, "other/medical"));
        let registry = ModelRegistry::new(DeviceProfile::cpu(), specs);
        assert_eq!(registry.specs().count(), 4);
    }

    #[test]
    fn incoming_status_is_discarded() {
        let mut specs = default_specs();
        specs[1].status = ModelStatus::Loaded;
        specs[2].status = ModelStatus::Failed;
        specs[2].error_message = Some("stale".to_string());

        let mut registry = ModelRegistry::new(DeviceProfile::cpu(), specs);
        assert!(registry.specs().all(|s| s.status == ModelStatus::Unloaded));
        assert!(registry.specs().all(|s| s.error_message.is_none()));

        let source = FakeSource::new().with(Domain::Medical, FakeBehavior::LoadError);
        let report = registry.load_all(&source);
        assert_eq!(source.attempts(), 4);
        assert_eq!(report.failed, vec![Domain::Medical]);
        assert!(registry.get("medical").is_none());
        assert_eq!(registry.status(Domain::Medical), Some(ModelStatus::Failed));
        assert!(registry.get("restaurant").is_some());
        for spec in registry.specs() {
            assert_eq!(
                spec.status == ModelStatus::Loaded,
                registry.get(spec.key()).is_some()
            );
        }
    }

    #[test]
    fn unloaded_registry_serves_nothing() {
        let registry = ModelRegistry::new(DeviceProfile::cpu(), default_specs());
        assert!(registry.get("ecommerce").is_none());
        assert_eq!(registry.compute_target(), ComputeTarget::Cpu);
    }
}
