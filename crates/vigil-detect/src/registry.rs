//! Backend registry and selection policy.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{BackendClass, BackendDescriptor, Capabilities};
use crate::detector::Detector;
use crate::error::{DetectError, DetectResult};
use crate::platform::PlatformTag;

/// Factory producing a fresh backend instance.
pub type BackendFactory = Arc<dyn Fn() -> DetectResult<Box<dyn Detector>> + Send + Sync>;

/// Registry of known backends, keyed by backend name.
///
/// The registry holds only the `Detector` capability and a factory; new
/// backends are added by registering a factory under a new name.
#[derive(Default)]
pub struct BackendRegistry {
    entries: Vec<(BackendDescriptor, BackendFactory)>,
    by_name: HashMap<String, usize>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in backends.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::backends::register_builtins(&mut registry);
        registry
    }

    /// Register a backend; a factory under an existing name replaces it.
    pub fn register(&mut self, descriptor: BackendDescriptor, factory: BackendFactory) {
        let name = descriptor.name.clone();
        if let Some(&idx) = self.by_name.get(&name) {
            debug!(backend = %name, "replacing registered backend");
            self.entries[idx] = (descriptor, factory);
            return;
        }
        self.by_name.insert(name, self.entries.len());
        self.entries.push((descriptor, factory));
    }

    /// Backends runnable on `platform`.
    pub fn available_backends(&self, platform: PlatformTag) -> Vec<&BackendDescriptor> {
        self.entries
            .iter()
            .map(|(d, _)| d)
            .filter(|d| d.supports_platform(platform))
            .collect()
    }

    /// Ordered preference chain for a request: capability supersets
    /// first (by latency class, then fixed class priority), then the
    /// generic CPU fallback if it was not already included.
    pub fn selection_chain(
        &self,
        platform: PlatformTag,
        required: &Capabilities,
    ) -> Vec<&BackendDescriptor> {
        let mut matches: Vec<&BackendDescriptor> = self
            .entries
            .iter()
            .map(|(d, _)| d)
            .filter(|d| d.supports_platform(platform))
            .filter(|d| d.capabilities.is_superset_of(required))
            .collect();
        matches.sort_by_key(|d| (d.latency, d.class.rank(), d.name.clone()));

        if !matches.iter().any(|d| d.class == BackendClass::GenericCpu) {
            if let Some(generic) = self
                .entries
                .iter()
                .map(|(d, _)| d)
                .find(|d| d.class == BackendClass::GenericCpu && d.supports_platform(platform))
            {
                matches.push(generic);
            }
        }
        matches
    }

    /// Instantiate the best backend for the request.
    pub fn select(
        &self,
        platform: PlatformTag,
        required: &Capabilities,
    ) -> DetectResult<Box<dyn Detector>> {
        let chain = self.selection_chain(platform, required);
        let best = chain.first().ok_or(DetectError::NoBackend)?;
        info!(backend = %best.name, platform = platform.as_str(), "selected backend");
        self.instantiate(&best.name)
    }

    /// Instantiate a backend by name.
    pub fn instantiate(&self, name: &str) -> DetectResult<Box<dyn Detector>> {
        let &idx = self.by_name.get(name).ok_or(DetectError::NoBackend)?;
        (self.entries[idx].1)()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, LatencyClass};
    use crate::backends::scripted::ScriptedBackend;
    use crate::detector::RawCoords;

    fn descriptor(name: &str, class: BackendClass, latency: LatencyClass) -> BackendDescriptor {
        BackendDescriptor {
            name: name.to_string(),
            class,
            capabilities: Capabilities {
                pose: true,
                face: true,
                hand: false,
                fp16: class != BackendClass::GenericCpu,
                int8: false,
            },
            latency,
            platforms: Vec::new(),
        }
    }

    fn factory() -> BackendFactory {
        Arc::new(|| {
            Ok(Box::new(ScriptedBackend::single_pose_subject(
                RawCoords::Normalized,
                0.5,
                0.5,
            )) as Box<dyn Detector>)
        })
    }

    fn registry_with(classes: &[(&str, BackendClass, LatencyClass)]) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        for (name, class, latency) in classes {
            registry.register(descriptor(name, *class, *latency), factory());
        }
        registry
    }

    #[test]
    fn test_priority_order() {
        let registry = registry_with(&[
            ("cpu", BackendClass::GenericCpu, LatencyClass::Realtime),
            ("npu", BackendClass::NativeNpu, LatencyClass::Realtime),
            ("gpu", BackendClass::Gpu, LatencyClass::Realtime),
        ]);
        let chain = registry.selection_chain(PlatformTag::GenericCpu, &Capabilities::pose_only());
        let names: Vec<_> = chain.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["npu", "gpu", "cpu"]);
    }

    #[test]
    fn test_latency_beats_class() {
        let registry = registry_with(&[
            ("npu-batch", BackendClass::NativeNpu, LatencyClass::Batch),
            ("cpu-rt", BackendClass::OptimizedCpu, LatencyClass::Realtime),
        ]);
        let chain = registry.selection_chain(PlatformTag::GenericCpu, &Capabilities::pose_only());
        assert_eq!(chain[0].name, "cpu-rt");
    }

    #[test]
    fn test_generic_fallback_appended() {
        let mut registry = registry_with(&[("cpu", BackendClass::GenericCpu, LatencyClass::Realtime)]);
        // Request hand support, which "cpu" lacks: chain still offers cpu.
        let required = Capabilities {
            hand: true,
            ..Default::default()
        };
        let chain = registry.selection_chain(PlatformTag::GenericCpu, &required);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "cpu");

        // With nothing registered at all, selection fails.
        registry = BackendRegistry::new();
        assert!(matches!(
            registry.select(PlatformTag::GenericCpu, &required),
            Err(DetectError::NoBackend)
        ));
    }

    #[test]
    fn test_replace_by_name() {
        let mut registry = registry_with(&[("cpu", BackendClass::GenericCpu, LatencyClass::Batch)]);
        registry.register(
            descriptor("cpu", BackendClass::GenericCpu, LatencyClass::Realtime),
            factory(),
        );
        assert_eq!(registry.len(), 1);
        let chain = registry.selection_chain(PlatformTag::GenericCpu, &Capabilities::pose_only());
        assert_eq!(chain[0].latency, LatencyClass::Realtime);
    }
}
