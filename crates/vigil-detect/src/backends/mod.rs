//! Built-in detector backends.
//!
//! Accelerator backends (NPU/GPU engines) are host-specific and register
//! their factories from the embedding application; the crate itself ships
//! the always-available generic CPU heuristic plus the scripted backend
//! used by tests and replay tooling.

pub mod heuristic;
pub mod scripted;

use std::sync::Arc;

use crate::backend::{BackendClass, BackendDescriptor, Capabilities, LatencyClass};
use crate::detector::Detector;
use crate::registry::BackendRegistry;

/// Register the backends every platform has.
pub fn register_builtins(registry: &mut BackendRegistry) {
    registry.register(
        BackendDescriptor {
            name: heuristic::BACKEND_NAME.to_string(),
            class: BackendClass::GenericCpu,
            capabilities: Capabilities {
                pose: true,
                face: false,
                hand: false,
                fp16: false,
                int8: false,
            },
            latency: LatencyClass::Realtime,
            platforms: Vec::new(),
        },
        Arc::new(|| Ok(Box::new(heuristic::HeuristicPoseBackend::new()) as Box<dyn Detector>)),
    );
}
