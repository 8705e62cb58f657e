//! Backend descriptors and capability declarations.

use serde::{Deserialize, Serialize};

use crate::platform::PlatformTag;

/// Declared capability flags for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Capabilities {
    pub pose: bool,
    pub face: bool,
    pub hand: bool,
    pub fp16: bool,
    pub int8: bool,
}

impl Capabilities {
    /// True when `self` provides everything `required` asks for.
    pub fn is_superset_of(&self, required: &Capabilities) -> bool {
        (!required.pose || self.pose)
            && (!required.face || self.face)
            && (!required.hand || self.hand)
            && (!required.fp16 || self.fp16)
            && (!required.int8 || self.int8)
    }

    pub fn pose_only() -> Self {
        Self {
            pose: true,
            ..Default::default()
        }
    }
}

/// Declared latency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    #[default]
    Realtime,
    Batch,
}

/// Fixed priority classes for tie-breaking; lower rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendClass {
    /// Platform-native NPU (ANE, Hexagon, ...).
    NativeNpu,
    Gpu,
    /// Vendor-optimized CPU path (XNNPACK-style).
    OptimizedCpu,
    GenericCpu,
}

impl BackendClass {
    pub fn rank(&self) -> u8 {
        match self {
            BackendClass::NativeNpu => 0,
            BackendClass::Gpu => 1,
            BackendClass::OptimizedCpu => 2,
            BackendClass::GenericCpu => 3,
        }
    }
}

/// Static description of a backend registered with the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique backend name (registry key and method tag).
    pub name: String,
    pub class: BackendClass,
    pub capabilities: Capabilities,
    pub latency: LatencyClass,
    /// Platforms the backend can run on; empty means any.
    pub platforms: Vec<PlatformTag>,
}

impl BackendDescriptor {
    pub fn supports_platform(&self, platform: PlatformTag) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }
}
