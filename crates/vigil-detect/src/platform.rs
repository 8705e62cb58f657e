//! Host platform detection.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Coarse platform classification used for backend enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTag {
    #[default]
    GenericCpu,
    AppleSilicon,
    NvidiaCuda,
    SnapdragonNpu,
    Arm64Linux,
    WindowsArm64,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::GenericCpu => "generic-cpu",
            PlatformTag::AppleSilicon => "apple-silicon",
            PlatformTag::NvidiaCuda => "nvidia-cuda",
            PlatformTag::SnapdragonNpu => "snapdragon-npu",
            PlatformTag::Arm64Linux => "arm64-linux",
            PlatformTag::WindowsArm64 => "windows-arm64",
        }
    }
}

/// Probe the host platform.
///
/// `VIGIL_PLATFORM` overrides detection (useful on Snapdragon devices
/// where the SoC is not visible through portable APIs).
pub fn detect_platform() -> PlatformTag {
    if let Ok(forced) = std::env::var("VIGIL_PLATFORM") {
        if let Some(tag) = parse_tag(&forced) {
            info!(platform = tag.as_str(), "platform forced via VIGIL_PLATFORM");
            return tag;
        }
    }

    let tag = probe();
    info!(platform = tag.as_str(), "platform detected");
    tag
}

fn parse_tag(s: &str) -> Option<PlatformTag> {
    match s.trim().to_ascii_lowercase().as_str() {
        "generic-cpu" => Some(PlatformTag::GenericCpu),
        "apple-silicon" => Some(PlatformTag::AppleSilicon),
        "nvidia-cuda" => Some(PlatformTag::NvidiaCuda),
        "snapdragon-npu" => Some(PlatformTag::SnapdragonNpu),
        "arm64-linux" => Some(PlatformTag::Arm64Linux),
        "windows-arm64" => Some(PlatformTag::WindowsArm64),
        _ => None,
    }
}

fn probe() -> PlatformTag {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => PlatformTag::AppleSilicon,
        ("windows", "aarch64") => PlatformTag::WindowsArm64,
        ("linux", "aarch64") => {
            if is_snapdragon() {
                PlatformTag::SnapdragonNpu
            } else {
                PlatformTag::Arm64Linux
            }
        }
        _ => {
            if which::which("nvidia-smi").is_ok() {
                PlatformTag::NvidiaCuda
            } else {
                PlatformTag::GenericCpu
            }
        }
    }
}

/// Snapdragon SoCs expose a Qualcomm vendor string in the device tree.
fn is_snapdragon() -> bool {
    for path in [
        "/proc/device-tree/model",
        "/sys/devices/soc0/machine",
    ] {
        if let Ok(contents) = std::fs::read_to_string(path) {
            let lowered = contents.to_lowercase();
            if lowered.contains("qualcomm") || lowered.contains("snapdragon") {
                return true;
            }
        }
    }
    false
}
