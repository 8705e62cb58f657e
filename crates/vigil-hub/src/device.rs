//! Target device selection.

use tracing::info;

use crate::client::HubDevice;

/// How the selected device matched the preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMatch {
    Exact,
    /// Name contains the preferred family token.
    Family,
    /// Nothing matched; first available device.
    FirstAvailable,
}

impl DeviceMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMatch::Exact => "exact",
            DeviceMatch::Family => "family",
            DeviceMatch::FirstAvailable => "first-available",
        }
    }
}

/// Pick a device: exact name, else substring match on the family token,
/// else the first available. `None` only when the list is empty.
pub fn select_device<'a>(
    devices: &'a [HubDevice],
    preferred: &str,
) -> Option<(&'a HubDevice, DeviceMatch)> {
    let selected = devices
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(preferred))
        .map(|d| (d, DeviceMatch::Exact))
        .or_else(|| {
            let token = preferred.to_lowercase();
            devices
                .iter()
                .find(|d| d.name.to_lowercase().contains(&token))
                .map(|d| (d, DeviceMatch::Family))
        })
        .or_else(|| devices.first().map(|d| (d, DeviceMatch::FirstAvailable)));

    if let Some((device, tier)) = &selected {
        info!(
            preferred,
            device = %device.name,
            tier = tier.as_str(),
            "device selected"
        );
    }
    selected
}
