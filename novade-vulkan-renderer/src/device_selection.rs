//! Physical device and queue family selection.

use std::ffi::CStr;

use ash::vk;

use crate::api::{PhysicalDeviceInfo, QueueFamilyInfo};
use crate::error::RendererError;

/// Preference score of a device type. Higher wins; `None` excludes the device.
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> Option<u32> {
    match device_type {
        vk::PhysicalDeviceType::OTHER => Some(1),
        vk::PhysicalDeviceType::CPU => Some(2),
        vk::PhysicalDeviceType::VIRTUAL_GPU => Some(3),
        vk::PhysicalDeviceType::INTEGRATED_GPU => Some(4),
        vk::PhysicalDeviceType::DISCRETE_GPU => Some(5),
        _ => None,
    }
}

/// Whether `device` advertises every extension in `required`.
pub fn has_extensions(device: &PhysicalDeviceInfo, required: &[&CStr]) -> bool {
    required.iter().all(|name| {
        let name = name.to_string_lossy();
        device.extensions.iter().any(|available| *available == name)
    })
}

/// Picks the highest-scoring device that offers `required`. Ties keep the
/// device enumerated first.
pub fn select_device<'a>(
    candidates: &'a [PhysicalDeviceInfo],
    required: &[&CStr],
) -> Option<&'a PhysicalDeviceInfo> {
    let mut best: Option<(&PhysicalDeviceInfo, u32)> = None;
    for device in candidates {
        let Some(score) = device_type_score(device.device_type) else {
            tracing::debug!(device = %device.name, device_type = ?device.device_type, "Skipping device of unknown type");
            continue;
        };
        if !has_extensions(device, required) {
            tracing::debug!(device = %device.name, "Skipping device without swapchain support");
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((device, score));
        }
    }
    best.map(|(device, _)| device)
}

/// First queue family that can present to the surface and has graphics.
pub fn select_queue_family<F>(
    families: &[QueueFamilyInfo],
    mut supports_present: F,
) -> Result<Option<u32>, RendererError>
where
    F: FnMut(u32) -> Result<bool, RendererError>,
{
    for family in families {
        if supports_present(family.index)? && family.flags.contains(vk::QueueFlags::GRAPHICS) {
            return Ok(Some(family.index));
        }
    }
    Ok(None)
}
