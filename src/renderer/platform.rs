use std::ffi::CStr;

use ash::vk;

/// instance extensions needed on top of what the window reports
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub const ADDITIONAL_INSTANCE_EXTENSIONS: [&CStr; 0] = [];
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const ADDITIONAL_INSTANCE_EXTENSIONS: [&CStr; 2] = [
    ash::khr::portability_enumeration::NAME,
    ash::khr::get_physical_device_properties2::NAME,
];

/// device extensions every candidate device must support
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 2] = [
    ash::khr::swapchain::NAME,
    ash::khr::portability_subset::NAME,
];

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub fn instance_create_flags() -> vk::InstanceCreateFlags {
    vk::InstanceCreateFlags::default()
}
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn instance_create_flags() -> vk::InstanceCreateFlags {
    vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
}
