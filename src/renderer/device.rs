use std::collections::BTreeSet;
use std::ffi::{CStr, c_char};

use ash::vk;
use log::*;

use super::RendererError;
use super::instance::{Surface, VulkanInstance, first_missing, vk_str_bytes};
use super::platform;
use super::swapchain::SwapchainSupport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Walks the families in order, keeping the latest graphics-capable and
    /// present-capable index, and stops at the first index where both are known
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> Result<bool, RendererError>,
    ) -> Result<Option<Self>, RendererError> {
        let mut graphics = None;
        let mut present = None;

        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(i);
            }
            if supports_present(i)? {
                present = Some(i);
            }

            if let (Some(graphics), Some(present)) = (graphics, present) {
                return Ok(Some(Self { graphics, present }));
            }
        }

        Ok(None)
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// one entry per distinct family, for queue creation and concurrent sharing
    pub fn unique(&self) -> Vec<u32> {
        let unique: BTreeSet<u32> = [self.graphics, self.present].into_iter().collect();
        unique.into_iter().collect()
    }
}

/// The outcome of probing one physical device
#[derive(Debug, Clone, Default)]
pub struct Suitability {
    pub queue_families: Option<QueueFamilyIndices>,
    pub missing_extension: Option<String>,
    pub swapchain_adequate: bool,
}

impl Suitability {
    pub fn queue_families_if_suitable(&self) -> Option<QueueFamilyIndices> {
        if self.missing_extension.is_some() || !self.swapchain_adequate {
            return None;
        }
        self.queue_families
    }

    fn rejection_reason(&self) -> String {
        if self.queue_families.is_none() {
            "missing graphics or present queue family".to_owned()
        } else if let Some(extension) = &self.missing_extension {
            format!("missing device extension {extension}")
        } else {
            "no surface formats or present modes".to_owned()
        }
    }
}

/// Picks the first candidate (in enumeration order) whose probe is suitable
///
/// No scoring: the result depends only on the order the driver reports devices.
pub fn select_first_suitable<D: Copy + std::fmt::Debug>(
    candidates: &[D],
    mut probe: impl FnMut(D) -> Result<Suitability, RendererError>,
) -> Result<(D, QueueFamilyIndices), RendererError> {
    for &candidate in candidates {
        let suitability = probe(candidate)?;
        match suitability.queue_families_if_suitable() {
            Some(indices) => return Ok((candidate, indices)),
            None => debug!(
                "skipping device {candidate:?}: {}",
                suitability.rejection_reason()
            ),
        }
    }

    Err(RendererError::NoSuitableDevice)
}

/// the highest sample count both color and depth attachments support, capped at `ceiling`
pub fn max_usable_sample_count(
    color_counts: vk::SampleCountFlags,
    depth_counts: vk::SampleCountFlags,
    ceiling: vk::SampleCountFlags,
) -> vk::SampleCountFlags {
    let counts = color_counts & depth_counts;

    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .filter(|count| count.as_raw() <= ceiling.as_raw())
    .find(|count| counts.contains(*count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Physical + logical device and the queues the renderer submits to
pub struct DeviceContext {
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue_families: QueueFamilyIndices,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub msaa_samples: vk::SampleCountFlags,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// `None` when the device lacks sampler anisotropy
    pub max_sampler_anisotropy: Option<f32>,
    instance: ash::Instance,
}

impl DeviceContext {
    pub fn create(
        instance: &VulkanInstance,
        surface: &Surface,
        max_msaa_samples: vk::SampleCountFlags,
    ) -> Result<Self, RendererError> {
        let vk_instance = &instance.instance;
        let physical_devices = unsafe { vk_instance.enumerate_physical_devices()? };

        let (physical_device, queue_families) = select_first_suitable(&physical_devices, |pd| {
            probe_device(vk_instance, surface, pd)
        })?;

        let properties = unsafe { vk_instance.get_physical_device_properties(physical_device) };
        let features = unsafe { vk_instance.get_physical_device_features(physical_device) };
        let memory_properties =
            unsafe { vk_instance.get_physical_device_memory_properties(physical_device) };

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("selected physical device: {device_name}");

        let msaa_samples = max_usable_sample_count(
            properties.limits.framebuffer_color_sample_counts,
            properties.limits.framebuffer_depth_sample_counts,
            max_msaa_samples,
        );
        debug!("msaa samples: {msaa_samples:?}");

        let anisotropy = features.sampler_anisotropy == vk::TRUE;
        let max_sampler_anisotropy = anisotropy.then_some(properties.limits.max_sampler_anisotropy);

        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let enabled_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);
        let extension_names: Vec<*const c_char> = platform::REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| e.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&enabled_features);

        let device = unsafe { vk_instance.create_device(physical_device, &create_info, None)? };

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        Ok(Self {
            physical_device,
            device,
            queue_families,
            graphics_queue,
            present_queue,
            msaa_samples,
            memory_properties,
            max_sampler_anisotropy,
            instance: vk_instance.clone(),
        })
    }

    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    pub fn wait_idle(&self) -> Result<(), RendererError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        debug!("destroying logical device");
        unsafe { self.device.destroy_device(None) };
    }
}

fn probe_device(
    instance: &ash::Instance,
    surface: &Surface,
    physical_device: vk::PhysicalDevice,
) -> Result<Suitability, RendererError> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let queue_families = QueueFamilyIndices::find(&families, |i| {
        let supported = unsafe {
            surface.loader.get_physical_device_surface_support(
                physical_device,
                i,
                surface.handle,
            )?
        };
        Ok(supported)
    })?;

    let available_extensions =
        unsafe { instance.enumerate_device_extension_properties(physical_device)? };
    let available: Vec<Vec<u8>> = available_extensions
        .iter()
        .map(|prop| vk_str_bytes(&prop.extension_name))
        .collect();
    let required: Vec<&CStr> = platform::REQUIRED_DEVICE_EXTENSIONS.to_vec();
    let missing_extension = first_missing(&required, &available);

    // the swapchain queries are only valid once the extension is known to exist
    let swapchain_adequate = missing_extension.is_none()
        && SwapchainSupport::query(surface, physical_device)?.is_adequate();

    Ok(Suitability {
        queue_families,
        missing_extension,
        swapchain_adequate,
    })
}
