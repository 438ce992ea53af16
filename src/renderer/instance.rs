use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use log::*;

use super::RendererError;
use super::debug::{self, DebugMessenger, DebugReporter};
use super::platform;
use super::window::HostWindow;

/// The instance plus its optional validation messenger
///
/// Dropped after everything created from it.
pub struct VulkanInstance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    // boxed twice so the callback sees a thin, stable pointer
    #[allow(clippy::redundant_allocation)]
    _reporter: Box<Box<dyn DebugReporter>>,
}

impl VulkanInstance {
    pub fn create(
        window: &dyn HostWindow,
        enable_validation: bool,
        reporter: Box<dyn DebugReporter>,
    ) -> Result<Self, RendererError> {
        let entry = ash::Entry::linked();

        let window_extensions: Vec<CString> = window
            .instance_extensions()?
            .into_iter()
            .map(CString::new)
            .collect::<Result<_, _>>()
            .map_err(|e| RendererError::Window(e.to_string()))?;

        let mut required_extensions: Vec<&CStr> =
            window_extensions.iter().map(CString::as_c_str).collect();
        required_extensions.extend(platform::ADDITIONAL_INSTANCE_EXTENSIONS);
        if enable_validation {
            required_extensions.push(ash::ext::debug_utils::NAME);
        }
        let required_layers = required_layers(enable_validation);

        check_required_extensions(&entry, &required_extensions)?;
        check_required_layers(&entry, &required_layers)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Model Viewer")
            .engine_name(c"No Engine")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let enabled_extension_names: Vec<*const c_char> =
            required_extensions.iter().map(|e| e.as_ptr()).collect();
        let enabled_layer_names: Vec<*const c_char> =
            required_layers.iter().map(|l| l.as_ptr()).collect();

        let reporter = Box::new(reporter);
        // chained into instance creation too, so create/destroy messages are reported
        let mut debug_create_info = debug::build_messenger_create_info(&reporter);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names)
            .flags(platform::instance_create_flags());
        if enable_validation {
            create_info = create_info.push_next(&mut debug_create_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug_messenger = if enable_validation {
            match DebugMessenger::create(&entry, &instance, &debug_create_info) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        debug!("created vulkan instance (validation: {enable_validation})");

        Ok(Self {
            entry,
            instance,
            debug_messenger,
            _reporter: reporter,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        if let Some(messenger) = self.debug_messenger.as_mut() {
            messenger.destroy();
        }

        unsafe { self.instance.destroy_instance(None) };
    }
}

/// The presentation surface for the host window
pub struct Surface {
    pub loader: ash::khr::surface::Instance,
    pub handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn create(
        instance: &VulkanInstance,
        window: &dyn HostWindow,
    ) -> Result<Self, RendererError> {
        let loader = ash::khr::surface::Instance::new(&instance.entry, &instance.instance);
        let handle = window.create_surface(&instance.instance)?;

        Ok(Self { loader, handle })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

fn required_layers(enable_validation: bool) -> Vec<&'static CStr> {
    if enable_validation {
        vec![platform::VALIDATION_LAYER]
    } else {
        vec![]
    }
}

fn check_required_layers(entry: &Entry, required_layers: &[&CStr]) -> Result<(), RendererError> {
    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let available: Vec<Vec<u8>> = available_layers
        .iter()
        .map(|prop| vk_str_bytes(&prop.layer_name))
        .collect();

    match first_missing(required_layers, &available) {
        Some(missing) => Err(RendererError::MissingLayer(missing)),
        None => Ok(()),
    }
}

fn check_required_extensions(
    entry: &Entry,
    required_extensions: &[&CStr],
) -> Result<(), RendererError> {
    let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let available: Vec<Vec<u8>> = available_extensions
        .iter()
        .map(|prop| vk_str_bytes(&prop.extension_name))
        .collect();

    match first_missing(required_extensions, &available) {
        Some(missing) => Err(RendererError::MissingExtension(missing)),
        None => Ok(()),
    }
}

/// the first required name absent from `available`, for error reporting
pub(super) fn first_missing(required: &[&CStr], available: &[Vec<u8>]) -> Option<String> {
    required
        .iter()
        .find(|name| !available.iter().any(|a| a.as_slice() == name.to_bytes()))
        .map(|name| name.to_string_lossy().into_owned())
}

/// the bytes of a fixed-size, nul-padded vulkan string
pub(super) fn vk_str_bytes(vk_str: &[c_char]) -> Vec<u8> {
    vk_str
        .iter()
        .map(|byte| *byte as u8)
        .take_while(|byte| *byte != b'\0')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vk_name(name: &str) -> [c_char; 256] {
        let mut out = [0 as c_char; 256];
        for (i, byte) in name.bytes().enumerate() {
            out[i] = byte as c_char;
        }
        out
    }

    #[test]
    fn vk_str_bytes_stops_at_nul() {
        let name = vk_name("VK_KHR_swapchain");
        assert_eq!(vk_str_bytes(&name), b"VK_KHR_swapchain".to_vec());
    }

    #[test]
    fn first_missing_reports_the_absent_name() {
        let available = vec![b"VK_KHR_surface".to_vec()];
        let required = [c"VK_KHR_surface", c"VK_EXT_debug_utils"];

        assert_eq!(
            first_missing(&required, &available).as_deref(),
            Some("VK_EXT_debug_utils")
        );
        assert_eq!(first_missing(&required[..1], &available), None);
    }

    #[test]
    fn validation_layer_only_requested_when_enabled() {
        assert!(required_layers(false).is_empty());
        assert_eq!(required_layers(true), vec![platform::VALIDATION_LAYER]);
    }
}
