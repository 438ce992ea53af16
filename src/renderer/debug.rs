use std::ffi::CStr;
use std::os::raw::c_void;

use ash::ext::debug_utils;
use ash::vk;
use log::*;

// callback shape taken from here:
// https://github.com/unknownue/vulkan-tutorial-rust/blob/master/src/utility/debug.rs#L8

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl DebugSeverity {
    fn from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else {
            Self::Verbose
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCategory {
    General,
    Validation,
    Performance,
}

impl DebugCategory {
    fn from_vk(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Self::Validation
        } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Self::Performance
        } else {
            Self::General
        }
    }
}

/// Receives validation-layer messages
///
/// Installed once per instance; the renderer keeps it alive
/// until after the instance is destroyed.
pub trait DebugReporter {
    fn report(&self, severity: DebugSeverity, category: DebugCategory, message: &str);
}

/// Forwards messages at or above `threshold` to the `log` facade
pub struct LogReporter {
    pub threshold: DebugSeverity,
}

impl Default for LogReporter {
    fn default() -> Self {
        Self {
            threshold: DebugSeverity::Warning,
        }
    }
}

impl DebugReporter for LogReporter {
    fn report(&self, severity: DebugSeverity, category: DebugCategory, message: &str) {
        if severity < self.threshold {
            return;
        }

        match severity {
            DebugSeverity::Error => error!("[{category:?}] {message}"),
            DebugSeverity::Warning => warn!("[{category:?}] {message}"),
            DebugSeverity::Info => debug!("[{category:?}] {message}"),
            DebugSeverity::Verbose => trace!("[{category:?}] {message}"),
        }
    }
}

/// the user data pointer is a `*const Box<dyn DebugReporter>`
unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_user_data.is_null() || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let reporter = unsafe { &*(p_user_data as *const Box<dyn DebugReporter>) };
    let p_message = unsafe { (*p_callback_data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { CStr::from_ptr(p_message) };
    let message = message.to_string_lossy();

    reporter.report(
        DebugSeverity::from_vk(message_severity),
        DebugCategory::from_vk(message_type),
        &message,
    );

    vk::FALSE
}

pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub fn create(
        entry: &ash::Entry,
        instance: &ash::Instance,
        create_info: &vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    ) -> Result<Self, vk::Result> {
        let loader = debug_utils::Instance::new(entry, instance);
        let messenger = unsafe { loader.create_debug_utils_messenger(create_info, None)? };

        Ok(Self { loader, messenger })
    }

    /// must run before the owning instance is destroyed
    pub fn destroy(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
        self.messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

/// `reporter` must outlive every use of the returned create info
pub fn build_messenger_create_info(
    reporter: &Box<dyn DebugReporter>,
) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(vulkan_debug_utils_callback))
        .user_data(reporter as *const Box<dyn DebugReporter> as *mut c_void)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Messages = Rc<RefCell<Vec<(DebugSeverity, DebugCategory, String)>>>;

    struct Collect(Messages);

    impl DebugReporter for Collect {
        fn report(&self, severity: DebugSeverity, category: DebugCategory, message: &str) {
            self.0
                .borrow_mut()
                .push((severity, category, message.to_owned()));
        }
    }

    #[test]
    fn severity_picks_the_highest_bit() {
        let flags = vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
        assert_eq!(DebugSeverity::from_vk(flags), DebugSeverity::Error);
        assert_eq!(
            DebugSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
            DebugSeverity::Verbose
        );
        assert!(DebugSeverity::Warning > DebugSeverity::Info);
    }

    #[test]
    fn category_prefers_validation() {
        let flags = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
        assert_eq!(DebugCategory::from_vk(flags), DebugCategory::Validation);
        assert_eq!(
            DebugCategory::from_vk(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            DebugCategory::Performance
        );
    }

    #[test]
    fn callback_routes_to_the_injected_reporter() {
        let messages = Messages::default();
        let reporter: Box<dyn DebugReporter> = Box::new(Collect(messages.clone()));
        let create_info = build_messenger_create_info(&reporter);

        let text = c"vkCreateImage: bad usage";
        let callback_data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: text.as_ptr(),
            ..Default::default()
        };

        let callback = create_info.pfn_user_callback.unwrap();
        let result = unsafe {
            callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &callback_data,
                create_info.p_user_data,
            )
        };
        assert_eq!(result, vk::FALSE);

        let messages = messages.borrow();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, DebugSeverity::Error);
        assert_eq!(messages[0].1, DebugCategory::Validation);
        assert_eq!(messages[0].2, "vkCreateImage: bad usage");
    }

    #[test]
    fn null_user_data_is_ignored() {
        let text = c"ignored";
        let callback_data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: text.as_ptr(),
            ..Default::default()
        };

        let result = unsafe {
            vulkan_debug_utils_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                &callback_data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }
}
