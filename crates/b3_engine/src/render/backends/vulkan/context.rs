//! Vulkan context
//!
//! Instance, optional validation messenger, surface, physical device and
//! logical device. The device is created with the Vulkan 1.3 features the
//! renderer relies on:
//!
//! - dynamic rendering and synchronization2
//! - extended dynamic state (cull mode)
//! - descriptor indexing for the texture array (runtime-sized, partially
//!   bound, variable count, update after bind)

use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use super::window::Window;
use super::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance with its debug messenger
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the window system's extensions, and the
    /// validation layer when `enable_validation` is set and the layer exists
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {}", e)))?;

        let app_name = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let engine_name = c"b3Engine";
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let required = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;
        let required: Vec<CString> = required
            .into_iter()
            .map(CString::new)
            .collect::<Result<_, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Invalid extension name".to_string()))?;
        let mut extensions: Vec<*const c_char> = required.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }

        let layers: Vec<*const c_char> = if validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(error) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(error);
                }
            }
        } else {
            None
        };

        log::info!("Created Vulkan 1.3 instance (validation {})", if validation { "on" } else { "off" });

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER)
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Forwards validation messages to `log` by severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the first suitable device, preferring discrete GPUs
    pub fn select_suitable_device(instance: &Instance, surface: vk::SurfaceKHR, surface_loader: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        let mut candidates: Vec<Self> = devices
            .into_iter()
            .filter_map(|device| match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => Some(info),
                Err(reason) => {
                    log::debug!("Skipping GPU: {}", reason);
                    None
                }
            })
            .collect();

        candidates.sort_by_key(|info| info.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU);

        let selected = candidates
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("No suitable GPU found".to_string()))?;

        log::info!("Selected GPU: {}", selected.name());
        Ok(selected)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        if properties.api_version < vk::API_VERSION_1_3 {
            return Err(VulkanError::InitializationFailed("Vulkan 1.3 not supported".to_string()));
        }

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut features12)
            .push_next(&mut features13);
        unsafe { instance.get_physical_device_features2(device, &mut features) };
        let base = features.features;

        let supported = features13.dynamic_rendering == vk::TRUE
            && features13.synchronization2 == vk::TRUE
            && features12.runtime_descriptor_array == vk::TRUE
            && features12.descriptor_binding_partially_bound == vk::TRUE
            && features12.descriptor_binding_variable_descriptor_count == vk::TRUE
            && features12.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
            && features12.descriptor_binding_update_unused_while_pending == vk::TRUE
            && features12.shader_sampled_image_array_non_uniform_indexing == vk::TRUE
            && base.sampler_anisotropy == vk::TRUE;
        if !supported {
            return Err(VulkanError::InitializationFailed("Required features not supported".to_string()));
        }

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family = graphics_family
            .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
        let present_family = present_family
            .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions
            .iter()
            .any(|available| unsafe { CStr::from_ptr(available.extension_name.as_ptr()) } == SwapchainLoader::name());
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed("VK_KHR_swapchain not supported".to_string()));
        }

        Ok(Self {
            device,
            properties,
            graphics_family,
            present_family,
        })
    }

    /// Device name reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Minimum alignment of dynamic uniform buffer offsets
    pub fn min_uniform_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    /// Highest sample count usable for both color and depth attachments,
    /// capped at `cap`
    pub fn msaa_samples(&self, cap: u32) -> vk::SampleCountFlags {
        let limits = &self.properties.limits;
        let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
        [
            vk::SampleCountFlags::TYPE_64,
            vk::SampleCountFlags::TYPE_32,
            vk::SampleCountFlags::TYPE_16,
            vk::SampleCountFlags::TYPE_8,
            vk::SampleCountFlags::TYPE_4,
            vk::SampleCountFlags::TYPE_2,
        ]
        .into_iter()
        .find(|&samples| samples.as_raw() <= cap && counts.contains(samples))
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
    }
}

/// Logical device and its queues
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
}

impl LogicalDevice {
    /// Create the device with the renderer's feature set enabled
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: HashSet<u32> = [physical_device.graphics_family, physical_device.present_family]
            .into_iter()
            .collect();

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [SwapchainLoader::name().as_ptr()];

        let mut features12 = vk::PhysicalDeviceVulkan12Features::builder()
            .runtime_descriptor_array(true)
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_variable_descriptor_count(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_update_unused_while_pending(true)
            .shader_sampled_image_array_non_uniform_indexing(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::builder()
            .dynamic_rendering(true)
            .synchronization2(true);
        let base = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true).build();
        let mut features = vk::PhysicalDeviceFeatures2::builder()
            .features(base)
            .push_next(&mut features12)
            .push_next(&mut features13);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .push_next(&mut features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device.graphics_family,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Owns the core Vulkan objects. Fields drop in declaration order, so the
/// surface and device go before the instance.
pub struct VulkanContext {
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
    swapchain_loader: SwapchainLoader,
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a context presenting to `window`
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, enable_validation)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;

        let physical_device = match PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader) {
            Ok(info) => info,
            Err(error) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(error);
            }
        };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(error) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(error);
            }
        };
        let swapchain_loader = SwapchainLoader::new(&instance.instance, &device.device);

        Ok(Self {
            surface_loader,
            surface,
            physical_device,
            swapchain_loader,
            device,
            instance,
        })
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Surface handle
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Graphics queue family index
    pub fn graphics_family(&self) -> u32 {
        self.device.graphics_family
    }

    /// Surface capabilities for the selected device
    pub fn surface_capabilities(&self) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device.device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Find a memory type matching `type_filter` with all of `properties`
    pub fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        let mem_properties = unsafe {
            self.instance
                .instance
                .get_physical_device_memory_properties(self.physical_device.device)
        };

        (0..mem_properties.memory_type_count)
            .find(|&i| {
                type_filter & (1 << i) != 0
                    && mem_properties.memory_types[i as usize].property_flags.contains(properties)
            })
            .ok_or(VulkanError::NoSuitableMemoryType)
    }

    /// Block until the device has finished all work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
