use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_void;
use thiserror::Error;
use vulkanalia::Version;
use vulkanalia::loader::{LIBRARY, LibloadingLoader};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::window as vk_window;
use winit::window::Window;

use vulkanalia::vk::{ExtDebugUtilsExtension, KhrSurfaceExtension};

/// Instance, surface and logical device shared by everything the renderer creates.
pub struct Context {
    /// Keeps the Vulkan library loaded.
    pub entry: Entry,
    pub instance: Instance,
    pub device: Device,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub indices: QueueFamilyIndices,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    /// `fillModeNonSolid` was requested and enabled on the device.
    pub wireframe: bool,
    messenger: vk::DebugUtilsMessengerEXT,
}

const VALIDATION_ENABLED: bool = cfg!(debug_assertions);

const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

impl Context {
    pub unsafe fn create(window: &Window, wireframe: bool) -> Result<Self> {
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|e| anyhow!("{}", e))?;
        let (instance, messenger) = Self::create_instance(window, &entry)?;
        let surface = match vk_window::create_surface(&instance, window, window) {
            Ok(surface) => surface,
            Err(error) => {
                Self::destroy_instance(&instance, messenger);
                return Err(error.into());
            }
        };

        let (physical_device, indices, wireframe, device) =
            match Self::create_device(&entry, &instance, surface, wireframe) {
                Ok(created) => created,
                Err(error) => {
                    instance.destroy_surface_khr(surface, None);
                    Self::destroy_instance(&instance, messenger);
                    return Err(error);
                }
            };
        let graphics_queue = device.get_device_queue(indices.graphics, 0);
        let present_queue = device.get_device_queue(indices.present, 0);

        Ok(Self {
            entry,
            instance,
            device,
            surface,
            physical_device,
            indices,
            graphics_queue,
            present_queue,
            wireframe,
            messenger,
        })
    }

    unsafe fn create_device(
        entry: &Entry,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        wireframe: bool,
    ) -> Result<(vk::PhysicalDevice, QueueFamilyIndices, bool, Device)> {
        let physical_device = Self::pick_physical_device(instance, surface)?;
        let indices = QueueFamilyIndices::get(instance, surface, physical_device)?;

        let features = instance.get_physical_device_features(physical_device);
        let wireframe = if wireframe && features.fill_mode_non_solid != vk::TRUE {
            tracing::warn!("Wireframe rendering not supported, drawing filled polygons.");
            false
        } else {
            wireframe
        };

        let device = Self::create_logical_device(entry, instance, physical_device, indices, wireframe)?;
        Ok((physical_device, indices, wireframe, device))
    }

    unsafe fn create_instance(
        window: &Window,
        entry: &Entry,
    ) -> Result<(Instance, vk::DebugUtilsMessengerEXT)> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(b"Star Fan\0")
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"No Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        let available_layers = entry
            .enumerate_instance_layer_properties()?
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        tracing::debug!("Available layers:");
        for layer in &available_layers {
            tracing::debug!("  {}", layer);
        }

        if VALIDATION_ENABLED && !available_layers.contains(&VALIDATION_LAYER) {
            return Err(anyhow!("Validation layer requested but not supported."));
        }

        let layers = if VALIDATION_ENABLED {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let mut extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        if VALIDATION_ENABLED {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        // Enable portability extensions for MoltenVK on macOS
        let flags = if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(
                vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION
                    .name
                    .as_ptr(),
            );
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let mut debug_info = Self::debug_messenger_info();
        if VALIDATION_ENABLED {
            info = info.push_next(&mut debug_info);
        }

        let instance = entry.create_instance(&info, None)?;

        let messenger = if VALIDATION_ENABLED {
            match instance.create_debug_utils_messenger_ext(&Self::debug_messenger_info(), None) {
                Ok(messenger) => messenger,
                Err(error) => {
                    instance.destroy_instance(None);
                    return Err(error.into());
                }
            }
        } else {
            vk::DebugUtilsMessengerEXT::null()
        };

        Ok((instance, messenger))
    }

    fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .user_callback(Some(Self::debug_callback))
    }

    pub extern "system" fn debug_callback(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        type_: vk::DebugUtilsMessageTypeFlagsEXT,
        data: *const vk::DebugUtilsMessengerCallbackDataEXT,
        _: *mut c_void,
    ) -> vk::Bool32 {
        let data = unsafe { *data };
        let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

        if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
            tracing::error!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
            tracing::warn!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
            tracing::debug!("({:?}) {}", type_, message);
        } else {
            tracing::trace!("({:?}) {}", type_, message);
        }

        vk::FALSE
    }

    pub unsafe fn destroy(&mut self) {
        self.device.destroy_device(None);
        self.instance.destroy_surface_khr(self.surface, None);
        Self::destroy_instance(&self.instance, self.messenger);
    }

    unsafe fn destroy_instance(instance: &Instance, messenger: vk::DebugUtilsMessengerEXT) {
        if VALIDATION_ENABLED {
            instance.destroy_debug_utils_messenger_ext(messenger, None);
        }

        instance.destroy_instance(None);
    }

    unsafe fn check_physical_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<()> {
        QueueFamilyIndices::get(instance, surface, physical_device)?;
        Self::check_physical_device_extensions(instance, physical_device)?;

        let support = SwapchainSupport::get(instance, surface, physical_device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(anyhow!(SuitabilityError("swapchain support")));
        }

        Ok(())
    }

    unsafe fn check_physical_device_extensions(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<()> {
        let extensions = instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        if DEVICE_EXTENSIONS.iter().all(|e| extensions.contains(e)) {
            Ok(())
        } else {
            Err(anyhow!(SuitabilityError(
                "required device extensions"
            )))
        }
    }

    unsafe fn pick_physical_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::PhysicalDevice> {
        for physical_device in instance.enumerate_physical_devices()? {
            let properties = instance.get_physical_device_properties(physical_device);

            if let Err(error) = Self::check_physical_device(instance, surface, physical_device) {
                tracing::warn!(
                    "Skipping physical device (`{}`): {}",
                    properties.device_name,
                    error
                );
            } else {
                tracing::info!("Selected physical device (`{}`).", properties.device_name);
                tracing::info!(
                    "Vulkan version supported: {}.{}.{}",
                    vk::version_major(properties.api_version),
                    vk::version_minor(properties.api_version),
                    vk::version_patch(properties.api_version),
                );
                return Ok(physical_device);
            }
        }

        Err(anyhow!("Failed to find suitable physical device."))
    }

    unsafe fn create_logical_device(
        entry: &Entry,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        indices: QueueFamilyIndices,
        wireframe: bool,
    ) -> Result<Device> {
        let mut unique_indices = HashSet::new();
        unique_indices.insert(indices.graphics);
        unique_indices.insert(indices.present);

        let queue_priorities = &[1.0];
        let queue_infos = unique_indices
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if VALIDATION_ENABLED {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }
        let features = vk::PhysicalDeviceFeatures::builder().fill_mode_non_solid(wireframe);

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance.create_device(physical_device, &info, None)?;
        Ok(device)
    }

    pub unsafe fn memory_type_index(
        &self,
        properties: vk::MemoryPropertyFlags,
        requirements: vk::MemoryRequirements,
    ) -> Result<u32> {
        let memory = self
            .instance
            .get_physical_device_memory_properties(self.physical_device);

        (0..memory.memory_type_count)
            .find(|i| {
                let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
                let memory_type = memory.memory_types[*i as usize];
                suitable && memory_type.property_flags.contains(properties)
            })
            .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
    }
}

#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

#[derive(Copy, Clone, Debug)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    unsafe fn get(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_queue_family_properties(physical_device);

        let graphics = properties
            .iter()
            .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);

        let mut present = None;
        for (index, _) in properties.iter().enumerate() {
            if instance.get_physical_device_surface_support_khr(
                physical_device,
                index as u32,
                surface,
            )? {
                present = Some(index as u32);
                break;
            }
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            Ok(Self { graphics, present })
        } else {
            Err(anyhow!(SuitabilityError(
                "required queue families"
            )))
        }
    }
}

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
            formats: instance.get_physical_device_surface_formats_khr(physical_device, surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
        })
    }
}
