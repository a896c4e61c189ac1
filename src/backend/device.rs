// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (extensions, queue family, surface support)
// - Logical device + queue creation
// - Memory type lookup, queue submission helpers

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

use super::instance::extension_name;
use super::{Surface, VulkanInstance};

/// Vulkan device wrapper with automatic cleanup
///
/// Holds the surface (and through it the instance), so both outlive every
/// object created from this device.
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    // Device properties (cached)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub sampler_anisotropy: bool,

    surface: Arc<Surface>,
}

/// A GPU that passed every requirement
struct Candidate {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    score: u32,
}

impl VulkanDevice {
    /// Pick a GPU that can render with `queue_flags` and present to `surface`,
    /// then create the logical device.
    pub fn new(
        surface: Arc<Surface>,
        queue_flags: vk::QueueFlags,
        extensions: &[&CStr],
    ) -> Result<Arc<Self>> {
        let instance = Arc::clone(surface.instance());

        let (physical_device, graphics_queue_family) =
            Self::pick_physical_device(&instance, &surface, queue_flags, extensions)?;

        let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.instance.get_physical_device_memory_properties(physical_device) };
        let features = unsafe { instance.instance.get_physical_device_features(physical_device) };
        let sampler_anisotropy = features.sampler_anisotropy == vk::TRUE;

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let (device, graphics_queue) = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            extensions,
            sampler_anisotropy,
        )?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            graphics_queue,
            graphics_queue_family,
            properties,
            memory_properties,
            sampler_anisotropy,
            surface,
        }))
    }

    fn pick_physical_device(
        instance: &VulkanInstance,
        surface: &Surface,
        queue_flags: vk::QueueFlags,
        extensions: &[&CStr],
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let mut best: Option<Candidate> = None;

        for physical_device in instance.physical_devices()? {
            match Self::evaluate(instance, surface, physical_device, queue_flags, extensions) {
                Ok(Some(candidate)) => {
                    if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                        best = Some(candidate);
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping GPU {:?}: {:#}", physical_device, e),
            }
        }

        best.map(|c| (c.physical_device, c.queue_family))
            .ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    fn evaluate(
        instance: &VulkanInstance,
        surface: &Surface,
        physical_device: vk::PhysicalDevice,
        queue_flags: vk::QueueFlags,
        extensions: &[&CStr],
    ) -> Result<Option<Candidate>> {
        let props = unsafe { instance.instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();

        let available = unsafe { instance.instance.enumerate_device_extension_properties(physical_device) }
            .context("vkEnumerateDeviceExtensionProperties")?;
        let available: Vec<String> = available.iter().map(|p| extension_name(&p.extension_name)).collect();

        let missing = missing_extensions(&available, extensions);
        if !missing.is_empty() {
            log::info!("{}: missing device extensions {:?}", name, missing);
            return Ok(None);
        }

        let families =
            unsafe { instance.instance.get_physical_device_queue_family_properties(physical_device) };
        let Some(queue_family) = find_queue_family(&families, queue_flags, |index| {
            surface.supports_queue_family(physical_device, index)
        })?
        else {
            log::info!("{}: no queue family with {:?} + present support", name, queue_flags);
            return Ok(None);
        };

        if !surface.swap_chain_support(physical_device)?.is_adequate() {
            log::info!("{}: no surface formats or present modes", name);
            return Ok(None);
        }

        Ok(Some(Candidate {
            physical_device,
            queue_family,
            score: device_type_score(props.device_type),
        }))
    }

    fn create_logical_device(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
        sampler_anisotropy: bool,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extension_names: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(sampler_anisotropy);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe { instance.instance.create_device(physical_device, &create_info, None) }
            .context("vkCreateDevice")?;

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        Ok((device, queue))
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.surface.instance().instance
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    /// Memory type index satisfying both the resource's `type_filter` and `properties`
    pub fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> Result<u32> {
        find_memory_type_index(&self.memory_properties, type_filter, properties).with_context(|| {
            format!("No memory type matches filter {type_filter:#b} with {properties:?}")
        })
    }

    /// Submit one command buffer and block until the queue is idle
    pub fn submit_and_wait(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], vk::Fence::null())
                .context("vkQueueSubmit")?;
            self.device
                .queue_wait_idle(self.graphics_queue)
                .context("vkQueueWaitIdle")?;
        }
        Ok(())
    }

    /// Submit a frame: wait on `wait` at colour output, signal `signal` and `fence`
    pub fn submit_frame(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [signal];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], fence)
                .context("vkQueueSubmit")
        }
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("vkDeviceWaitIdle")
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(e) = self.wait_idle() {
            log::error!("{:#}", e);
        }

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

/// Requested extensions not present in `available`
pub fn missing_extensions(available: &[String], requested: &[&CStr]) -> Vec<String> {
    requested
        .iter()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|name| !available.iter().any(|a| a == name))
        .collect()
}

/// First queue family with queues, all of `flags`, and (when asked) present support
pub fn find_queue_family<F>(
    families: &[vk::QueueFamilyProperties],
    flags: vk::QueueFlags,
    mut supports_present: F,
) -> Result<Option<u32>>
where
    F: FnMut(u32) -> Result<bool>,
{
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 || !family.queue_flags.contains(flags) {
            continue;
        }
        if supports_present(index)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        has_type && has_properties
    })
}

/// Prefer discrete GPUs, then integrated, then anything else
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn queue_family_skips_empty_and_non_graphics() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::TRANSFER, 4),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 2),
        ];
        let found = find_queue_family(&families, vk::QueueFlags::GRAPHICS, |_| Ok(true)).unwrap();
        assert_eq!(found, Some(2));
    }

    #[test]
    fn queue_family_requires_present_support() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let mut asked = Vec::new();
        let found = find_queue_family(&families, vk::QueueFlags::GRAPHICS, |i| {
            asked.push(i);
            Ok(i == 1)
        })
        .unwrap();
        assert_eq!(found, Some(1));
        assert_eq!(asked, vec![0, 1]);
    }

    #[test]
    fn queue_family_none_when_nothing_fits() {
        let families = [family(vk::QueueFlags::COMPUTE, 1)];
        let found = find_queue_family(&families, vk::QueueFlags::GRAPHICS, |_| Ok(true)).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn queue_family_propagates_query_errors() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let result = find_queue_family(&families, vk::QueueFlags::GRAPHICS, |_| {
            anyhow::bail!("surface lost")
        });
        assert!(result.is_err());
    }

    #[test]
    fn memory_type_respects_filter_and_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(find_memory_type_index(&props, 0b111, host), Some(2));
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        assert_eq!(
            find_memory_type_index(&props, 0b001, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
        assert_eq!(find_memory_type_index(&props, 0b011, host), None);
    }

    #[test]
    fn memory_type_ignores_bits_past_count() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        assert_eq!(
            find_memory_type_index(&props, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }

    #[test]
    fn reports_missing_extensions() {
        let available = vec!["VK_KHR_swapchain".to_string(), "VK_KHR_maintenance1".to_string()];
        assert!(missing_extensions(&available, &[c"VK_KHR_swapchain"]).is_empty());
        assert_eq!(
            missing_extensions(&available, &[c"VK_KHR_swapchain", c"VK_KHR_ray_query"]),
            vec!["VK_KHR_ray_query".to_string()]
        );
    }

    #[test]
    fn discrete_beats_integrated() {
        assert!(
            device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU)
                > device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU)
                > device_type_score(vk::PhysicalDeviceType::CPU)
        );
    }
}
