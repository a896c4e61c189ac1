// Surface - Connection between the instance and a window
//
// Created from the window's raw handles through ash-window, so the same
// code covers Win32, Xlib, Xcb, Wayland and Metal.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;

use super::VulkanInstance;

/// What a physical device can do with this surface
#[derive(Debug, Clone, Default)]
pub struct SwapChainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupport {
    /// A swap chain needs at least one format and one present mode
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::extensions::khr::Surface,
    instance: Arc<VulkanInstance>,
}

impl Surface {
    /// Create a surface for `window`.
    ///
    /// The window must outlive the returned surface.
    pub fn new<W>(instance: Arc<VulkanInstance>, window: &W) -> Result<Arc<Self>>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        let surface_loader = ash::extensions::khr::Surface::new(&instance.entry, &instance.instance);

        Ok(Arc::new(Self {
            surface,
            surface_loader,
            instance,
        }))
    }

    pub fn instance(&self) -> &Arc<VulkanInstance> {
        &self.instance
    }

    /// Check if a queue family on `physical_device` can present to this surface
    pub fn supports_queue_family(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        unsafe {
            self.surface_loader.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.surface,
            )
        }
        .context("vkGetPhysicalDeviceSurfaceSupportKHR")
    }

    /// Query capabilities, formats and present modes in one go
    pub fn swap_chain_support(&self, physical_device: vk::PhysicalDevice) -> Result<SwapChainSupport> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
        }
        .context("vkGetPhysicalDeviceSurfaceFormatsKHR")?;

        let present_modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }
        .context("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        Ok(SwapChainSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("Destroying surface");
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_needs_formats_and_present_modes() {
        let mut support = SwapChainSupport::default();
        assert!(!support.is_adequate());

        support.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!support.is_adequate());

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
    }
}
