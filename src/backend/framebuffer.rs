// Framebuffers, one per swapchain image view

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;

pub struct FramebufferGroup {
    pub framebuffers: Vec<vk::Framebuffer>,
    device: Arc<VulkanDevice>,
}

impl FramebufferGroup {
    pub fn new(
        device: &Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        image_views: &[vk::ImageView],
    ) -> Result<Self> {
        let mut group = Self {
            framebuffers: Vec::with_capacity(image_views.len()),
            device: Arc::clone(device),
        };

        for &image_view in image_views {
            let attachments = &[image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            // Partially built groups are cleaned up by Drop
            let framebuffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
                .context("vkCreateFramebuffer")?;
            group.framebuffers.push(framebuffer);
        }

        Ok(group)
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

impl Drop for FramebufferGroup {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
