// Command pools and command buffers
//
// Frame command buffers are recorded once per swapchain image and re-recorded
// only when the swapchain is rebuilt. Transfers use short-lived one-time
// command buffers that are submitted and waited on immediately.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;

pub struct CommandPool {
    pub pool: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl CommandPool {
    pub fn new(device: &Arc<VulkanDevice>, flags: vk::CommandPoolCreateFlags) -> Result<Arc<Self>> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            .flags(flags);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("vkCreateCommandPool")?;

        Ok(Arc::new(Self {
            pool,
            device: Arc::clone(device),
        }))
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Record `record` into a fresh command buffer, submit it and wait for
    /// the queue to drain.
    pub fn one_time_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let group = CommandBufferGroup::allocate(self, 1)?;
        let cmd = group.buffers[0];

        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .device
                .begin_command_buffer(cmd, &begin_info)
                .context("vkBeginCommandBuffer")?;
        }

        record(&self.device.device, cmd);

        unsafe {
            self.device
                .device
                .end_command_buffer(cmd)
                .context("vkEndCommandBuffer")?;
        }

        self.device.submit_and_wait(cmd)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Primary command buffers allocated together and freed together
pub struct CommandBufferGroup {
    pub buffers: Vec<vk::CommandBuffer>,
    pool: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl CommandBufferGroup {
    pub fn allocate(pool: &CommandPool, count: u32) -> Result<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { pool.device.device.allocate_command_buffers(&alloc_info) }
            .context("vkAllocateCommandBuffers")?;

        Ok(Self {
            buffers,
            pool: pool.pool,
            device: Arc::clone(&pool.device),
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for CommandBufferGroup {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe {
                self.device.device.free_command_buffers(self.pool, &self.buffers);
            }
        }
    }
}

/// Everything needed to open the render pass for one swapchain image
pub struct RenderPassRecording {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub pipeline: vk::Pipeline,
}

/// Record a complete command buffer: begin, clear + bind pipeline, let
/// `draw` emit the draw calls, end.
pub fn record_render_pass<F>(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    recording: &RenderPassRecording,
    draw: F,
) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let begin_info = vk::CommandBufferBeginInfo::builder();

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: recording.clear_color,
        },
    }];

    let render_pass_info = vk::RenderPassBeginInfo::builder()
        .render_pass(recording.render_pass)
        .framebuffer(recording.framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: recording.extent,
        })
        .clear_values(&clear_values);

    unsafe {
        device
            .begin_command_buffer(cmd, &begin_info)
            .context("vkBeginCommandBuffer")?;

        device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, recording.pipeline);

        draw(device, cmd);

        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).context("vkEndCommandBuffer")?;
    }

    Ok(())
}
