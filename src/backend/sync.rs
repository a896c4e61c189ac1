// Synchronization primitives
//
// Semaphores order GPU work (acquire -> render -> present), fences let the
// CPU wait for a frame slot to come back from the GPU.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
            device: Arc::clone(device),
        };

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the first wait on this slot returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            sync.image_available = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("vkCreateSemaphore")?;
            sync.render_finished = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("vkCreateSemaphore")?;
            sync.in_flight = device
                .device
                .create_fence(&fence_info, None)
                .context("vkCreateFence")?;
        }

        Ok(sync)
    }

    /// One sync slot per frame in flight
    pub fn for_frames(device: &Arc<VulkanDevice>, frames_in_flight: usize) -> Result<Vec<Self>> {
        (0..frames_in_flight).map(|_| Self::new(device)).collect()
    }

    /// Block until the GPU has finished the last submission using this slot
    pub fn wait(&self) -> Result<()> {
        wait_for_fence(&self.device.device, self.in_flight)
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.in_flight]) }.context("vkResetFences")
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            let device = &self.device.device;
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}

pub fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, u64::MAX) }.context("vkWaitForFences")
}

/// Tracks which frame slot's fence last rendered into each swapchain image.
///
/// With more swapchain images than frames in flight (or an out-of-order
/// acquire) an image can come back while an older frame is still drawing
/// into it; the caller must wait on the returned fence first.
#[derive(Debug, Clone, Default)]
pub struct ImagesInFlight {
    fences: Vec<vk::Fence>,
}

impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Mark `image_index` as owned by `fence`, returning the previous owner
    /// if there was one.
    pub fn claim(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let slot = self.fences.get_mut(image_index)?;
        let previous = std::mem::replace(slot, fence);
        (previous != vk::Fence::null()).then_some(previous)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Index of the frame slot after `current`
pub fn next_frame(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn frame_index_wraps() {
        assert_eq!(next_frame(0, 2), 1);
        assert_eq!(next_frame(1, 2), 0);
        assert_eq!(next_frame(0, 1), 0);
        assert_eq!(next_frame(3, 0), 0);
    }

    #[test]
    fn first_claim_has_no_previous_owner() {
        let mut images = ImagesInFlight::new(3);
        let fence = vk::Fence::from_raw(7);
        assert_eq!(images.claim(1, fence), None);
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn reclaim_returns_previous_fence() {
        let mut images = ImagesInFlight::new(2);
        let first = vk::Fence::from_raw(1);
        let second = vk::Fence::from_raw(2);

        images.claim(0, first);
        assert_eq!(images.claim(0, second), Some(first));
        assert_eq!(images.claim(0, second), Some(second));
    }

    #[test]
    fn out_of_range_image_is_ignored() {
        let mut images = ImagesInFlight::new(1);
        assert_eq!(images.claim(5, vk::Fence::from_raw(1)), None);
        assert!(!images.is_empty());
    }
}
