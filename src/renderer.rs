// =============================================================================
// RENDERER - Frame loop and swapchain reload
// =============================================================================
//
// FRAME FLOW:
// 1. Wait for the fence of the current frame slot
// 2. Acquire a swapchain image (signals image_available)
// 3. Wait for any older frame still rendering into that image
// 4. Let the scene update per-image data (uniform buffers)
// 5. Submit the pre-recorded command buffer (waits image_available,
//    signals render_finished and the slot fence)
// 6. Present (waits render_finished), advance to the next slot
//
// RELOAD (resize, out-of-date or suboptimal swapchain):
//   wait idle -> drop SwapchainTargets -> new swapchain -> render pass ->
//   pipeline -> framebuffers -> command buffers -> re-record
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::HasRawDisplayHandle;
use std::sync::Arc;
use winit::window::Window;

use crate::app::Tutorial;
use crate::backend::command::{record_render_pass, RenderPassRecording};
use crate::backend::sync::{self, ImagesInFlight};
use crate::backend::{
    Acquired, CommandBufferGroup, CommandPool, FrameSync, FramebufferGroup, GraphicsPipeline,
    PipelineDesc, RenderPass, Surface, Swapchain, VulkanDevice, VulkanInstance,
};
use crate::config::Config;

/// What a scene gets to build its resources with
pub struct SceneContext<'a> {
    pub device: &'a Arc<VulkanDevice>,
    pub command_pool: &'a CommandPool,
    pub config: &'a Config,
    pub image_count: usize,
}

/// The part-specific content: shaders, buffers, descriptors and draw calls
pub trait Scene: Sized {
    fn new(ctx: &SceneContext<'_>) -> Result<Self>;

    fn pipeline_desc(&self) -> PipelineDesc<'_>;

    /// Record draw commands for swapchain image `image_index`. The pipeline
    /// is already bound.
    fn draw(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_index: usize,
        layout: vk::PipelineLayout,
    );

    /// Called each frame once `image_index` is free to be written
    fn update(&mut self, _image_index: usize, _extent: vk::Extent2D) -> Result<()> {
        Ok(())
    }

    /// Called on reload when the number of swapchain images changed
    fn rebuild(&mut self, _ctx: &SceneContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Instance, surface and device for `window`
pub fn create_device(config: &Config, window: &Window) -> Result<Arc<VulkanDevice>> {
    let instance = VulkanInstance::new(
        &config.window.title,
        window.raw_display_handle(),
        config.debug.validation_layers,
    )?;
    let surface = Surface::new(instance, window)?;

    VulkanDevice::new(
        surface,
        vk::QueueFlags::GRAPHICS,
        &[ash::extensions::khr::Swapchain::name()],
    )
}

pub fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

/// Resize bookkeeping: when the swapchain must be rebuilt and when frames
/// are skipped because the window has no area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadState {
    needs_reload: bool,
    minimized: bool,
}

impl ReloadState {
    pub fn resized(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.minimized = true;
        } else {
            self.minimized = false;
            self.needs_reload = true;
        }
    }

    /// The swapchain is out of date or suboptimal
    pub fn mark_stale(&mut self) {
        self.needs_reload = true;
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    /// Whether a pending reload can go ahead at `extent`. A zero-sized
    /// extent leaves the reload pending and marks the window minimised.
    pub fn begin_reload(&mut self, extent: vk::Extent2D) -> bool {
        self.minimized = extent.width == 0 || extent.height == 0;
        !self.minimized
    }

    pub fn reloaded(&mut self) {
        self.needs_reload = false;
    }

    pub fn should_draw(&self) -> bool {
        !self.minimized && !self.needs_reload
    }
}

/// Everything that depends on the swapchain.
///
/// IMPORTANT: Field order matters for Drop! Command buffers go first, the
/// swapchain (and its image views) last.
struct SwapchainTargets {
    command_buffers: CommandBufferGroup,
    framebuffers: FramebufferGroup,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SwapchainTargets {
    fn new(
        device: &Arc<VulkanDevice>,
        command_pool: &CommandPool,
        swapchain: Swapchain,
        desc: &PipelineDesc<'_>,
    ) -> Result<Self> {
        let render_pass = RenderPass::new(device, swapchain.format)?;
        let pipeline = GraphicsPipeline::new(device, render_pass.render_pass, swapchain.extent, desc)?;
        let framebuffers = FramebufferGroup::new(
            device,
            render_pass.render_pass,
            swapchain.extent,
            &swapchain.image_views,
        )?;
        let command_buffers = CommandBufferGroup::allocate(command_pool, framebuffers.len() as u32)?;

        Ok(Self {
            command_buffers,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
        })
    }

    /// Record one command buffer per swapchain image
    fn record<S: Scene>(&self, device: &ash::Device, scene: &S, clear_color: [f32; 4]) -> Result<()> {
        for (image_index, (&cmd, &framebuffer)) in self
            .command_buffers
            .buffers
            .iter()
            .zip(&self.framebuffers.framebuffers)
            .enumerate()
        {
            let recording = RenderPassRecording {
                render_pass: self.render_pass.render_pass,
                framebuffer,
                extent: self.swapchain.extent,
                clear_color,
                pipeline: self.pipeline.pipeline,
            };

            record_render_pass(device, cmd, &recording, |device, cmd| {
                scene.draw(device, cmd, image_index, self.pipeline.layout)
            })
            .with_context(|| format!("Recording command buffer {}", image_index))?;
        }
        Ok(())
    }
}

/// Draws a `Scene` into the window every frame.
///
/// IMPORTANT: Field order matters for Drop! Swapchain targets and the scene
/// go before the sync objects, the command pool and finally the device.
pub struct Renderer<S: Scene> {
    targets: Option<SwapchainTargets>,
    scene: S,
    frame_sync: Vec<FrameSync>,
    images_in_flight: ImagesInFlight,
    command_pool: Arc<CommandPool>,
    device: Arc<VulkanDevice>,
    window: Arc<Window>,
    config: Config,

    current_frame: usize,
    reload_state: ReloadState,
}

impl<S: Scene> Renderer<S> {
    pub fn new(config: &Config, window: Arc<Window>) -> Result<Self> {
        let device = create_device(config, &window)?;
        let command_pool = CommandPool::new(&device, vk::CommandPoolCreateFlags::empty())?;

        let swapchain = Swapchain::new(Arc::clone(&device), window_extent(&window), config.present_mode())?;
        let image_count = swapchain.image_count();

        let scene = S::new(&SceneContext {
            device: &device,
            command_pool: &command_pool,
            config,
            image_count,
        })?;

        let targets = SwapchainTargets::new(&device, &command_pool, swapchain, &scene.pipeline_desc())?;
        targets.record(&device.device, &scene, config.graphics.clear_color)?;

        let frame_sync = FrameSync::for_frames(&device, config.frames_in_flight())?;
        log::info!("{} frames in flight, {} swapchain images", frame_sync.len(), image_count);

        Ok(Self {
            targets: Some(targets),
            scene,
            frame_sync,
            images_in_flight: ImagesInFlight::new(image_count),
            command_pool,
            device,
            window,
            config: config.clone(),
            current_frame: 0,
            reload_state: ReloadState::default(),
        })
    }

    /// Tear down and rebuild everything that depends on the swapchain
    fn reload(&mut self) -> Result<()> {
        let extent = window_extent(&self.window);
        if !self.reload_state.begin_reload(extent) {
            return Ok(());
        }

        log::info!("Reloading swapchain for {}x{}", extent.width, extent.height);

        self.device.wait_idle()?;

        let old_image_count = self.targets.as_ref().map(|t| t.swapchain.image_count());
        self.targets = None;

        let swapchain = Swapchain::new(Arc::clone(&self.device), extent, self.config.present_mode())?;
        let image_count = swapchain.image_count();

        if old_image_count != Some(image_count) {
            log::info!("Swapchain image count changed to {}", image_count);
            self.scene.rebuild(&SceneContext {
                device: &self.device,
                command_pool: &self.command_pool,
                config: &self.config,
                image_count,
            })?;
        }

        let targets = SwapchainTargets::new(
            &self.device,
            &self.command_pool,
            swapchain,
            &self.scene.pipeline_desc(),
        )?;
        targets.record(&self.device.device, &self.scene, self.config.graphics.clear_color)?;

        self.targets = Some(targets);
        self.images_in_flight = ImagesInFlight::new(image_count);
        self.reload_state.reloaded();

        Ok(())
    }

    fn draw_frame(&mut self) -> Result<bool> {
        let Some(targets) = self.targets.as_ref() else {
            return Ok(false);
        };
        let sync = &self.frame_sync[self.current_frame];

        sync.wait()?;

        let image_index = match targets.swapchain.acquire_next_image(sync.image_available)? {
            Acquired::Image { index, suboptimal } => {
                // Still usable (the semaphore will signal), rebuild afterwards
                if suboptimal {
                    self.reload_state.mark_stale();
                }
                index
            }
            Acquired::OutOfDate => {
                self.reload_state.mark_stale();
                return Ok(false);
            }
        };

        if let Some(previous) = self.images_in_flight.claim(image_index as usize, sync.in_flight) {
            sync::wait_for_fence(&self.device.device, previous)?;
        }

        self.scene.update(image_index as usize, targets.swapchain.extent)?;

        sync.reset()?;
        self.device.submit_frame(
            targets.command_buffers.buffers[image_index as usize],
            sync.image_available,
            sync.render_finished,
            sync.in_flight,
        )?;

        if targets
            .swapchain
            .present(self.device.graphics_queue, image_index, sync.render_finished)?
        {
            self.reload_state.mark_stale();
        }

        self.current_frame = sync::next_frame(self.current_frame, self.frame_sync.len());

        Ok(true)
    }
}

impl<S: Scene> Tutorial for Renderer<S> {
    fn init(config: &Config, window: Arc<Window>) -> Result<Self> {
        Self::new(config, window)
    }

    fn render_frame(&mut self) -> Result<bool> {
        if self.reload_state.needs_reload() {
            self.reload()?;
        }
        if !self.reload_state.should_draw() {
            return Ok(false);
        }
        self.draw_frame()
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.reload_state.resized(width, height);
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl<S: Scene> Drop for Renderer<S> {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        if let Err(e) = self.device.wait_idle() {
            log::error!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn fresh_state_draws() {
        let state = ReloadState::default();
        assert!(!state.needs_reload());
        assert!(state.should_draw());
    }

    #[test]
    fn minimise_skips_frames_without_reload() {
        let mut state = ReloadState::default();
        state.resized(0, 0);
        assert!(!state.needs_reload());
        assert!(!state.should_draw());

        state.resized(800, 0);
        assert!(!state.needs_reload());
        assert!(!state.should_draw());
    }

    #[test]
    fn restore_triggers_reload() {
        let mut state = ReloadState::default();
        state.resized(0, 0);
        state.resized(800, 600);
        assert!(state.needs_reload());
        assert!(!state.should_draw());

        assert!(state.begin_reload(extent(800, 600)));
        state.reloaded();
        assert!(state.should_draw());
    }

    #[test]
    fn reload_waits_while_window_has_no_area() {
        let mut state = ReloadState::default();
        state.resized(1024, 768);
        state.resized(0, 0);
        assert!(state.needs_reload());

        assert!(!state.begin_reload(extent(0, 0)));
        assert!(state.needs_reload());
        assert!(!state.should_draw());

        state.resized(640, 480);
        assert!(state.begin_reload(extent(640, 480)));
        state.reloaded();
        assert!(state.should_draw());
    }

    #[test]
    fn stale_swapchain_needs_reload() {
        let mut state = ReloadState::default();
        state.mark_stale();
        assert!(state.needs_reload());
        assert!(!state.should_draw());
    }
}
