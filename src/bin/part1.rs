// Part 1: window, instance, device and swapchain
//
// Nothing is drawn yet. The swapchain is created to prove the device can
// present to the window and is rebuilt when the window changes size.

use anyhow::Result;
use ash::vk;
use std::sync::Arc;
use winit::window::Window;

use vulkan_learning::backend::{Swapchain, VulkanDevice};
use vulkan_learning::renderer::{create_device, window_extent, ReloadState};
use vulkan_learning::{logging, run, Config, Tutorial};

struct SwapchainOnly {
    swapchain: Option<Swapchain>,
    device: Arc<VulkanDevice>,
    window: Arc<Window>,
    present_mode: vk::PresentModeKHR,
    reload_state: ReloadState,
}

impl SwapchainOnly {
    fn recreate(&mut self) -> Result<()> {
        let extent = window_extent(&self.window);
        if !self.reload_state.begin_reload(extent) {
            return Ok(());
        }

        self.device.wait_idle()?;
        self.swapchain = None;
        self.swapchain = Some(Swapchain::new(
            Arc::clone(&self.device),
            extent,
            self.present_mode,
        )?);
        self.reload_state.reloaded();
        Ok(())
    }
}

impl Tutorial for SwapchainOnly {
    fn init(config: &Config, window: Arc<Window>) -> Result<Self> {
        let device = create_device(config, &window)?;
        device.surface().instance().log_extensions()?;

        let present_mode = config.present_mode();
        let swapchain = Swapchain::new(Arc::clone(&device), window_extent(&window), present_mode)?;
        log::info!(
            "Swapchain ready: {} images, {:?}",
            swapchain.image_count(),
            swapchain.present_mode
        );

        Ok(Self {
            swapchain: Some(swapchain),
            device,
            window,
            present_mode,
            reload_state: ReloadState::default(),
        })
    }

    fn render_frame(&mut self) -> Result<bool> {
        if self.reload_state.needs_reload() {
            self.recreate()?;
        }
        Ok(false)
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.reload_state.resized(width, height);
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 1: window, instance, device and swapchain");

    run::<SwapchainOnly>(config)
}
