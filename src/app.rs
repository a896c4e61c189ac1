// =============================================================================
// APPLICATION - Window, input and event loop
// =============================================================================
//
// Every part runs through the same winit driver; what differs is the
// `Tutorial` it drives. Part 1 only brings up the device and swapchain,
// later parts use `Renderer<S>` with their own `Scene`.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::Config;

/// A program the runner can drive
pub trait Tutorial: Sized {
    fn init(config: &Config, window: Arc<Window>) -> Result<Self>;

    /// Draw one frame. Returns false when nothing was presented (minimised,
    /// swapchain out of date, nothing to draw).
    fn render_frame(&mut self) -> Result<bool>;

    fn resized(&mut self, width: u32, height: u32);

    fn wait_idle(&self) -> Result<()>;
}

/// Open the window described by `config` and run `T` until it closes
pub fn run<T: Tutorial>(config: Config) -> Result<()> {
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = Runner::<T>::new(config);
    event_loop.run_app(&mut runner)?;

    runner.finish()
}

/// Counts presented frames and reports the rate about once a second
#[derive(Debug)]
pub struct FrameCounter {
    frame_count: u32,
    last_report: Instant,
    last_frame: Instant,
}

/// One FPS sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub fps: f32,
    pub frame_time_ms: f32,
}

impl FrameCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_report: now,
            last_frame: now,
        }
    }

    /// Count a frame finished at `now`; returns stats once per second
    pub fn tick(&mut self, now: Instant) -> Option<FrameStats> {
        let frame_time = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_report);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let stats = FrameStats {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_time_ms: frame_time.as_secs_f32() * 1000.0,
        };
        self.frame_count = 0;
        self.last_report = now;

        Some(stats)
    }
}

/// winit driver for a `Tutorial`.
///
/// IMPORTANT: `tutorial` is declared before `window` so the Vulkan surface
/// is destroyed while the window still exists.
pub struct Runner<T: Tutorial> {
    tutorial: Option<T>,
    window: Option<Arc<Window>>,
    config: Config,
    quit_key: KeyCode,
    fullscreen_key: KeyCode,
    is_fullscreen: bool,
    frames: FrameCounter,
    error: Option<anyhow::Error>,
}

impl<T: Tutorial> Runner<T> {
    pub fn new(config: Config) -> Self {
        Self {
            tutorial: None,
            window: None,
            quit_key: config.controls.quit_key(),
            fullscreen_key: config.controls.fullscreen_key(),
            is_fullscreen: config.window.fullscreen,
            frames: FrameCounter::new(Instant::now()),
            error: None,
            config,
        }
    }

    /// The error that stopped the event loop, if any
    pub fn finish(mut self) -> Result<()> {
        self.tutorial = None;
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(ref tutorial) = self.tutorial {
            if let Err(e) = tutorial.wait_idle() {
                log::error!("{:#}", e);
            }
        }
        event_loop.exit();
    }

    fn toggle_fullscreen(&mut self) {
        let Some(ref window) = self.window else {
            return;
        };

        self.is_fullscreen = !self.is_fullscreen;
        if self.is_fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            log::info!("Entered fullscreen mode");
        } else {
            window.set_fullscreen(None);
            log::info!("Exited fullscreen mode");
        }

        let size = window.inner_size();
        if let Some(ref mut tutorial) = self.tutorial {
            tutorial.resized(size.width, size.height);
        }
    }

    fn update_title(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }
        let Some(stats) = self.frames.tick(Instant::now()) else {
            return;
        };

        if let Some(ref window) = self.window {
            let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
            window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms) [{}]",
                self.config.window.title, stats.fps, stats.frame_time_ms, mode
            ));
        }
    }
}

impl<T: Tutorial> ApplicationHandler for Runner<T> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::anyhow!("Failed to create window: {}", e));
                return;
            }
        };

        match T::init(&self.config, Arc::clone(&window)) {
            Ok(tutorial) => self.tutorial = Some(tutorial),
            Err(e) => {
                self.fail(event_loop, e.context("Failed to initialize Vulkan"));
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(ref mut tutorial) = self.tutorial {
                    tutorial.resized(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(ref mut tutorial) = self.tutorial else {
                    return;
                };
                match tutorial.render_frame() {
                    Ok(true) => self.update_title(),
                    Ok(false) => {}
                    Err(e) => self.fail(event_loop, e.context("Render error")),
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    if key == self.quit_key {
                        log::info!("{:?} pressed, exiting...", key);
                        self.shutdown(event_loop);
                    } else if key == self.fullscreen_key {
                        self.toggle_fullscreen();
                    }
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws for maximum FPS
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Vulkan objects go before the window they present to
        self.tutorial = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_stats_within_first_second() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);
        assert_eq!(counter.tick(start + Duration::from_millis(16)), None);
        assert_eq!(counter.tick(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn reports_rate_after_a_second() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);
        for i in 1..60 {
            assert!(counter.tick(start + Duration::from_millis(i * 16)).is_none());
        }

        let stats = counter
            .tick(start + Duration::from_secs(2))
            .expect("a second has passed");
        assert!((stats.fps - 30.0).abs() < 0.01);
        assert!(stats.frame_time_ms > 1000.0);
    }

    #[test]
    fn counter_restarts_after_report() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);
        assert!(counter.tick(start + Duration::from_secs(1)).is_some());
        assert!(counter.tick(start + Duration::from_millis(1500)).is_none());
    }
}
