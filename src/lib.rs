// =============================================================================
// VULKAN LEARNING - Progressive Vulkan tutorial series
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  app::Runner (winit event loop, input, FPS title)               │
// │    └── Tutorial (part1) / renderer::Renderer<Scene> (part2..6)  │
// │          └── backend: instance, surface, device, swapchain      │
// │                └── render pass, pipeline, framebuffers          │
// │                      └── command buffers + frame sync           │
// └─────────────────────────────────────────────────────────────────┘
//
// Each binary in src/bin/ is one part of the series and adds one concept
// on top of the previous one.
//
// =============================================================================

pub mod app;
pub mod backend;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod renderer;
pub mod uniform;

pub use app::{run, Tutorial};
pub use config::Config;
pub use renderer::{Renderer, Scene, SceneContext};
