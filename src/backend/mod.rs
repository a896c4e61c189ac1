// Backend module - Vulkan abstraction layer
//
// One RAII wrapper per Vulkan object: create with a fixed parameter set,
// keep the handle, destroy it on Drop. Every wrapper holds an
// Arc<VulkanDevice>, and the device holds the surface and instance, so
// parents always outlive their children.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::Buffer;
pub use command::{CommandBufferGroup, CommandPool};
pub use descriptor::{DescriptorBinding, DescriptorPool, DescriptorSetGroup, DescriptorSetLayout};
pub use device::VulkanDevice;
pub use framebuffer::FramebufferGroup;
pub use instance::VulkanInstance;
pub use pipeline::{GraphicsPipeline, PipelineDesc, VertexInput, VertexLayout};
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use surface::Surface;
pub use swapchain::{Acquired, Swapchain};
pub use sync::FrameSync;
pub use texture::TextureImage;
