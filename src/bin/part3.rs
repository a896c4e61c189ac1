// Part 3: vertex buffer
//
// The triangle now lives in a host-visible vertex buffer that the CPU
// writes directly.

use anyhow::Result;
use ash::vk;

use vulkan_learning::backend::{Buffer, PipelineDesc, ShaderModule, VertexInput};
use vulkan_learning::geometry::{Vertex, TRIANGLE};
use vulkan_learning::{logging, run, Config, Renderer, Scene, SceneContext};

struct VertexBufferTriangle {
    vertex_buffer: Buffer,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
}

impl Scene for VertexBufferTriangle {
    fn new(ctx: &SceneContext<'_>) -> Result<Self> {
        let assets = &ctx.config.assets;
        Ok(Self {
            vertex_buffer: Buffer::host_visible_with_data(
                ctx.device,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                &TRIANGLE,
            )?,
            vertex_shader: ShaderModule::from_file(ctx.device, assets.shader("vertex_color.vert"))?,
            fragment_shader: ShaderModule::from_file(ctx.device, assets.shader("color.frag"))?,
        })
    }

    fn pipeline_desc(&self) -> PipelineDesc<'_> {
        PipelineDesc::new(&self.vertex_shader, &self.fragment_shader)
            .vertex_input(VertexInput::of::<Vertex>())
    }

    fn draw(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        _image_index: usize,
        _layout: vk::PipelineLayout,
    ) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_draw(cmd, TRIANGLE.len() as u32, 1, 0, 0);
        }
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 3: vertex buffer");

    run::<Renderer<VertexBufferTriangle>>(config)
}
