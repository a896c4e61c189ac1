// Part 4: staging buffers and index buffers
//
// Vertex and index data are copied through a staging buffer into
// device-local memory; the quad is drawn with 6 indices over 4 vertices.

use anyhow::Result;
use ash::vk;

use vulkan_learning::backend::{Buffer, PipelineDesc, ShaderModule, VertexInput};
use vulkan_learning::geometry::{Vertex, QUAD_INDICES, QUAD_VERTICES};
use vulkan_learning::{logging, run, Config, Renderer, Scene, SceneContext};

struct IndexedQuad {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
}

impl Scene for IndexedQuad {
    fn new(ctx: &SceneContext<'_>) -> Result<Self> {
        let assets = &ctx.config.assets;
        Ok(Self {
            vertex_buffer: Buffer::device_local_with_data(
                ctx.command_pool,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                &QUAD_VERTICES,
            )?,
            index_buffer: Buffer::device_local_with_data(
                ctx.command_pool,
                vk::BufferUsageFlags::INDEX_BUFFER,
                &QUAD_INDICES,
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
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
            device.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);
        }
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 4: staging and index buffers");

    run::<Renderer<IndexedQuad>>(config)
}
