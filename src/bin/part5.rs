// Part 5: uniform buffers
//
// A model/view/projection UBO per swapchain image, bound through a
// descriptor set and rewritten every frame to spin the quad.

use anyhow::Result;
use ash::vk;
use std::time::Instant;

use vulkan_learning::backend::{
    Buffer, DescriptorSetLayout, PipelineDesc, ShaderModule, VertexInput,
};
use vulkan_learning::geometry::{Vertex, QUAD_INDICES, QUAD_VERTICES};
use vulkan_learning::uniform::{self, UniformBindings, UniformBufferObject};
use vulkan_learning::{logging, run, Config, Renderer, Scene, SceneContext};

struct SpinningQuad {
    uniforms: UniformBindings,
    descriptor_layout: DescriptorSetLayout,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    start: Instant,
}

impl Scene for SpinningQuad {
    fn new(ctx: &SceneContext<'_>) -> Result<Self> {
        let assets = &ctx.config.assets;
        let descriptor_layout = DescriptorSetLayout::new(ctx.device, &uniform::descriptor_bindings(false))?;

        Ok(Self {
            uniforms: UniformBindings::new(ctx.device, &descriptor_layout, ctx.image_count, None)?,
            descriptor_layout,
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
            vertex_shader: ShaderModule::from_file(ctx.device, assets.shader("uniform.vert"))?,
            fragment_shader: ShaderModule::from_file(ctx.device, assets.shader("color.frag"))?,
            start: Instant::now(),
        })
    }

    fn pipeline_desc(&self) -> PipelineDesc<'_> {
        // The Y flip in the projection reverses the winding
        PipelineDesc::new(&self.vertex_shader, &self.fragment_shader)
            .vertex_input(VertexInput::of::<Vertex>())
            .descriptor_set_layout(self.descriptor_layout.layout)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
    }

    fn draw(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_index: usize,
        layout: vk::PipelineLayout,
    ) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[self.uniforms.descriptor_set(image_index)],
                &[],
            );
            device.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);
        }
    }

    fn update(&mut self, image_index: usize, extent: vk::Extent2D) -> Result<()> {
        let ubo = UniformBufferObject::spinning(self.start.elapsed().as_secs_f32(), extent);
        self.uniforms.write(image_index, &ubo)
    }

    fn rebuild(&mut self, ctx: &SceneContext<'_>) -> Result<()> {
        self.uniforms = UniformBindings::new(ctx.device, &self.descriptor_layout, ctx.image_count, None)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 5: uniform buffers");

    run::<Renderer<SpinningQuad>>(config)
}
