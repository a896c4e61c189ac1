// Part 6: texture mapping
//
// The spinning quad is sampled from a texture loaded from disk
// (`assets.texture`), or from a generated checkerboard if that fails.

use anyhow::Result;
use ash::vk;
use std::time::Instant;

use vulkan_learning::backend::{
    Buffer, DescriptorSetLayout, PipelineDesc, ShaderModule, TextureImage, VertexInput,
};
use vulkan_learning::geometry::{TexturedVertex, QUAD_INDICES, TEXTURED_QUAD};
use vulkan_learning::uniform::{self, UniformBindings, UniformBufferObject};
use vulkan_learning::{logging, run, Config, Renderer, Scene, SceneContext};

struct TexturedQuad {
    uniforms: UniformBindings,
    descriptor_layout: DescriptorSetLayout,
    texture: TextureImage,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    start: Instant,
}

impl Scene for TexturedQuad {
    fn new(ctx: &SceneContext<'_>) -> Result<Self> {
        let assets = &ctx.config.assets;
        let descriptor_layout = DescriptorSetLayout::new(ctx.device, &uniform::descriptor_bindings(true))?;
        let texture = TextureImage::from_file_or_checkerboard(ctx.command_pool, &assets.texture)?;

        Ok(Self {
            uniforms: UniformBindings::new(ctx.device, &descriptor_layout, ctx.image_count, Some(&texture))?,
            descriptor_layout,
            texture,
            vertex_buffer: Buffer::device_local_with_data(
                ctx.command_pool,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                &TEXTURED_QUAD,
            )?,
            index_buffer: Buffer::device_local_with_data(
                ctx.command_pool,
                vk::BufferUsageFlags::INDEX_BUFFER,
                &QUAD_INDICES,
            )?,
            vertex_shader: ShaderModule::from_file(ctx.device, assets.shader("textured.vert"))?,
            fragment_shader: ShaderModule::from_file(ctx.device, assets.shader("textured.frag"))?,
            start: Instant::now(),
        })
    }

    fn pipeline_desc(&self) -> PipelineDesc<'_> {
        PipelineDesc::new(&self.vertex_shader, &self.fragment_shader)
            .vertex_input(VertexInput::of::<TexturedVertex>())
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
        self.uniforms = UniformBindings::new(
            ctx.device,
            &self.descriptor_layout,
            ctx.image_count,
            Some(&self.texture),
        )?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 6: texture mapping");

    run::<Renderer<TexturedQuad>>(config)
}
