// Part 2: the first triangle
//
// Vertices come from the vertex shader itself (gl_VertexIndex), so the
// pipeline has no vertex input at all.

use anyhow::Result;
use ash::vk;

use vulkan_learning::backend::{PipelineDesc, ShaderModule};
use vulkan_learning::{logging, run, Config, Renderer, Scene, SceneContext};

struct HardcodedTriangle {
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
}

impl Scene for HardcodedTriangle {
    fn new(ctx: &SceneContext<'_>) -> Result<Self> {
        let assets = &ctx.config.assets;
        Ok(Self {
            vertex_shader: ShaderModule::from_file(ctx.device, assets.shader("triangle.vert"))?,
            fragment_shader: ShaderModule::from_file(ctx.device, assets.shader("color.frag"))?,
        })
    }

    fn pipeline_desc(&self) -> PipelineDesc<'_> {
        PipelineDesc::new(&self.vertex_shader, &self.fragment_shader)
    }

    fn draw(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        _image_index: usize,
        _layout: vk::PipelineLayout,
    ) {
        unsafe {
            device.cmd_draw(cmd, 3, 1, 0, 0);
        }
    }
}

fn main() -> Result<()> {
    let (config, load_error) = Config::load();
    logging::init(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Part 2: hard-coded triangle");

    run::<Renderer<HardcodedTriangle>>(config)
}
