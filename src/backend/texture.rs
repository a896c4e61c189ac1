// Texture images
//
// Pixels are decoded on the CPU (image crate), copied into a staging
// buffer, transitioned UNDEFINED -> TRANSFER_DST -> SHADER_READ_ONLY around
// a buffer-to-image copy, and exposed through an image view + sampler.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;

use super::buffer::Buffer;
use super::command::CommandPool;
use super::VulkanDevice;

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Decoded RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaPixels {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaPixels {
    pub fn byte_size(&self) -> vk::DeviceSize {
        u64::from(self.width) * u64::from(self.height) * 4
    }
}

/// Decode an image file into RGBA8
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaPixels> {
    let path = path.as_ref();
    let image = image::open(path)
        .with_context(|| format!("Unable to load image: {:?}", path))?
        .to_rgba8();
    let (width, height) = image.dimensions();

    Ok(RgbaPixels {
        width,
        height,
        pixels: image.into_raw(),
    })
}

/// Black/white checkerboard with `cell`-pixel squares
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbaPixels {
    let cell = cell.max(1);
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([40, 40, 40, 255])
        }
    });

    RgbaPixels {
        width,
        height,
        pixels: image.into_raw(),
    }
}

/// Access masks and pipeline stages for a layout transition barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> Result<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        _ => anyhow::bail!("Unsupported layout transition {:?} -> {:?}", old, new),
    }
}

pub struct TextureImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

impl TextureImage {
    /// Load `path`, falling back to a checkerboard if it can't be read
    pub fn from_file_or_checkerboard(pool: &CommandPool, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pixels = match load_rgba(path) {
            Ok(pixels) => {
                log::info!("Loaded texture {:?} ({}x{})", path, pixels.width, pixels.height);
                pixels
            }
            Err(e) => {
                log::warn!("{:#}; using a generated checkerboard instead", e);
                checkerboard(256, 256, 32)
            }
        };

        Self::from_rgba(pool, &pixels)
    }

    pub fn from_rgba(pool: &CommandPool, pixels: &RgbaPixels) -> Result<Self> {
        let device = pool.device();

        if pixels.width == 0 || pixels.height == 0 {
            anyhow::bail!("Texture has no pixels ({}x{})", pixels.width, pixels.height);
        }
        if pixels.pixels.len() as vk::DeviceSize != pixels.byte_size() {
            anyhow::bail!(
                "Texture data is {} bytes, expected {}",
                pixels.pixels.len(),
                pixels.byte_size()
            );
        }

        let staging =
            Buffer::host_visible_with_data(device, vk::BufferUsageFlags::TRANSFER_SRC, &pixels.pixels)?;

        let extent = vk::Extent2D {
            width: pixels.width,
            height: pixels.height,
        };

        // Handles start null so Drop can clean up a partial build
        let mut texture = Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent,
            device: Arc::clone(device),
        };

        texture.create_image()?;

        let image = texture.image;
        let before_copy = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        let after_copy = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        pool.one_time_submit(|device, cmd| unsafe {
            record_transition(
                device,
                cmd,
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                before_copy,
            );

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .build();

            device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            record_transition(
                device,
                cmd,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                after_copy,
            );
        })?;

        texture.create_view()?;
        texture.create_sampler()?;

        Ok(texture)
    }

    fn create_image(&mut self) -> Result<()> {
        let device = &self.device.device;

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(TEXTURE_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        self.image = unsafe { device.create_image(&image_info, None) }.context("vkCreateImage")?;

        let requirements = unsafe { device.get_image_memory_requirements(self.image) };
        let memory_type_index = self
            .device
            .find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        self.memory = unsafe { device.allocate_memory(&alloc_info, None) }.context("vkAllocateMemory")?;

        unsafe { device.bind_image_memory(self.image, self.memory, 0) }.context("vkBindImageMemory")
    }

    fn create_view(&mut self) -> Result<()> {
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .subresource_range(color_subresource_range());

        self.view = unsafe { self.device.device.create_image_view(&view_info, None) }
            .context("vkCreateImageView")?;
        Ok(())
    }

    fn create_sampler(&mut self) -> Result<()> {
        let anisotropy = self.device.sampler_anisotropy;
        let max_anisotropy = if anisotropy {
            self.device.properties.limits.max_sampler_anisotropy
        } else {
            1.0
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        self.sampler = unsafe { self.device.device.create_sampler(&sampler_info, None) }
            .context("vkCreateSampler")?;
        Ok(())
    }
}

impl Drop for TextureImage {
    fn drop(&mut self) {
        // Destroying null handles is a no-op
        unsafe {
            let device = &self.device.device;
            device.destroy_sampler(self.sampler, None);
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

unsafe fn record_transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    masks: TransitionMasks,
) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .build();

    device.cmd_pipeline_barrier(
        cmd,
        masks.src_stage,
        masks.dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_cells() {
        let board = checkerboard(4, 2, 2);
        assert_eq!(board.pixels.len() as u64, board.byte_size());

        let pixel = |x: usize, y: usize| {
            let i = (y * 4 + x) * 4;
            board.pixels[i]
        };
        assert_eq!(pixel(0, 0), 255);
        assert_eq!(pixel(1, 1), 255);
        assert_eq!(pixel(2, 0), 40);
        assert_eq!(pixel(3, 1), 40);
        assert!(board.pixels.chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn checkerboard_tolerates_zero_cell() {
        let board = checkerboard(2, 2, 0);
        assert_eq!(board.pixels.len(), 16);
    }

    #[test]
    fn upload_transition_masks() {
        let masks = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn sampling_transition_masks() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transition_is_an_error() {
        assert!(transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR
        )
        .is_err());
    }

    #[test]
    fn missing_image_file_is_an_error() {
        assert!(load_rgba("no/such/texture.png").is_err());
    }
}
