// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. build.rs compiles the GLSL sources with
// glslc; the parts load the resulting .spv files at runtime.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use super::VulkanDevice;

pub struct ShaderModule {
    pub module: vk::ShaderModule,
    device: Arc<VulkanDevice>,
}

impl ShaderModule {
    /// Load a compiled `.spv` file
    pub fn from_file(device: &Arc<VulkanDevice>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| {
            format!(
                "Unable to open shader {:?} (compile the GLSL sources in shaders/ with glslc)",
                path
            )
        })?;

        Self::from_bytes(device, &bytes).with_context(|| format!("Invalid shader {:?}", path))
    }

    /// Create a shader module from SPIR-V bytes
    pub fn from_bytes(device: &Arc<VulkanDevice>, bytes: &[u8]) -> Result<Self> {
        let code = parse_spirv(bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("vkCreateShaderModule")?;

        Ok(Self {
            module,
            device: Arc::clone(device),
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Re-align SPIR-V bytes into words, checking size and magic number
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    // read_spv copies into u32 words, so unaligned input is fine
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).context("Malformed SPIR-V")?;

    if words.is_empty() {
        anyhow::bail!("Empty SPIR-V module");
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn parses_aligned_words() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());

        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn rejects_truncated_input() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = 0xdead_beefu32.to_le_bytes();
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_spirv(&[]).is_err());
    }
}
