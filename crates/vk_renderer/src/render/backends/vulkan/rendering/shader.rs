//! Shader management and compilation
//!
//! SPIR-V shader loading and graphics pipeline management following RAII patterns.
//! The fixed-function state of the triangle pipeline is exposed as plain
//! functions so it can be checked without a device.

use ash::{vk, Device};
use std::ffi::CStr;
use std::io::{self, Cursor};
use std::path::Path;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const SHADER_ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Dynamic state set per frame
pub const DYNAMIC_STATES: [vk::DynamicState; 2] = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device.create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let words = read_shader_words(path.as_ref())?;
        Self::from_words(device, &words)
    }

    /// Create shader stage create info
    pub fn create_stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Read a SPIR-V file fully into memory and decode it
pub fn read_shader_words(path: &Path) -> VulkanResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| VulkanError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let words = decode_spirv(&bytes).map_err(|source| VulkanError::InvalidShaderCode {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Decode a SPIR-V byte buffer into words
///
/// Rejects buffers whose length is not a multiple of four, empty buffers and
/// buffers that do not start with the SPIR-V magic number in either byte order.
pub fn decode_spirv(bytes: &[u8]) -> io::Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad SPIR-V magic number {other:#010x}"),
        )),
        None => Err(io::Error::new(io::ErrorKind::InvalidData, "empty SPIR-V module")),
    }
}

/// Triangle list, no primitive restart
pub fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo {
    vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
        .build()
}

/// Filled polygons, back-face culling, clockwise front faces
pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

/// Single sample
pub fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo {
    vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .build()
}

/// Write all channels, blending disabled
pub fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build()
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create the triangle pipeline from already loaded shader modules
    ///
    /// Viewport and scissor are dynamic, so the pipeline does not depend on
    /// the swapchain extent.
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
    ) -> VulkanResult<Self> {
        let shader_stages = [
            vertex_shader.create_stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.create_stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        // Vertices come from gl_VertexIndex
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly = input_assembly_state();

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&DYNAMIC_STATES);

        let rasterizer = rasterization_state();
        let multisampling = multisample_state();

        let color_blend_attachments = [color_blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe {
            device.create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };

        let pipeline = match created {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(err));
            }
        };

        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InitializationFailed("No graphics pipeline returned".to_string()));
        };

        Ok(Self { device, pipeline, layout })
    }

    /// Load both shaders from disk and build the pipeline
    ///
    /// The shader modules are dropped as soon as the pipeline exists.
    pub fn from_shader_files(
        device: Device,
        render_pass: vk::RenderPass,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> VulkanResult<Self> {
        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;
        let pipeline = Self::new(device, render_pass, &vertex_shader, &fragment_shader)?;
        log::info!("Graphics pipeline created");
        Ok(pipeline)
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spirv_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_spirv_accepts_magic() {
        let words = decode_spirv(&spirv_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0])).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_decode_spirv_accepts_swapped_endianness() {
        let words = [SPIRV_MAGIC.swap_bytes(), 0x0001_0000u32.swap_bytes()];
        let decoded = decode_spirv(&spirv_bytes(&words)).unwrap();
        assert_eq!(decoded[0], SPIRV_MAGIC);
        assert_eq!(decoded[1], 0x0001_0000);
    }

    #[test]
    fn test_decode_spirv_rejects_unaligned_length() {
        let mut bytes = spirv_bytes(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(decode_spirv(&bytes).is_err());
    }

    #[test]
    fn test_decode_spirv_rejects_empty_and_garbage() {
        assert!(decode_spirv(&[]).is_err());
        assert!(decode_spirv(b"not spirv!!!").is_err());
    }

    fn temp_shader_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vk_renderer_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_missing_shader_file_is_load_error() {
        let path = temp_shader_path("missing.spv");
        match read_shader_words(&path) {
            Err(VulkanError::ShaderLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected ShaderLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_shader_file_is_invalid_code() {
        let path = temp_shader_path("truncated.spv");
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0x00]).unwrap();
        let result = read_shader_words(&path);
        let _ = std::fs::remove_file(&path);

        match result {
            Err(VulkanError::InvalidShaderCode { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected InvalidShaderCode, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_shader_file_reads_words() {
        let path = temp_shader_path("valid.spv");
        std::fs::write(&path, spirv_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0])).unwrap();
        let result = read_shader_words(&path);
        let _ = std::fs::remove_file(&path);

        assert_eq!(result.unwrap().len(), 5);
    }

    #[test]
    fn test_input_assembly_is_triangle_list() {
        let state = input_assembly_state();
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.primitive_restart_enable, vk::FALSE);
    }

    #[test]
    fn test_rasterization_state() {
        let state = rasterization_state();
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_relative_eq!(state.line_width, 1.0);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(state.depth_bias_enable, vk::FALSE);
        assert_eq!(state.depth_clamp_enable, vk::FALSE);
        assert_eq!(state.rasterizer_discard_enable, vk::FALSE);
    }

    #[test]
    fn test_multisample_single_sample() {
        let state = multisample_state();
        assert_eq!(state.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(state.sample_shading_enable, vk::FALSE);
    }

    #[test]
    fn test_color_blend_writes_rgba_without_blending() {
        let attachment = color_blend_attachment();
        assert_eq!(attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
        assert_eq!(attachment.blend_enable, vk::FALSE);
    }

    #[test]
    fn test_viewport_and_scissor_are_dynamic() {
        assert_eq!(DYNAMIC_STATES.len(), 2);
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::VIEWPORT));
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::SCISSOR));
    }
}
