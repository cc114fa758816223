//! Compute programs and the bind group layout both stages share.

use glam::UVec2;

use crate::error::ShaderError;
use crate::field::{stage_workgroups, ComputeStage};
use crate::shader::{validate, workgroup_size, ProgramCompiler, ShaderFile, ShaderLanguage};
use crate::textures::FieldTextureConfig;

/// Storage buffer holding the agents.
pub const AGENTS_BINDING: u32 = 0;
/// Field texture read by the stage.
pub const FIELD_IN_BINDING: u32 = 1;
/// Field texture written by the stage.
pub const FIELD_OUT_BINDING: u32 = 2;
/// [`SimParams`](super::context::SimParams) uniform.
pub const PARAMS_BINDING: u32 = 3;

/// A compiled compute stage.
#[derive(Debug)]
pub struct ComputeProgram {
    pub pipeline: wgpu::ComputePipeline,
    /// Hash of the source the pipeline was built from.
    pub fingerprint: u64,
    /// `@workgroup_size` declared by the program.
    pub workgroup_size: [u32; 3],
    /// Workgroups dispatched per frame, derived from `workgroup_size`.
    pub groups: (u32, u32),
}

/// Layout used by both compute stages.
///
/// A shader may leave bindings unused; the field stage never touches the
/// agent buffer.
pub fn create_compute_layout(device: &wgpu::Device) -> (wgpu::BindGroupLayout, wgpu::PipelineLayout) {
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Compute Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: AGENTS_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: FIELD_IN_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: FIELD_OUT_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: FieldTextureConfig::FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Compute Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    (bind_group_layout, pipeline_layout)
}

/// Builds compute pipelines for one stage on a device.
///
/// Sources are validated with naga first for readable diagnostics, and the
/// declared workgroup size must yield a dispatch the device accepts. The
/// module and pipeline are then created inside a validation error scope so
/// device errors come back as [`ShaderError::Pipeline`].
pub struct PipelineCompiler<'a> {
    pub device: &'a wgpu::Device,
    pub layout: &'a wgpu::PipelineLayout,
    pub stage: ComputeStage,
    pub agent_count: u32,
    pub field_size: UVec2,
}

impl ProgramCompiler for PipelineCompiler<'_> {
    type Program = ComputeProgram;

    fn compile(&self, file: &ShaderFile) -> Result<ComputeProgram, ShaderError> {
        let label = file.label();
        let parsed = validate(file)?;
        let declared = workgroup_size(&parsed).ok_or_else(|| ShaderError::Validation {
            label: label.clone(),
            message: "no compute entry point named `main`".to_string(),
        })?;
        let groups = stage_workgroups(self.stage, declared, self.agent_count, self.field_size)
            .map_err(|message| ShaderError::Validation {
                label: label.clone(),
                message,
            })?;

        let source = match file.language {
            ShaderLanguage::Wgsl => wgpu::ShaderSource::Wgsl(file.code.as_str().into()),
            ShaderLanguage::Glsl => wgpu::ShaderSource::Glsl {
                shader: file.code.as_str().into(),
                stage: naga::ShaderStage::Compute,
                defines: Default::default(),
            },
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source,
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&label),
            layout: Some(self.layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Pipeline {
                label,
                message: err.to_string(),
            });
        }

        Ok(ComputeProgram {
            pipeline,
            fingerprint: file.fingerprint(),
            workgroup_size: declared,
            groups,
        })
    }
}
