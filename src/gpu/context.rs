//! All simulation state that lives on the GPU.
//!
//! [`SimulationContext`] is owned by whoever drives frames (the windowed
//! [`GpuState`](super::GpuState) or a headless test) and handed by reference
//! to the stage functions in [`pipeline`](super::pipeline).

use bytemuck::{Pod, Zeroable};
use glam::UVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::mpsc::channel;
use wgpu::util::DeviceExt;

use super::field_gpu::FieldTextures;
use super::programs::{
    create_compute_layout, ComputeProgram, PipelineCompiler, AGENTS_BINDING, FIELD_IN_BINDING,
    FIELD_OUT_BINDING, PARAMS_BINDING,
};
use crate::agent::{spawn_agents, Agent};
use crate::error::{GpuError, SimulationError};
use crate::field::ComputeStage;
use crate::shader::ShaderSlot;
use crate::simulation::SimConfig;
use crate::textures::FieldTextureConfig;
use crate::watch::{watch_file, ChangeSource};

/// Uniform block bound to both compute stages.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub frame: u32,
    pub agent_count: u32,
    pub width: u32,
    pub height: u32,
}

pub struct SimulationContext {
    pub agent_buffer: wgpu::Buffer,
    pub agent_count: u32,
    pub params_buffer: wgpu::Buffer,
    pub field: FieldTextures,
    /// Compute bind groups, indexed by the slot currently written.
    pub compute_bind_groups: [wgpu::BindGroup; 2],
    compute_layout: wgpu::PipelineLayout,
    pub agent_program: ShaderSlot<ComputeProgram>,
    pub field_program: ShaderSlot<ComputeProgram>,
    watches: Vec<(Box<dyn ChangeSource>, ComputeStage)>,
    /// Frame counter passed to the agent stage. Wraps at `u32::MAX`.
    pub frame: u32,
    pub size: UVec2,
}

impl SimulationContext {
    /// Compile both stages, then allocate and upload all resources.
    ///
    /// A shader that fails to compile here aborts startup.
    pub fn new(device: &wgpu::Device, config: &SimConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let (bind_group_layout, compute_layout) = create_compute_layout(device);

        let compiler_for = |stage| {
            stage_compiler(device, &compute_layout, stage, config.agent_count, config.size)
        };
        let agent_program =
            ShaderSlot::load(&compiler_for(ComputeStage::Agent), &config.agent_shader)?;
        let field_program =
            ShaderSlot::load(&compiler_for(ComputeStage::Field), &config.field_shader)?;
        config.check_workgroup_size(ComputeStage::Agent, agent_program.program().workgroup_size)?;
        config.check_workgroup_size(ComputeStage::Field, field_program.program().workgroup_size)?;

        let mut watches: Vec<(Box<dyn ChangeSource>, ComputeStage)> = Vec::new();
        for (path, stage) in [
            (&config.agent_shader, ComputeStage::Agent),
            (&config.field_shader, ComputeStage::Field),
        ] {
            let watch = watch_file(path, config.watch_mode).map_err(|source| {
                SimulationError::Watch {
                    path: path.clone(),
                    source,
                }
            })?;
            watches.push((watch, stage));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let agents = spawn_agents(config.agent_count, config.size, &mut rng);
        let agent_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Agent Buffer"),
            contents: bytemuck::cast_slice(&agents),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });
        // The GPU copy is the only one kept.
        drop(agents);

        log::info!(
            "Uploaded {} agents ({:.1} MiB)",
            config.agent_count,
            (config.agent_count as u64 * Agent::SIZE) as f64 / (1024.0 * 1024.0)
        );

        let params = SimParams {
            frame: 0,
            agent_count: config.agent_count,
            width: config.size.x,
            height: config.size.y,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sim Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let field_config = FieldTextureConfig::new(config.size)
            .with_filter(config.filter)
            .with_address_mode(config.address_mode);
        let field = FieldTextures::new(device, field_config);

        let make_bind_group = |output: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Compute Bind Group (output {})", output)),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: AGENTS_BINDING,
                        resource: agent_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: FIELD_IN_BINDING,
                        resource: wgpu::BindingResource::TextureView(&field.views[1 - output]),
                    },
                    wgpu::BindGroupEntry {
                        binding: FIELD_OUT_BINDING,
                        resource: wgpu::BindingResource::TextureView(&field.views[output]),
                    },
                    wgpu::BindGroupEntry {
                        binding: PARAMS_BINDING,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let compute_bind_groups = [make_bind_group(0), make_bind_group(1)];

        Ok(Self {
            agent_buffer,
            agent_count: config.agent_count,
            params_buffer,
            field,
            compute_bind_groups,
            compute_layout,
            agent_program,
            field_program,
            watches,
            frame: 0,
            size: config.size,
        })
    }

    /// Check every watched shader and recompile the ones that changed.
    ///
    /// A failed compile keeps the previous program and is only logged. A
    /// reloaded program may declare a different workgroup size; dispatches
    /// follow the active program. A watch that cannot read its file is
    /// returned as an error.
    pub fn poll_watches(&mut self, device: &wgpu::Device) -> Result<(), SimulationError> {
        for (watch, stage) in self.watches.iter_mut() {
            let changed = watch.poll_changed().map_err(|source| SimulationError::Watch {
                path: watch.path().to_path_buf(),
                source,
            })?;
            if !changed {
                continue;
            }

            let compiler =
                stage_compiler(device, &self.compute_layout, *stage, self.agent_count, self.size);
            let slot = match stage {
                ComputeStage::Agent => &mut self.agent_program,
                ComputeStage::Field => &mut self.field_program,
            };
            let outcome = slot.reload(&compiler);
            if outcome.success {
                let [x, y, z] = outcome.program.workgroup_size;
                log::info!("Reloaded {} shader, workgroup ({}, {}, {})", stage, x, y, z);
            } else {
                log::warn!("Keeping previous {} shader", stage);
            }
        }
        Ok(())
    }

    /// Current uniform values.
    pub fn params(&self) -> SimParams {
        SimParams {
            frame: self.frame,
            agent_count: self.agent_count,
            width: self.size.x,
            height: self.size.y,
        }
    }

    /// Upload the uniform block for this frame.
    pub fn write_params(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params()));
    }

    /// Bind group for the current texture roles.
    pub fn compute_bind_group(&self) -> &wgpu::BindGroup {
        &self.compute_bind_groups[self.field.roles.output()]
    }

    /// Advance the frame counter.
    pub fn advance_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    /// Copy the agent buffer back to the host.
    ///
    /// Blocks until the GPU has finished all submitted work.
    pub fn read_agents(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<Agent>, GpuError> {
        let size = self.agent_count as u64 * Agent::SIZE;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Agent Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.agent_buffer, 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let agents = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, Agent>(&data).to_vec()
        };
        staging.unmap();

        Ok(agents)
    }
}

fn stage_compiler<'a>(
    device: &'a wgpu::Device,
    layout: &'a wgpu::PipelineLayout,
    stage: ComputeStage,
    agent_count: u32,
    field_size: UVec2,
) -> PipelineCompiler<'a> {
    PipelineCompiler {
        device,
        layout,
        stage,
        agent_count,
        field_size,
    }
}
