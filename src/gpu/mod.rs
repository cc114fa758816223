mod context;
mod display;
mod field_gpu;
pub mod pipeline;
mod programs;

use std::sync::{Arc, Mutex};

use glam::Vec2;
use winit::window::Window;

pub use crate::field::ComputeStage;
pub use context::{SimParams, SimulationContext};
pub use display::DisplayStage;
pub use field_gpu::FieldTextures;
pub use programs::{create_compute_layout, ComputeProgram, PipelineCompiler};

use crate::error::{GpuError, SimulationError};
use crate::simulation::SimConfig;

/// Largest workgroup the shipped shaders use (32 x 32 in the field stage).
const MAX_WORKGROUP_INVOCATIONS: u32 = 1024;

/// A device and its queue.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// First error the device raised outside an error scope.
    device_error: Arc<Mutex<Option<String>>>,
}

impl GpuContext {
    /// Open a device without a surface, for running the pipeline off-screen.
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        Self::from_adapter(&adapter).await
    }

    async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, GpuError> {
        let info = adapter.get_info();
        log::info!("Using {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    // Lets the display pass use linear filtering where supported.
                    required_features: adapter.features() & wgpu::Features::FLOAT32_FILTERABLE,
                    required_limits: required_limits(&adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let device_error = Arc::new(Mutex::new(None));
        let sink = device_error.clone();
        device.on_uncaptured_error(Box::new(move |err| {
            if let Ok(mut slot) = sink.lock() {
                slot.get_or_insert_with(|| err.to_string());
            }
        }));

        Ok(Self {
            device,
            queue,
            device_error,
        })
    }

    /// Return the first error the device raised since the last call.
    ///
    /// Errors outside an error scope are fatal: callers stop driving frames
    /// once this fails.
    pub fn check_device(&self) -> Result<(), GpuError> {
        let error = match self.device_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match error {
            Some(message) => Err(GpuError::Device(message)),
            None => Ok(()),
        }
    }
}

/// Default limits, raised as far as the adapter allows for the 32 x 32
/// field workgroup.
fn required_limits(supported: &wgpu::Limits) -> wgpu::Limits {
    wgpu::Limits {
        max_compute_invocations_per_workgroup: supported
            .max_compute_invocations_per_workgroup
            .min(MAX_WORKGROUP_INVOCATIONS),
        max_compute_workgroup_size_x: supported
            .max_compute_workgroup_size_x
            .min(MAX_WORKGROUP_INVOCATIONS),
        max_compute_workgroup_size_y: supported
            .max_compute_workgroup_size_y
            .min(MAX_WORKGROUP_INVOCATIONS),
        ..wgpu::Limits::default()
    }
}

/// Windowed renderer: the surface plus the simulation and display stages.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    gpu: GpuContext,
    pub config: wgpu::SurfaceConfiguration,
    pub sim: SimulationContext,
    display: DisplayStage,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, sim_config: &SimConfig) -> Result<Self, SimulationError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(GpuError::from)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let gpu = GpuContext::from_adapter(&adapter).await?;

        // The field holds raw intensities; keep them linear on screen.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        let sim = SimulationContext::new(&gpu.device, sim_config)?;
        let display = DisplayStage::new(&gpu.device, &sim.field, surface_format);

        Ok(Self {
            surface,
            gpu,
            config,
            sim,
            display,
        })
    }

    /// Resize the surface. The field keeps its size and is stretched to fit.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.reconfigure();
        }
    }

    /// Reapply the surface configuration after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.gpu.device, &self.config);
    }

    /// Fails once the device reported an error outside an error scope.
    pub fn check_device(&self) -> Result<(), GpuError> {
        self.gpu.check_device()
    }

    /// Recompile any shader whose file changed.
    pub fn poll_watches(&mut self) -> Result<(), SimulationError> {
        self.sim.poll_watches(&self.gpu.device)
    }

    /// Run one full frame: simulation stages, display, present.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        pipeline::encode_simulation(&mut self.sim, &self.gpu.queue, &mut encoder);

        let screen_size = Vec2::new(self.config.width as f32, self.config.height as f32);
        self.display.write_uniforms(&self.gpu.queue, screen_size);
        self.display
            .encode(self.sim.field.roles.output(), &mut encoder, &view);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.sim.advance_frame();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_limits_cap_workgroups() {
        let mut supported = wgpu::Limits::default();
        supported.max_compute_invocations_per_workgroup = 2048;
        supported.max_compute_workgroup_size_x = 2048;
        supported.max_compute_workgroup_size_y = 2048;

        let limits = required_limits(&supported);
        assert_eq!(limits.max_compute_invocations_per_workgroup, 1024);
        assert_eq!(limits.max_compute_workgroup_size_x, 1024);
        assert_eq!(limits.max_compute_workgroup_size_y, 1024);
    }
}
