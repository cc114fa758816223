//! Simulation builder and window runner.
//!
//! [`Simulation`] collects a [`SimConfig`] through chained `with_*` calls,
//! then [`run`](Simulation::run) opens the window and drives one frame per
//! redraw until the window is closed.

use std::path::PathBuf;
use std::sync::Arc;

use glam::UVec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::error::SimulationError;
use crate::field::{stage_workgroups, ComputeStage};
use crate::gpu::GpuState;
use crate::textures::{AddressMode, FilterMode};
use crate::time::FrameClock;
use crate::watch::WatchMode;

/// Everything needed to start a simulation.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Window title. The current frame rate is appended while running.
    pub title: String,
    /// Window and field size in pixels.
    pub size: UVec2,
    pub agent_count: u32,
    /// Edge length of a workgroup: `N` invocations for the agent stage,
    /// `N x N` for the field stage. The shaders loaded at startup must
    /// declare exactly this size.
    pub work_group_size: u32,
    pub agent_shader: PathBuf,
    pub field_shader: PathBuf,
    pub watch_mode: WatchMode,
    /// Seed for the initial agent placement. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            title: "particle agents".to_string(),
            size: UVec2::new(1400, 1000),
            agent_count: 2_000_000,
            work_group_size: 32,
            agent_shader: PathBuf::from("agent.wgsl"),
            field_shader: PathBuf::from("field.wgsl"),
            watch_mode: WatchMode::Poll,
            seed: None,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::Repeat,
        }
    }
}

impl SimConfig {
    /// Reject configurations that cannot be dispatched.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.size.x == 0 || self.size.y == 0 {
            return Err(SimulationError::Config(format!(
                "field size must be non-zero, got {}x{}",
                self.size.x, self.size.y
            )));
        }
        if self.work_group_size == 0 {
            return Err(SimulationError::Config(
                "work group size must be non-zero".to_string(),
            ));
        }
        if self.agent_count == 0 {
            return Err(SimulationError::Config(
                "agent count must be non-zero".to_string(),
            ));
        }

        let wg = self.work_group_size;
        for (stage, declared) in [
            (ComputeStage::Agent, [wg, 1, 1]),
            (ComputeStage::Field, [wg, wg, 1]),
        ] {
            stage_workgroups(stage, declared, self.agent_count, self.size)
                .map_err(SimulationError::Config)?;
        }

        Ok(())
    }

    /// Check that a program's `@workgroup_size` matches
    /// [`work_group_size`](Self::work_group_size).
    pub fn check_workgroup_size(
        &self,
        stage: ComputeStage,
        declared: [u32; 3],
    ) -> Result<(), SimulationError> {
        let wg = self.work_group_size;
        let expected = match stage {
            ComputeStage::Agent => [wg, 1, 1],
            ComputeStage::Field => [wg, wg, 1],
        };
        if declared != expected {
            return Err(SimulationError::Config(format!(
                "{} shader declares workgroup size {:?} but the configuration expects {:?}",
                stage, declared, expected
            )));
        }
        Ok(())
    }
}

/// A particle-agent simulation.
///
/// # Example
///
/// ```ignore
/// use particle_agents::prelude::*;
///
/// Simulation::new()
///     .with_agent_count(500_000)
///     .with_agent_shader("shaders/agent.wgsl")
///     .with_seed(7)
///     .run()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    config: SimConfig,
}

impl Simulation {
    /// Create a simulation with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulation from an existing configuration.
    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Number of agents to spawn.
    pub fn with_agent_count(mut self, count: u32) -> Self {
        self.config.agent_count = count;
        self
    }

    /// Window and field size in pixels.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.config.size = UVec2::new(width, height);
        self
    }

    pub fn with_work_group_size(mut self, size: u32) -> Self {
        self.config.work_group_size = size;
        self
    }

    /// Path of the agent stage's compute shader.
    pub fn with_agent_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.agent_shader = path.into();
        self
    }

    /// Path of the field stage's compute shader.
    pub fn with_field_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.field_shader = path.into();
        self
    }

    /// How shader files are watched for changes.
    pub fn with_watch_mode(mut self, mode: WatchMode) -> Self {
        self.config.watch_mode = mode;
        self
    }

    /// Make the initial agent placement reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Filter used when drawing the field to the screen.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.config.address_mode = mode;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run the simulation. This blocks until the window is closed.
    ///
    /// Startup failures (window, device, a shader that does not compile)
    /// and unreadable watched files end the run with an error.
    pub fn run(self) -> Result<(), SimulationError> {
        self.config.validate()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config);
        event_loop.run_app(&mut app)?;

        match app.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct App {
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    config: SimConfig,
    clock: FrameClock,
    /// First fatal error; the event loop exits once this is set.
    error: Option<SimulationError>,
}

impl App {
    fn new(config: SimConfig) -> Self {
        Self {
            window: None,
            gpu_state: None,
            config,
            clock: FrameClock::new(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SimulationError) {
        log::error!("{}", err);
        self.error.get_or_insert(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.size.x,
                self.config.size.y,
            ))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        self.window = Some(window.clone());

        let gpu_state = pollster::block_on(GpuState::new(window, &self.config))?;
        log::info!(
            "Running {} agents on a {}x{} field",
            self.config.agent_count,
            self.config.size.x,
            self.config.size.y
        );
        self.gpu_state = Some(gpu_state);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };

        if let Err(err) = gpu_state.poll_watches() {
            self.fail(event_loop, err);
            return;
        }

        match gpu_state.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu_state.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                event_loop.exit();
                return;
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        if let Err(err) = gpu_state.check_device() {
            self.fail(event_loop, err.into());
            return;
        }

        if self.clock.tick() {
            let fps = self.clock.fps();
            log::debug!("frame {} at {:.1} fps", self.clock.frame(), fps);
            if let Some(window) = &self.window {
                window.set_title(&format!("{} - {:.1} fps", self.config.title, fps));
            }
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.init(event_loop) {
                self.fail(event_loop, err);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }
}
