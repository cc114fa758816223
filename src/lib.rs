//! # particle-agents
//!
//! A GPU particle-agent simulation: millions of agents wander a 2D trail
//! field, sense it, steer, and leave marks; the field diffuses and decays
//! every frame and is drawn to the window.
//!
//! ## Quick Start
//!
//! ```ignore
//! use particle_agents::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_agent_count(2_000_000)
//!         .with_window_size(1400, 1000)
//!         .run()
//! }
//! ```
//!
//! ## Frame
//!
//! Two RGBA32F textures alternate between being read and written. Each
//! frame:
//!
//! 1. The previous result is copied into the input texture.
//! 2. The agent program runs once per agent. It reads the input, moves the
//!    agent and writes its mark into the output.
//! 3. The roles swap.
//! 4. The field program blurs and decays the new input into the output.
//! 5. The output is drawn to the window and the frame counter advances.
//!
//! ## Shaders
//!
//! Both compute programs live in files on disk (`agent.wgsl` and
//! `field.wgsl` by default) and are recompiled whenever their modification
//! time changes. A program that fails to compile while running is logged
//! and the previous one stays in use; at startup it is an error.
//!
//! Every compute program sees the same bind group:
//!
//! | Binding | Resource |
//! |---------|----------|
//! | 0 | `array<Agent>` storage buffer, read-write |
//! | 1 | input field, `texture_2d<f32>` |
//! | 2 | output field, `texture_storage_2d<rgba32float, write>` |
//! | 3 | `SimParams { frame, agent_count, width, height }` uniform |
//!
//! Files ending in `.comp` or `.glsl` are compiled as GLSL; everything else
//! as WGSL.

pub mod agent;
pub mod error;
pub mod field;
pub mod gpu;
pub mod shader;
mod simulation;
pub mod textures;
pub mod time;
pub mod watch;

pub use agent::{spawn_agents, Agent, SPECIES_COUNT};
pub use error::{GpuError, ShaderError, SimulationError};
pub use field::{ComputeStage, TextureRoles};
pub use glam::{UVec2, Vec2};
pub use gpu::{GpuContext, SimParams, SimulationContext};
pub use shader::{Reload, ShaderSlot};
pub use simulation::{SimConfig, Simulation};
pub use textures::{AddressMode, FilterMode};
pub use watch::{ChangeSource, FileWatch, WatchMode};

/// Everything needed to configure and run a simulation.
pub mod prelude {
    pub use crate::error::SimulationError;
    pub use crate::simulation::{SimConfig, Simulation};
    pub use crate::textures::{AddressMode, FilterMode};
    pub use crate::watch::WatchMode;
    pub use crate::{UVec2, Vec2};
}
