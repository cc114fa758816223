//! Error types for the simulation.
//!
//! GPU setup, shader loading and the event loop each get their own error
//! enum; [`SimulationError`] wraps them for [`Simulation::run`](crate::Simulation::run).

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface reports no usable format.
    NoSurfaceFormat,
    /// Failed to map buffer for reading.
    BufferMapping(String),
    /// The device reported an error outside any error scope.
    Device(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::NoSurfaceFormat => write!(f, "Surface does not support any texture format"),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            GpuError::Device(msg) => write!(f, "GPU device error: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur while loading or compiling a compute shader.
#[derive(Debug)]
pub enum ShaderError {
    /// Failed to read the shader file from disk.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The source did not parse.
    Parse { label: String, message: String },
    /// The source parsed but failed validation.
    Validation { label: String, message: String },
    /// The device rejected the shader module or pipeline.
    Pipeline { label: String, message: String },
}

impl ShaderError {
    /// Label of the shader the error belongs to (usually its path).
    pub fn label(&self) -> String {
        match self {
            ShaderError::Io { path, .. } => path.display().to_string(),
            ShaderError::Parse { label, .. }
            | ShaderError::Validation { label, .. }
            | ShaderError::Pipeline { label, .. } => label.clone(),
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Io { path, source } => {
                write!(f, "Failed to read shader {}: {}", path.display(), source)
            }
            ShaderError::Parse { label, message } => {
                write!(f, "Failed to parse shader {}:\n{}", label, message)
            }
            ShaderError::Validation { label, message } => {
                write!(f, "Shader {} failed validation:\n{}", label, message)
            }
            ShaderError::Pipeline { label, message } => {
                write!(f, "Failed to build pipeline for {}: {}", label, message)
            }
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// The configuration cannot be run.
    Config(String),
    /// A shader could not be compiled at startup.
    Shader(ShaderError),
    /// A watched shader file could not be inspected.
    Watch {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            SimulationError::Shader(e) => write!(f, "Shader error: {}", e),
            SimulationError::Watch { path, source } => {
                write!(f, "Failed to watch {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Config(_) => None,
            SimulationError::Shader(e) => Some(e),
            SimulationError::Watch { source, .. } => Some(source),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<ShaderError> for SimulationError {
    fn from(e: ShaderError) -> Self {
        SimulationError::Shader(e)
    }
}
