//! End-to-end runs of the compute pipeline without a window.
//!
//! Each test skips itself when no GPU adapter is available.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use particle_agents::gpu::pipeline;
use particle_agents::{
    GpuContext, GpuError, SimConfig, SimulationContext, SimulationError, UVec2,
};

const WORK_GROUP_SIZE: u32 = 8;

const STEP_AGENT_SHADER: &str = r#"
struct Agent {
    x: f32,
    y: f32,
    dir: f32,
    id: i32,
}

@group(0) @binding(0) var<storage, read_write> agents: array<Agent>;

@compute @workgroup_size(8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if i >= arrayLength(&agents) {
        return;
    }
    agents[i].x = agents[i].x + 1.0;
}
"#;

const COPY_FIELD_SHADER: &str = r#"
@group(0) @binding(1) var field_in: texture_2d<f32>;
@group(0) @binding(2) var field_out: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(field_in);
    if id.x >= size.x || id.y >= size.y {
        return;
    }
    let coord = vec2<i32>(id.xy);
    textureStore(field_out, coord, textureLoad(field_in, coord, 0));
}
"#;

const FADE_FIELD_SHADER: &str = r#"
@group(0) @binding(1) var field_in: texture_2d<f32>;
@group(0) @binding(2) var field_out: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(4, 4)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(field_in);
    if id.x >= size.x || id.y >= size.y {
        return;
    }
    let coord = vec2<i32>(id.xy);
    textureStore(field_out, coord, textureLoad(field_in, coord, 0) * 0.5);
}
"#;

fn open_gpu() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping: {}", e);
            None
        }
    }
}

fn touch(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn write_shaders(dir: &Path) -> (PathBuf, PathBuf) {
    let agent = dir.join("agent.wgsl");
    let field = dir.join("field.wgsl");
    fs::write(&agent, STEP_AGENT_SHADER).unwrap();
    fs::write(&field, COPY_FIELD_SHADER).unwrap();
    touch(&agent, 1_000);
    touch(&field, 1_000);
    (agent, field)
}

fn small_config(agent_shader: PathBuf, field_shader: PathBuf) -> SimConfig {
    SimConfig {
        size: UVec2::new(64, 32),
        agent_count: 1000,
        work_group_size: WORK_GROUP_SIZE,
        agent_shader,
        field_shader,
        seed: Some(7),
        ..Default::default()
    }
}

#[test]
fn test_agent_stage_runs_every_frame() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());
    let config = small_config(agent, field);

    let mut ctx = SimulationContext::new(&gpu.device, &config).unwrap();
    let before = ctx.read_agents(&gpu.device, &gpu.queue).unwrap();
    assert_eq!(before.len(), 1000);

    const FRAMES: u32 = 5;
    for _ in 0..FRAMES {
        pipeline::step(&mut ctx, &gpu.device, &gpu.queue);
    }
    assert_eq!(ctx.frame, FRAMES);

    let after = ctx.read_agents(&gpu.device, &gpu.queue).unwrap();
    gpu.check_device().unwrap();
    for (a, b) in before.iter().zip(&after) {
        assert!((b.x - (a.x + FRAMES as f32)).abs() < 1e-3);
        assert_eq!(a.y, b.y);
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.id, b.id);
    }
}

#[test]
fn test_roles_alternate_each_frame() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());
    let mut ctx = SimulationContext::new(&gpu.device, &small_config(agent, field)).unwrap();

    // One swap per frame.
    let first = ctx.field.roles.output();
    pipeline::step(&mut ctx, &gpu.device, &gpu.queue);
    assert_ne!(ctx.field.roles.output(), first);
    pipeline::step(&mut ctx, &gpu.device, &gpu.queue);
    assert_eq!(ctx.field.roles.output(), first);
}

#[test]
fn test_field_shader_hot_reload() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());
    let mut ctx =
        SimulationContext::new(&gpu.device, &small_config(agent, field.clone())).unwrap();

    let original = ctx.field_program.program().fingerprint;
    assert_eq!(ctx.field_program.program().workgroup_size, [8, 8, 1]);
    assert_eq!(ctx.field_program.program().groups, (64 / 8 + 8, 32 / 8 + 8));

    // Unchanged files do nothing.
    ctx.poll_watches(&gpu.device).unwrap();
    assert_eq!(ctx.field_program.generation(), 0);

    fs::write(&field, FADE_FIELD_SHADER).unwrap();
    touch(&field, 2_000);
    ctx.poll_watches(&gpu.device).unwrap();
    assert_eq!(ctx.field_program.generation(), 1);
    let faded = ctx.field_program.program().fingerprint;
    assert_ne!(faded, original);
    // Dispatch follows the reloaded program's workgroup size.
    assert_eq!(ctx.field_program.program().workgroup_size, [4, 4, 1]);
    assert_eq!(ctx.field_program.program().groups, (64 / 4 + 4, 32 / 4 + 4));

    // A broken edit keeps the running program.
    fs::write(&field, "fn main( {").unwrap();
    touch(&field, 3_000);
    ctx.poll_watches(&gpu.device).unwrap();
    assert_eq!(ctx.field_program.generation(), 1);
    assert_eq!(ctx.field_program.program().fingerprint, faded);

    // The agent program was never touched.
    assert_eq!(ctx.agent_program.generation(), 0);
    pipeline::step(&mut ctx, &gpu.device, &gpu.queue);
    gpu.check_device().unwrap();
}

#[test]
fn test_startup_compile_failure_is_fatal() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());
    fs::write(&agent, "this is not a shader").unwrap();

    let result = SimulationContext::new(&gpu.device, &small_config(agent, field));
    assert!(matches!(result, Err(SimulationError::Shader(_))));
}

#[test]
fn test_missing_watched_file_is_an_error() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());
    let mut ctx =
        SimulationContext::new(&gpu.device, &small_config(agent, field.clone())).unwrap();

    fs::remove_file(&field).unwrap();
    match ctx.poll_watches(&gpu.device) {
        Err(SimulationError::Watch { path, .. }) => assert_eq!(path, field),
        other => panic!("expected watch error, got {:?}", other.err()),
    }
}

#[test]
fn test_startup_rejects_work_group_size_mismatch() {
    let Some(gpu) = open_gpu() else { return };
    let dir = tempfile::tempdir().unwrap();
    let (agent, field) = write_shaders(dir.path());

    // The shaders declare 8; a 16-wide dispatch would skip agents.
    let config = SimConfig {
        work_group_size: 16,
        ..small_config(agent, field)
    };
    let result = SimulationContext::new(&gpu.device, &config);
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[test]
fn test_device_errors_are_reported() {
    let Some(gpu) = open_gpu() else { return };
    gpu.check_device().unwrap();

    // Mapping for both read and write is invalid without extra features.
    let _buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Invalid Buffer"),
        size: 16,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE,
        mapped_at_creation: false,
    });

    match gpu.check_device() {
        Err(GpuError::Device(message)) => assert!(!message.is_empty()),
        other => panic!("expected device error, got {:?}", other),
    }
    // Reported once.
    gpu.check_device().unwrap();
}
