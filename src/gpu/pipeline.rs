//! Per-frame compute stages.
//!
//! Each stage records into its own pass. wgpu inserts a full memory barrier
//! between passes that touch the same resources, so the agent stage's writes
//! are visible to the field stage, and the field stage's writes to the
//! display pass, without any finer-grained synchronization.

use super::context::SimulationContext;

/// Copy the previous frame's result into the input texture.
pub fn copy_previous_field(ctx: &SimulationContext, encoder: &mut wgpu::CommandEncoder) {
    ctx.field.copy_output_to_input(encoder);
}

/// Run the agent program over all agents.
///
/// The grid follows the workgroup size the active program declares.
pub fn dispatch_agents(ctx: &SimulationContext, encoder: &mut wgpu::CommandEncoder) {
    let program = ctx.agent_program.program();
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("Agent Pass"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&program.pipeline);
    pass.set_bind_group(0, ctx.compute_bind_group(), &[]);
    pass.dispatch_workgroups(program.groups.0, 1, 1);
}

/// Run the field program over the whole texture.
pub fn dispatch_field(ctx: &SimulationContext, encoder: &mut wgpu::CommandEncoder) {
    let program = ctx.field_program.program();
    let (groups_x, groups_y) = program.groups;

    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("Field Pass"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&program.pipeline);
    pass.set_bind_group(0, ctx.compute_bind_group(), &[]);
    pass.dispatch_workgroups(groups_x, groups_y, 1);
}

/// Record one simulation step: copy, agents, swap, field.
///
/// Afterwards the field's output texture holds this frame's result.
pub fn encode_simulation(
    ctx: &mut SimulationContext,
    queue: &wgpu::Queue,
    encoder: &mut wgpu::CommandEncoder,
) {
    ctx.write_params(queue);

    copy_previous_field(ctx, encoder);
    dispatch_agents(ctx, encoder);
    ctx.field.swap();
    dispatch_field(ctx, encoder);
}

/// Run one step without presenting anything and advance the frame counter.
pub fn step(ctx: &mut SimulationContext, device: &wgpu::Device, queue: &wgpu::Queue) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Simulation Encoder"),
    });
    encode_simulation(ctx, queue, &mut encoder);
    queue.submit(std::iter::once(encoder.finish()));
    ctx.advance_frame();
}
