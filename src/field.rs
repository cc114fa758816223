//! Ping-pong roles for the two field textures and dispatch sizing.

use glam::UVec2;
use std::fmt;

/// Which of the two field textures is currently written to.
///
/// Slot `current_output` is the write target; the other slot is the input
/// holding the previous state. [`swap`](TextureRoles::swap) flips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRoles {
    current_output: usize,
}

impl TextureRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the texture read this stage.
    pub fn input(&self) -> usize {
        1 - self.current_output
    }

    /// Index of the texture written this stage.
    pub fn output(&self) -> usize {
        self.current_output
    }

    /// Exchange input and output.
    pub fn swap(&mut self) {
        self.current_output ^= 1;
    }
}

/// Largest workgroup count wgpu accepts per dispatch dimension by default.
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535;

/// The two compute stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeStage {
    Agent,
    Field,
}

impl fmt::Display for ComputeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeStage::Agent => write!(f, "agent"),
            ComputeStage::Field => write!(f, "field"),
        }
    }
}

/// Workgroups for the agent stage: one invocation per agent, rounded up.
pub fn agent_workgroups(agent_count: u32, work_group_size: u32) -> u32 {
    agent_count.div_ceil(work_group_size)
}

/// Workgroups for the field stage.
///
/// Computed as `size / work_group_size + work_group_size` per axis rather
/// than a ceiling division. This over-dispatches by up to a workgroup-size
/// worth of groups; the field shader discards invocations outside the
/// texture.
pub fn field_workgroups(size: UVec2, work_group_size: UVec2) -> (u32, u32) {
    (
        size.x / work_group_size.x + work_group_size.x,
        size.y / work_group_size.y + work_group_size.y,
    )
}

/// Dispatch grid for `stage` given the `@workgroup_size` its program
/// declares.
///
/// The agent stage needs a one-dimensional workgroup, the field stage a
/// two-dimensional one. Errors name the offending size.
pub fn stage_workgroups(
    stage: ComputeStage,
    workgroup_size: [u32; 3],
    agent_count: u32,
    field_size: UVec2,
) -> Result<(u32, u32), String> {
    let [x, y, z] = workgroup_size;
    let groups = match stage {
        ComputeStage::Agent => {
            if x == 0 || y != 1 || z != 1 {
                return Err(format!(
                    "agent workgroup must be ({{n}}, 1, 1), got ({}, {}, {})",
                    x, y, z
                ));
            }
            (agent_workgroups(agent_count, x), 1)
        }
        ComputeStage::Field => {
            if x == 0 || y == 0 || z != 1 {
                return Err(format!(
                    "field workgroup must be ({{n}}, {{m}}, 1), got ({}, {}, {})",
                    x, y, z
                ));
            }
            field_workgroups(field_size, UVec2::new(x, y))
        }
    };

    if groups.0.max(groups.1) > MAX_WORKGROUPS_PER_DIMENSION {
        return Err(format!(
            "{} stage needs {}x{} workgroups of ({}, {}, {}), more than the {} a dispatch allows",
            stage, groups.0, groups.1, x, y, z, MAX_WORKGROUPS_PER_DIMENSION
        ));
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_roles_are_distinct() {
        let roles = TextureRoles::new();
        assert_ne!(roles.input(), roles.output());
        assert_eq!(roles.output(), 0);
        assert_eq!(roles.input(), 1);
    }

    #[test]
    fn test_swap_exchanges_roles() {
        let mut roles = TextureRoles::new();
        let (input, output) = (roles.input(), roles.output());
        roles.swap();
        assert_eq!(roles.input(), output);
        assert_eq!(roles.output(), input);
    }

    #[test]
    fn test_swap_is_involution() {
        let original = TextureRoles::new();
        let mut roles = original;
        roles.swap();
        roles.swap();
        assert_eq!(roles, original);
    }

    #[test]
    fn test_agent_workgroups() {
        assert_eq!(agent_workgroups(2_000_000, 32), 62_500);
        assert_eq!(agent_workgroups(33, 32), 2);
        assert_eq!(agent_workgroups(32, 32), 1);
        assert_eq!(agent_workgroups(0, 32), 0);
    }

    #[test]
    fn test_field_workgroups_over_dispatch() {
        assert_eq!(field_workgroups(UVec2::new(1400, 1000), UVec2::splat(32)), (75, 63));

        // Always covers the whole texture.
        for &(w, h) in &[(1, 1), (31, 33), (1400, 1000), (4096, 17)] {
            let (gx, gy) = field_workgroups(UVec2::new(w, h), UVec2::splat(32));
            assert!(gx * 32 >= w);
            assert!(gy * 32 >= h);
        }
    }

    #[test]
    fn test_stage_workgroups_follow_declared_size() {
        let size = UVec2::new(1400, 1000);
        assert_eq!(
            stage_workgroups(ComputeStage::Agent, [32, 1, 1], 2_000_000, size),
            Ok((62_500, 1))
        );
        // A 64-wide program needs half the groups to cover every agent.
        assert_eq!(
            stage_workgroups(ComputeStage::Agent, [64, 1, 1], 2_000_000, size),
            Ok((31_250, 1))
        );
        assert_eq!(
            stage_workgroups(ComputeStage::Field, [32, 32, 1], 0, size),
            Ok((75, 63))
        );
        assert_eq!(
            stage_workgroups(ComputeStage::Field, [16, 8, 1], 0, size),
            Ok((103, 133))
        );
    }

    #[test]
    fn test_stage_workgroups_rejects_wrong_shape() {
        let size = UVec2::new(64, 32);
        assert!(stage_workgroups(ComputeStage::Agent, [8, 8, 1], 100, size).is_err());
        assert!(stage_workgroups(ComputeStage::Field, [8, 8, 2], 100, size).is_err());
        assert!(stage_workgroups(ComputeStage::Field, [0, 8, 1], 100, size).is_err());
    }

    #[test]
    fn test_stage_workgroups_rejects_oversized_dispatch() {
        let err =
            stage_workgroups(ComputeStage::Agent, [1, 1, 1], 100_000, UVec2::ONE).unwrap_err();
        assert!(err.contains("agent stage"));
    }
}
