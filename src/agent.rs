//! Agent records and their initial placement.
//!
//! Agents live in a single GPU storage buffer. The host builds the initial
//! population once, uploads it, and drops its copy.

use bytemuck::{Pod, Zeroable};
use glam::UVec2;
use rand::Rng;
use std::f32::consts::TAU;

/// Number of agent species. Species ids cycle through `0..SPECIES_COUNT`.
pub const SPECIES_COUNT: u32 = 3;

/// One agent as laid out in the storage buffer.
///
/// Matches the WGSL struct:
///
/// ```wgsl
/// struct Agent {
///     x: f32,
///     y: f32,
///     dir: f32,
///     id: i32,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Agent {
    /// Horizontal position in field pixels.
    pub x: f32,
    /// Vertical position in field pixels.
    pub y: f32,
    /// Heading in radians.
    pub direction: f32,
    /// Species id.
    pub id: i32,
}

impl Agent {
    /// Size of one record in the storage buffer.
    pub const SIZE: u64 = std::mem::size_of::<Agent>() as u64;
}

/// Build the starting population.
///
/// Positions are uniform over `[0, size.x) x [0, size.y)`, headings uniform
/// over `[0, 2π)`, and agent `i` belongs to species `i mod SPECIES_COUNT`.
pub fn spawn_agents<R: Rng>(count: u32, size: UVec2, rng: &mut R) -> Vec<Agent> {
    let width = size.x as f32;
    let height = size.y as f32;

    (0..count)
        .map(|i| Agent {
            x: rng.gen_range(0.0..width),
            y: rng.gen_range(0.0..height),
            direction: rng.gen_range(0.0..TAU),
            id: (i % SPECIES_COUNT) as i32,
        })
        .collect()
}
