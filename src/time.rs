//! Frame timing for the window title and debug logs.
//!
//! The simulation itself is frame-driven and never reads wall-clock time;
//! this only measures how fast frames are produced.
//!
//! # Example
//!
//! ```ignore
//! use particle_agents::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//!
//! // Once per presented frame:
//! if clock.tick() {
//!     println!("FPS: {:.1}", clock.fps());
//! }
//! ```

use std::time::{Duration, Instant};

/// Counts presented frames and measures the frame rate.
#[derive(Debug)]
pub struct FrameClock {
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation.
    fps_update_time: Instant,
    /// How often to update FPS calculation.
    fps_update_interval: Duration,
}

impl FrameClock {
    /// Create a clock that recalculates FPS twice a second.
    pub fn new() -> Self {
        Self::with_fps_interval(Duration::from_millis(500))
    }

    /// Create a clock that recalculates FPS every `interval`.
    pub fn with_fps_interval(interval: Duration) -> Self {
        Self {
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: Instant::now(),
            fps_update_interval: interval,
        }
    }

    /// Record a frame. Call once per presented frame.
    ///
    /// Returns `true` when the FPS figure was recalculated.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
            return true;
        }
        false
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.fps(), 0.0);
    }

    #[test]
    fn test_clock_tick_counts_frames() {
        let mut clock = FrameClock::with_fps_interval(Duration::from_secs(3600));
        for _ in 0..3 {
            assert!(!clock.tick());
        }
        assert_eq!(clock.frame(), 3);
        assert_eq!(clock.fps(), 0.0);
    }

    #[test]
    fn test_fps_refresh() {
        let mut clock = FrameClock::with_fps_interval(Duration::from_millis(20));

        assert!(!clock.tick());
        thread::sleep(Duration::from_millis(30));
        assert!(clock.tick());
        assert!(clock.fps() > 0.0);
        assert_eq!(clock.frame(), 2);
    }
}
