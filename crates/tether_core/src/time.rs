//! Frame clock
//!
//! Fixed 60Hz tick rate by default; the host may advance by any delta.

use std::time::Duration;

/// Fixed simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_DURATION: Duration = Duration::from_micros(16_666); // ~16.666ms

/// Clock state read by scripts every frame.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_count: u64,
    delta_time: f32,
    elapsed: f64,
    time_scale: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            delta_time: 0.0,
            elapsed: 0.0,
            time_scale: 1.0,
        }
    }

    /// Seconds covered by the last frame, after time scaling.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds since the clock started, after time scaling.
    pub fn time(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Negative scales are clamped to zero (paused).
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Advance by one frame of `dt` unscaled seconds.
    pub fn advance(&mut self, dt: f32) {
        self.frame_count += 1;
        self.delta_time = dt.max(0.0) * self.time_scale;
        self.elapsed += self.delta_time as f64;
    }

    /// Advance by one fixed simulation tick.
    pub fn advance_tick(&mut self) {
        self.advance(TICK_DURATION.as_secs_f32());
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

    #[test]
    fn test_advance_accumulates() {
        let mut clock = FrameClock::new();
        clock.advance(0.5);
        clock.advance(0.25);
        assert_eq!(clock.frame_count(), 2);
        assert_eq!(clock.delta_time(), 0.25);
        assert!((clock.time() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_time_scale_pauses() {
        let mut clock = FrameClock::new();
        clock.set_time_scale(-3.0);
        clock.advance(1.0);
        assert_eq!(clock.delta_time(), 0.0);
        assert_eq!(clock.time(), 0.0);
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_fixed_tick() {
        let mut clock = FrameClock::new();
        clock.advance_tick();
        assert!((clock.delta_time() - 0.016666).abs() < 1e-6);
    }
}
