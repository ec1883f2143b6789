//! Frame timing

use std::time::Instant;

/// Measures time between frames for movement scaling and FPS reporting
#[derive(Debug, Clone)]
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Advance to the current instant (call once per frame)
    pub fn update(&mut self) {
        self.advance(Instant::now());
    }

    fn advance(&mut self, now: Instant) {
        self.delta_time = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Seconds between the last two updates
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds accumulated over all updates
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of updates
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_advance_accumulates() {
        let mut timer = Timer::new();
        let start = timer.last_frame;

        timer.advance(start + Duration::from_millis(250));
        timer.advance(start + Duration::from_millis(750));

        assert_relative_eq!(timer.delta_time(), 0.5, epsilon = EPSILON);
        assert_relative_eq!(timer.total_time(), 0.75, epsilon = EPSILON);
        assert_eq!(timer.frame_count(), 2);
        assert_relative_eq!(timer.average_fps(), 2.0 / 0.75, epsilon = EPSILON);
    }

    #[test]
    fn test_fresh_timer_reports_zero_fps() {
        assert_eq!(Timer::new().average_fps(), 0.0);
    }
}
