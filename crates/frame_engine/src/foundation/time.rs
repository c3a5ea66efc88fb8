//! Time management utilities
//!
//! [`Timer`] measures the real time between host frames and feeds it to the
//! scheduler; [`Stopwatch`] measures how long individual phases take.

use std::time::{Duration, Instant};

/// High-precision timer for host frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f64,
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

    /// Sample the clock. Returns the seconds elapsed since the previous call.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += elapsed.as_secs_f64();
        self.last_frame = now;
        self.frame_count += 1;
        self.delta_time
    }

    /// Forget the previous sample so the next delta starts from now.
    ///
    /// Used when resuming from a pause so the paused wall time is not fed
    /// into the accumulator as one huge frame.
    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
        self.delta_time = 0.0;
    }

    /// Time remaining in the current frame before `target_frame_rate` is met
    pub fn time_until_next_frame(&self, target_frame_rate: u32) -> Option<Duration> {
        if target_frame_rate == 0 {
            return None;
        }
        let budget = Duration::from_secs_f64(1.0 / f64::from(target_frame_rate));
        budget.checked_sub(self.last_frame.elapsed())
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since timer creation
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f64 {
        if self.total_time > 0.0 {
            self.frame_count as f64 / self.total_time
        } else {
            0.0
        }
    }
}

/// Simple stopwatch for measuring elapsed time
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Read the elapsed time and restart from zero
    pub fn lap(&mut self) -> Duration {
        let lap = self.elapsed();
        self.elapsed = Duration::ZERO;
        self.start_time = Some(Instant::now());
        lap
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let running = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + running
    }

    /// Check if the stopwatch is currently running
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }
}

/// Scheduler clock readings visible to hooks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Index of the current frame, starting at 1 for the first tick
    pub frame: u64,
    /// Wall-clock delta fed into the current frame, in seconds
    pub delta: f32,
    /// Fixed step length, in seconds
    pub fixed_delta: f32,
    /// Simulated time consumed by fixed steps so far
    pub elapsed: f64,
    /// Interpolation factor between the last two fixed states, in `[0, 1)`
    pub alpha: f32,
}
