//! Fixed-step accumulator
//!
//! Converts variable host frame deltas into a whole number of fixed steps.
//! After every frame `0 <= accumulator < fixed_delta`; when the per-frame
//! step cap is hit, the backlog is dropped instead of carried forward.

use crate::core::ConfigurationError;

/// Accumulates real time and hands out fixed steps
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStepAccumulator {
    fixed_delta: f64,
    max_steps: u32,
    accumulator: f64,
    elapsed: f64,
}

impl FixedStepAccumulator {
    /// Create an accumulator for steps of `fixed_delta` seconds, at most
    /// `max_steps` per frame
    pub fn new(fixed_delta: f32, max_steps: u32) -> Result<Self, ConfigurationError> {
        if !fixed_delta.is_finite() || fixed_delta <= 0.0 {
            return Err(ConfigurationError::InvalidFixedDelta(fixed_delta));
        }
        if max_steps == 0 {
            return Err(ConfigurationError::ZeroStepCap);
        }
        Ok(Self {
            fixed_delta: f64::from(fixed_delta),
            max_steps,
            accumulator: 0.0,
            elapsed: 0.0,
        })
    }

    /// Add a frame's real delta
    pub fn accumulate(&mut self, real_delta: f32) {
        self.accumulator += f64::from(real_delta);
    }

    /// Whether another fixed step is due, given `taken` steps this frame
    pub fn step_due(&self, taken: u32) -> bool {
        taken < self.max_steps && self.accumulator >= self.fixed_delta
    }

    /// Consume one fixed step
    pub fn consume_step(&mut self) {
        self.accumulator -= self.fixed_delta;
        self.elapsed += self.fixed_delta;
    }

    /// Close the frame after `taken` steps. Returns the seconds discarded
    /// because the step cap was hit.
    ///
    /// Only a backlog of at least one whole step is dropped. A frame that
    /// takes exactly `max_steps` steps and ends below `fixed_delta` keeps its
    /// remainder, as any uncapped frame would.
    pub fn finish_frame(&mut self, taken: u32) -> f64 {
        if taken >= self.max_steps && self.accumulator >= self.fixed_delta {
            let discarded = self.accumulator;
            self.accumulator = 0.0;
            discarded
        } else {
            0.0
        }
    }

    /// Whether `0 <= accumulator < fixed_delta`
    pub fn invariant_holds(&self) -> bool {
        (0.0..self.fixed_delta).contains(&self.accumulator)
    }

    /// Fraction of a fixed step left over, used for render interpolation
    #[allow(clippy::cast_possible_truncation)]
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_delta) as f32
    }

    /// Leftover time in seconds
    pub fn value(&self) -> f64 {
        self.accumulator
    }

    /// Simulated time consumed by fixed steps
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Fixed step length in seconds
    #[allow(clippy::cast_possible_truncation)]
    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta as f32
    }

    /// Step cap per frame
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Forget all accumulated and elapsed time
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.elapsed = 0.0;
    }

    /// Run a whole frame without callbacks. Returns `(steps, discarded)`.
    pub fn advance(&mut self, real_delta: f32) -> (u32, f64) {
        self.accumulate(real_delta);
        let mut steps = 0;
        while self.step_due(steps) {
            self.consume_step();
            steps += 1;
        }
        (steps, self.finish_frame(steps))
    }
}
