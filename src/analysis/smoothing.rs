// PitchSmoother - exponential moving average over cents deviation
//
// Used for display only; scoring always works on raw readings.
//
//   smoothed = smoothed * (1 - α) + raw * α
//
// The first value after construction or reset() seeds the filter without
// blending, so a new target never starts from a stale deviation.

use crate::config::SmoothingConfig;

/// Default EMA weight of the newest reading
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct PitchSmoother {
    smoothed: f32,
    factor: f32,
    initialized: bool,
}

impl Default for PitchSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

impl PitchSmoother {
    /// Create a smoother; `factor` is clamped to [0, 1]
    pub fn new(factor: f32) -> Self {
        let mut smoother = Self {
            smoothed: 0.0,
            factor: DEFAULT_SMOOTHING_FACTOR,
            initialized: false,
        };
        smoother.set_smoothing_factor(factor);
        smoother
    }

    pub fn with_config(config: &SmoothingConfig) -> Self {
        Self::new(config.factor)
    }

    /// Feed one raw cents value and return the rounded smoothed value
    pub fn smooth(&mut self, cents: f32) -> i32 {
        if self.initialized {
            self.smoothed = smooth_value(self.smoothed, cents, self.factor);
        } else {
            self.smoothed = cents;
            self.initialized = true;
        }
        self.rounded()
    }

    /// Forget history; the next `smooth` call seeds again
    pub fn reset(&mut self) {
        self.smoothed = 0.0;
        self.initialized = false;
    }

    /// Unrounded smoothed value
    pub fn value(&self) -> f32 {
        self.smoothed
    }

    /// Smoothed value rounded for display
    pub fn rounded(&self) -> i32 {
        self.smoothed.round() as i32
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn smoothing_factor(&self) -> f32 {
        self.factor
    }

    pub fn set_smoothing_factor(&mut self, factor: f32) {
        let clamped = if factor.is_nan() {
            DEFAULT_SMOOTHING_FACTOR
        } else {
            factor.clamp(0.0, 1.0)
        };
        if clamped != factor {
            log::warn!(
                "[PitchSmoother] Smoothing factor {} outside [0, 1], using {}",
                factor,
                clamped
            );
        }
        self.factor = clamped;
    }
}

/// One EMA step without keeping state
#[inline]
pub fn smooth_value(previous: f32, current: f32, factor: f32) -> f32 {
    previous * (1.0 - factor) + current * factor
}
