//! # Pulse conversion
//!
//! Servo positions are commanded as pulse widths in microseconds, the PWM expander wants a
//! number of counter ticks per period.

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period of a 50 Hz servo signal.
pub const SERVO_PERIOD_US: u32 = 20_000;

/// Counter resolution of the servo expander.
pub const PWM_RESOLUTION: u32 = 4096;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Timing of the servo PWM signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    /// Length of one PWM period
    pub period_us: u32,

    /// Number of ticks in one period
    pub resolution: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PulseTiming {
    /// Timing for a signal at `frequency_hz` on a counter of `resolution` ticks.
    pub fn from_frequency(frequency_hz: u32, resolution: u32) -> Self {
        Self {
            period_us: 1_000_000 / frequency_hz.max(1),
            resolution: resolution.max(1),
        }
    }

    /// Convert a pulse width into ticks, rounding to the nearest tick.
    ///
    /// Never returns more than `resolution - 1`, a full count would wrap to 0 on the expander.
    /// Negative pulses give 0.
    pub fn to_ticks(&self, pulse_us: i32) -> u16 {
        let pulse_us = pulse_us.max(0) as u64;
        let period = self.period_us.max(1) as u64;
        let resolution = self.resolution as u64;

        let ticks = (pulse_us * resolution + period / 2) / period;

        ticks.min(resolution - 1) as u16
    }

    /// Convert a number of ticks back into a pulse width, rounding to the nearest microsecond.
    pub fn to_pulse(&self, ticks: u16) -> i32 {
        let period = self.period_us as u64;
        let resolution = self.resolution as u64;

        ((ticks as u64 * period + resolution / 2) / resolution) as i32
    }

    /// Length of one tick in microseconds.
    pub fn tick_us(&self) -> f64 {
        self.period_us as f64 / self.resolution as f64
    }
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            period_us: SERVO_PERIOD_US,
            resolution: PWM_RESOLUTION,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Limit a pulse width to `[min_us, max_us]`.
pub fn clamp_pulse(pulse_us: i32, min_us: i32, max_us: i32) -> i32 {
    if pulse_us < min_us {
        min_us
    } else if pulse_us > max_us {
        max_us
    } else {
        pulse_us
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
