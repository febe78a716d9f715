//! # Servo channel
//!
//! One steering servo: its current pulse, its bounds, and its sweep state. A channel doesn't own
//! any hardware, the bank lends it the shared servo driver for each write.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};

use crate::hal::{HwError, ServoDriver};
use crate::pulse::{clamp_pulse, PulseTiming};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bounds and sweep settings a channel is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoChannelConfig {
    pub min_pulse_us: i32,
    pub max_pulse_us: i32,
    pub sweep_step_us: u16,
    pub sweep_interval_ms: u32,
}

/// Autonomous back and forth motion of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepState {
    pub enabled: bool,

    /// Size of one step
    pub step_us: i32,

    /// Minimum time between two steps
    pub interval_ms: u32,

    /// Time of the last step, `None` until the first step after enabling
    pub last_update_ms: Option<u32>,

    /// +1 while moving up, -1 while moving down
    pub direction: i8,

    /// Steps since telemetry was last reported
    pub log_decimator: u32,
}

pub struct ServoChannel {
    index: u8,

    current_pulse_us: i32,
    min_pulse_us: i32,
    max_pulse_us: i32,

    sweep: SweepState,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ServoChannel {
    /// Create a channel centred in its range, with the sweep disabled.
    pub fn new(index: u8, config: &ServoChannelConfig) -> Self {
        let (min, max) = ordered(config.min_pulse_us, config.max_pulse_us);

        Self {
            index,
            current_pulse_us: min + (max - min) / 2,
            min_pulse_us: min,
            max_pulse_us: max,
            sweep: SweepState {
                enabled: false,
                step_us: config.sweep_step_us as i32,
                interval_ms: config.sweep_interval_ms,
                last_update_ms: None,
                direction: 1,
                log_decimator: 0,
            },
        }
    }

    /// Move to a pulse width, stopping any sweep on this channel.
    ///
    /// The pulse is clamped to the channel's bounds before being stored and written.
    pub fn set_target_microseconds<D: ServoDriver>(
        &mut self,
        driver: &mut D,
        timing: &PulseTiming,
        pulse_us: i32,
    ) -> Result<(), HwError> {
        self.sweep.enabled = false;

        let pulse_us = clamp_pulse(pulse_us, self.min_pulse_us, self.max_pulse_us);
        self.write_pulse(driver, timing, pulse_us)?;
        self.current_pulse_us = pulse_us;

        Ok(())
    }

    /// Write the current pulse to the driver.
    pub fn write<D: ServoDriver>(
        &self,
        driver: &mut D,
        timing: &PulseTiming,
    ) -> Result<(), HwError> {
        self.write_pulse(driver, timing, self.current_pulse_us)
    }

    /// Advance the sweep if it is enabled and its interval has elapsed.
    ///
    /// ## Arguments
    /// - `now_ms` - Current time, compared to the last step with wrapping arithmetic
    /// - `telemetry_decimation` - `Some(n)` to report every nth step, `None` to never report
    ///
    /// ## Returns
    /// The new pulse width if a step was made and is due to be reported.
    ///
    /// If the write fails nothing is stored, so the channel still matches the hardware and the
    /// step is retried on the next call.
    pub fn advance_sweep<D: ServoDriver>(
        &mut self,
        driver: &mut D,
        timing: &PulseTiming,
        now_ms: u32,
        telemetry_decimation: Option<u32>,
    ) -> Result<Option<i32>, HwError> {
        if !self.sweep.enabled {
            return Ok(None);
        }

        if let Some(last) = self.sweep.last_update_ms {
            if now_ms.wrapping_sub(last) < self.sweep.interval_ms {
                return Ok(None);
            }
        }

        let mut direction = self.sweep.direction;
        let mut pulse_us = self.current_pulse_us + direction as i32 * self.sweep.step_us;

        // Bounce off the bounds rather than overshooting them
        if pulse_us >= self.max_pulse_us || pulse_us <= self.min_pulse_us {
            pulse_us = clamp_pulse(pulse_us, self.min_pulse_us, self.max_pulse_us);
            direction = -direction;
        }

        self.write_pulse(driver, timing, pulse_us)?;

        self.current_pulse_us = pulse_us;
        self.sweep.direction = direction;
        self.sweep.last_update_ms = Some(now_ms);

        match telemetry_decimation {
            Some(n) => {
                self.sweep.log_decimator += 1;
                if self.sweep.log_decimator >= n.max(1) {
                    self.sweep.log_decimator = 0;
                    Ok(Some(self.current_pulse_us))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Enable or disable the sweep. Enabling makes the next tick step straight away.
    pub fn set_sweep_enabled(&mut self, enabled: bool) {
        if enabled && !self.sweep.enabled {
            self.sweep.last_update_ms = None;
        }

        if enabled != self.sweep.enabled {
            debug!(
                "Servo {} sweep {}",
                self.index,
                if enabled { "on" } else { "off" }
            );
        }

        self.sweep.enabled = enabled;
    }

    /// Change the bounds of the channel. Reversed bounds are swapped.
    ///
    /// The current pulse is pulled inside the new bounds, it is written on the next write.
    pub fn configure_range(&mut self, min_pulse_us: i32, max_pulse_us: i32) {
        let (min, max) = ordered(min_pulse_us, max_pulse_us);

        self.min_pulse_us = min;
        self.max_pulse_us = max;
        self.current_pulse_us = clamp_pulse(self.current_pulse_us, min, max);
    }

    /// Change the sweep step size and interval.
    pub fn configure_step(&mut self, step_us: u16, interval_ms: u32) {
        self.sweep.step_us = step_us as i32;
        self.sweep.interval_ms = interval_ms;
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn current_pulse_us(&self) -> i32 {
        self.current_pulse_us
    }

    pub fn bounds(&self) -> (i32, i32) {
        (self.min_pulse_us, self.max_pulse_us)
    }

    pub fn sweep(&self) -> &SweepState {
        &self.sweep
    }

    fn write_pulse<D: ServoDriver>(
        &self,
        driver: &mut D,
        timing: &PulseTiming,
        pulse_us: i32,
    ) -> Result<(), HwError> {
        let ticks = timing.to_ticks(pulse_us);
        trace!("Servo {} <- {} us ({} ticks)", self.index, pulse_us, ticks);
        driver.set_ticks(self.index, ticks)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn ordered(a: i32, b: i32) -> (i32, i32) {
    (a.min(b), a.max(b))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
