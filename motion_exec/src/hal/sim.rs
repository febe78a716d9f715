//! Simulated hardware.
//!
//! Every type here keeps the last value written and a count of writes, which is what the tests
//! assert on. Writes are also traced so a desktop run with `--sim` shows what the rover would
//! have done.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use super::{DigitalOutput, HwError, Platform, PwmOutput, ServoDriver};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Marker for the all-simulated platform.
pub struct SimPlatform;

/// Simulated PWM output.
#[derive(Debug, Default)]
pub struct SimPwm {
    /// Name used when tracing writes
    pub name: String,

    duty: u32,
    writes: usize,
}

/// Simulated digital output.
#[derive(Debug, Default)]
pub struct SimPin {
    /// Name used when tracing writes
    pub name: String,

    asserted: bool,
    writes: usize,
}

/// Simulated 16 channel servo expander.
#[derive(Debug, Default)]
pub struct SimServoDriver {
    ticks: [Option<u16>; 16],
    writes: usize,

    /// If set every write fails, for testing fault handling
    pub fail_writes: bool,

    /// If set writes to this channel alone fail
    pub fail_channel: Option<u8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Platform for SimPlatform {
    type MotorPwm = SimPwm;
    type Standby = SimPin;
    type Servo = SimServoDriver;
    type ServoEnable = SimPin;
}

impl SimPwm {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// The last duty written.
    pub fn duty(&self) -> u32 {
        self.duty
    }

    /// Number of writes made so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PwmOutput for SimPwm {
    fn set_duty(&mut self, duty: u32) -> Result<(), HwError> {
        trace!("{} duty <- {}", self.name, duty);
        self.duty = duty;
        self.writes += 1;
        Ok(())
    }
}

impl SimPin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// The last level written.
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    /// Number of writes made so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DigitalOutput for SimPin {
    fn set_asserted(&mut self, asserted: bool) -> Result<(), HwError> {
        trace!("{} <- {}", self.name, asserted);
        self.asserted = asserted;
        self.writes += 1;
        Ok(())
    }
}

impl SimServoDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last ticks written to `channel`, or `None` if it was never written.
    pub fn ticks(&self, channel: u8) -> Option<u16> {
        self.ticks.get(channel as usize).copied().flatten()
    }

    /// Number of writes made so far, across all channels.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ServoDriver for SimServoDriver {
    fn set_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), HwError> {
        if self.fail_writes || self.fail_channel == Some(channel) {
            return Err(HwError::I2c);
        }

        let slot = self
            .ticks
            .get_mut(channel as usize)
            .ok_or(HwError::InvalidChannel(channel))?;

        trace!("servo {} ticks <- {}", channel, ticks);
        *slot = Some(ticks);
        self.writes += 1;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build a named pair of simulated legs for each of `N` motors.
pub fn motor_legs<const N: usize>() -> [(SimPwm, SimPwm); N] {
    let mut index = 0;
    [(); N].map(|_| {
        let legs = (
            SimPwm::new(&format!("motor {} leg A", index)),
            SimPwm::new(&format!("motor {} leg B", index)),
        );
        index += 1;
        legs
    })
}
