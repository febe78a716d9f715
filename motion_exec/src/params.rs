//! # Motion Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use motion_if::{NUM_MOTORS, NUM_SERVOS};
use serde::Deserialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MotionExecParams {
    pub transport: TransportParams,

    pub motors: MotorParams,

    pub servos: ServoParams,

    #[serde(default)]
    pub main_loop: MainLoopParams,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TransportParams {
    /// Path to the UART device carrying the command protocol
    pub uart_path: String,

    /// Baud rate of the UART
    pub baud_rate: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MotorParams {
    /// PWM frequency of the H-bridge inputs
    pub pwm_frequency_hz: u32,

    /// Duty resolution in bits, the maximum duty is `2^bits - 1`
    pub resolution_bits: u8,

    /// GPIO of the motor drivers' shared standby line
    pub standby_pin: u8,

    /// GPIOs of the two H-bridge inputs of each motor
    pub leg_pins: [[u8; 2]; NUM_MOTORS],
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServoParams {
    /// I2C address of the PCA9685
    pub i2c_address: u8,

    /// Oscillator frequency of the PCA9685, calibrated per board
    pub oscillator_frequency_hz: u32,

    /// Servo refresh rate
    pub frequency_hz: u32,

    /// GPIO of the PCA9685 output enable line (active low)
    pub output_enable_pin: u8,

    /// Lower pulse bound applied to every channel
    pub min_pulse_us: i32,

    /// Upper pulse bound applied to every channel
    pub max_pulse_us: i32,

    /// Sweep step size
    pub sweep_step_us: u16,

    /// Minimum time between two sweep steps
    pub sweep_interval_ms: u32,

    /// Channel used by a `SWEEP ON`/`SWEEP OFF` without a range
    pub default_sweep_channel: u8,

    /// Whether sweep telemetry is emitted at start-up
    pub telemetry_enabled: bool,

    /// Emit one telemetry line every this many sweep steps
    pub telemetry_decimation: u32,

    /// Per channel bounds and sweep settings, replacing the ones above for that channel
    #[serde(default)]
    pub channels: Vec<ServoChannelParams>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServoChannelParams {
    /// Tracked channel these settings apply to
    pub channel: u8,

    pub min_pulse_us: i32,
    pub max_pulse_us: i32,
    pub sweep_step_us: u16,
    pub sweep_interval_ms: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MainLoopParams {
    /// Sleep between two loop iterations
    pub period_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("Motor resolution must be between 1 and 16 bits, found {0}")]
    InvalidResolution(u8),

    #[error("Frequency parameter {0} must be nonzero")]
    ZeroFrequency(&'static str),

    #[error("Servo pulse bounds are invalid ({0} to {1} us)")]
    InvalidPulseBounds(i32, i32),

    #[error("Telemetry decimation must be nonzero")]
    ZeroDecimation,

    #[error("Default sweep channel {0} is not a servo channel")]
    InvalidSweepChannel(u8),

    #[error("Settings given for servo channel {0}, which is not a servo channel")]
    InvalidChannelSettings(u8),

    #[error("Not all GPIO pins are unique")]
    NonUniquePins,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionExecParams {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        let m = &self.motors;
        let s = &self.servos;

        if m.resolution_bits == 0 || m.resolution_bits > 16 {
            return Err(ParamsError::InvalidResolution(m.resolution_bits));
        }

        if m.pwm_frequency_hz == 0 {
            return Err(ParamsError::ZeroFrequency("motors.pwm_frequency_hz"));
        }

        if s.frequency_hz == 0 {
            return Err(ParamsError::ZeroFrequency("servos.frequency_hz"));
        }

        if s.oscillator_frequency_hz == 0 {
            return Err(ParamsError::ZeroFrequency("servos.oscillator_frequency_hz"));
        }

        if s.min_pulse_us < 0 || s.min_pulse_us >= s.max_pulse_us {
            return Err(ParamsError::InvalidPulseBounds(s.min_pulse_us, s.max_pulse_us));
        }

        if s.telemetry_decimation == 0 {
            return Err(ParamsError::ZeroDecimation);
        }

        if s.default_sweep_channel as usize >= NUM_SERVOS {
            return Err(ParamsError::InvalidSweepChannel(s.default_sweep_channel));
        }

        for c in s.channels.iter() {
            if c.channel as usize >= NUM_SERVOS {
                return Err(ParamsError::InvalidChannelSettings(c.channel));
            }

            if c.min_pulse_us < 0 || c.min_pulse_us >= c.max_pulse_us {
                return Err(ParamsError::InvalidPulseBounds(c.min_pulse_us, c.max_pulse_us));
            }
        }

        // Non unique pins, the enable lines included
        let mut pins: Vec<u8> = m.leg_pins.iter().flatten().copied().collect();
        pins.push(m.standby_pin);
        pins.push(s.output_enable_pin);
        pins.sort_unstable();
        if pins.windows(2).any(|w| w[0] == w[1]) {
            return Err(ParamsError::NonUniquePins);
        }

        Ok(())
    }
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            uart_path: String::from("/dev/serial0"),
            baud_rate: 115_200,
        }
    }
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 12_000,
            resolution_bits: 8,
            standby_pin: 17,
            leg_pins: [[5, 6], [12, 13], [16, 19], [20, 21], [22, 23], [24, 25]],
        }
    }
}

impl Default for ServoParams {
    fn default() -> Self {
        Self {
            i2c_address: 0x40,
            oscillator_frequency_hz: 27_000_000,
            frequency_hz: 50,
            output_enable_pin: 4,
            min_pulse_us: 1000,
            max_pulse_us: 2000,
            sweep_step_us: 10,
            sweep_interval_ms: 50,
            default_sweep_channel: 0,
            telemetry_enabled: true,
            telemetry_decimation: 5,
            channels: Vec::new(),
        }
    }
}

impl Default for MainLoopParams {
    fn default() -> Self {
        Self { period_ms: 1 }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(MotionExecParams::default().are_valid(), Ok(()));
    }

    #[test]
    fn test_invalid_params() {
        let mut p = MotionExecParams::default();
        p.motors.resolution_bits = 17;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidResolution(17)));

        let mut p = MotionExecParams::default();
        p.servos.min_pulse_us = 2000;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidPulseBounds(2000, 2000)));

        let mut p = MotionExecParams::default();
        p.servos.default_sweep_channel = 6;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidSweepChannel(6)));

        let mut p = MotionExecParams::default();
        p.servos.channels.push(ServoChannelParams {
            channel: 6,
            min_pulse_us: 1100,
            max_pulse_us: 1900,
            sweep_step_us: 10,
            sweep_interval_ms: 50,
        });
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidChannelSettings(6)));

        p.servos.channels[0].channel = 5;
        assert_eq!(p.are_valid(), Ok(()));

        p.servos.channels[0].max_pulse_us = 900;
        assert_eq!(p.are_valid(), Err(ParamsError::InvalidPulseBounds(1100, 900)));

        let mut p = MotionExecParams::default();
        p.motors.leg_pins[5] = [24, 17];
        assert_eq!(p.are_valid(), Err(ParamsError::NonUniquePins));
    }

    #[test]
    fn test_parse_params_file() {
        let p: MotionExecParams = util::params::from_str(include_str!(
            "../../params/motion_exec.toml"
        ))
        .unwrap();

        assert_eq!(p.are_valid(), Ok(()));
        assert_eq!(p.transport.baud_rate, 115_200);
        assert_eq!(p.servos.i2c_address, 0x40);
        assert_eq!(p.motors.leg_pins[0], [5, 6]);
        assert_eq!(p.servos.channels.len(), 1);
        assert_eq!(p.servos.channels[0].channel, 3);
    }
}
