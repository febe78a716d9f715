//! # Hardware Abstraction Module
//!
//! Traits describing the minimum the motion core needs from the hardware, so that the same
//! controllers can drive the real rover, or a simulated one in tests and on a desktop.
//!
//! - [`PwmOutput`]: one PWM-capable output, used for each leg of a motor H-bridge.
//! - [`DigitalOutput`]: a plain on/off line, used for the shared enable lines.
//! - [`ServoDriver`]: a multi-channel servo PWM expander, addressed in ticks.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the PCA9685 16 channel servo driver board.
pub mod pca9685;

/// In-memory hardware which records every write.
pub mod sim;

/// Raspberry Pi GPIO and I2C backed hardware.
#[cfg(all(any(target_arch = "arm", target_arch = "aarch64"), target_os = "linux"))]
pub mod rpi;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A single PWM output.
pub trait PwmOutput {
    /// Set the raw duty of the output, between 0 and the maximum duty of the resolution the
    /// output was configured with.
    fn set_duty(&mut self, duty: u32) -> Result<(), HwError>;
}

/// A digital output line.
pub trait DigitalOutput {
    /// Assert or deassert the line. Implementations handle active-low wiring, callers always
    /// think in terms of "asserted means enabled".
    fn set_asserted(&mut self, asserted: bool) -> Result<(), HwError>;
}

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {
    /// Set the "off" tick count of a channel, with the pulse starting at tick 0.
    ///
    /// ## Arguments
    /// - `channel` - The channel on the board, 0 to 15 for a PCA9685
    /// - `ticks` - Length of the high pulse in PWM ticks
    fn set_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), HwError>;
}

/// The set of concrete hardware types making up a rover.
pub trait Platform {
    /// Type used for each leg of each motor H-bridge
    type MotorPwm: PwmOutput;

    /// Type used for the motor drivers' shared standby line
    type Standby: DigitalOutput;

    /// Type used for the servo expander
    type Servo: ServoDriver;

    /// Type used for the servo expander's output enable line
    type ServoEnable: DigitalOutput;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum HwError {
    #[error("An I2C error occured")]
    I2c,

    #[error("A GPIO error occured: {0}")]
    Gpio(String),

    #[error("Channel {0} does not exist on this driver")]
    InvalidChannel(u8),

    #[error("The driver rejected the requested output value")]
    InvalidOutput,
}
