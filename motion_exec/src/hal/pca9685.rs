//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use pwm_pca9685::{Channel, Pca9685};

use super::{HwError, ServoDriver};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Counter resolution of the PCA9685.
pub const MAX_PWM: u16 = 4096;

/// Default I2C address of the board.
pub const DEFAULT_ADDRESS: u8 = 0x40;

const CHANNELS: [Channel; 16] = [
    Channel::C0,
    Channel::C1,
    Channel::C2,
    Channel::C3,
    Channel::C4,
    Channel::C5,
    Channel::C6,
    Channel::C7,
    Channel::C8,
    Channel::C9,
    Channel::C10,
    Channel::C11,
    Channel::C12,
    Channel::C13,
    Channel::C14,
    Channel::C15,
];

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the prescale register value giving `frequency_hz` from an oscillator running at
/// `oscillator_hz`.
///
/// The result is limited to the range the chip accepts (3 to 255).
pub fn prescale_for(oscillator_hz: u32, frequency_hz: u32) -> u8 {
    let divisor = MAX_PWM as u64 * frequency_hz.max(1) as u64;
    let prescale = (oscillator_hz as u64 + divisor / 2) / divisor;

    prescale.saturating_sub(1).clamp(3, 255) as u8
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> ServoDriver for Pca9685<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn set_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), HwError> {
        let hw_channel = *CHANNELS
            .get(channel as usize)
            .ok_or(HwError::InvalidChannel(channel))?;

        // Off ticks must stay inside the counter or the chip treats it as a full on/off flag
        match self.set_channel_on_off(hw_channel, 0, ticks.min(MAX_PWM - 1)) {
            Ok(_) => Ok(()),
            Err(pwm_pca9685::Error::I2C(_)) => Err(HwError::I2c),
            Err(pwm_pca9685::Error::InvalidInputData) => Err(HwError::InvalidOutput),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
