//! Raspberry Pi hardware, through `rppal`.
//!
//! Motor legs use software PWM on GPIO output pins. The servo expander is a PCA9685 on the
//! primary I2C bus.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use pwm_pca9685::Pca9685;
use rppal::{
    gpio::{Gpio, OutputPin},
    i2c::I2c,
};

use super::{pca9685::prescale_for, DigitalOutput, HwError, Platform, PwmOutput};
use crate::motor_ctrl::{max_duty, MotorBank};
use crate::params::MotionExecParams;
use crate::servo_ctrl::{ServoBank, ServoBankConfig};
use motion_if::NUM_MOTORS;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct RpiPlatform;

/// Software PWM on a GPIO pin.
pub struct RpiPwm {
    pin: OutputPin,
    frequency_hz: f64,
    max_duty: u32,
}

/// A GPIO output line, optionally active low.
pub struct RpiPin {
    pin: OutputPin,
    active_low: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Platform for RpiPlatform {
    type MotorPwm = RpiPwm;
    type Standby = RpiPin;
    type Servo = Pca9685<I2c>;
    type ServoEnable = RpiPin;
}

impl RpiPwm {
    pub fn new(
        gpio: &Gpio,
        pin: u8,
        frequency_hz: u32,
        resolution_bits: u8,
    ) -> Result<Self, HwError> {
        let pin = gpio.get(pin).map_err(gpio_err)?.into_output_low();

        Ok(Self {
            pin,
            frequency_hz: frequency_hz as f64,
            max_duty: max_duty(resolution_bits),
        })
    }
}

impl PwmOutput for RpiPwm {
    fn set_duty(&mut self, duty: u32) -> Result<(), HwError> {
        if duty == 0 {
            self.pin.clear_pwm().map_err(gpio_err)?;
            self.pin.set_low();
            return Ok(());
        }

        let duty_cycle = (duty.min(self.max_duty) as f64) / self.max_duty as f64;

        self.pin
            .set_pwm_frequency(self.frequency_hz, duty_cycle)
            .map_err(gpio_err)
    }
}

impl RpiPin {
    /// Claim a pin as an output, starting deasserted.
    pub fn new(gpio: &Gpio, pin: u8, active_low: bool) -> Result<Self, HwError> {
        let pin = gpio.get(pin).map_err(gpio_err)?;

        let pin = if active_low {
            pin.into_output_high()
        } else {
            pin.into_output_low()
        };

        Ok(Self { pin, active_low })
    }
}

impl DigitalOutput for RpiPin {
    fn set_asserted(&mut self, asserted: bool) -> Result<(), HwError> {
        if asserted != self.active_low {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Bring up both actuator banks on the Raspberry Pi.
pub fn bring_up(
    params: &MotionExecParams,
) -> Result<(MotorBank<RpiPwm, RpiPin>, ServoBank<Pca9685<I2c>, RpiPin>), HwError> {
    let gpio = Gpio::new().map_err(gpio_err)?;

    // ---- MOTORS ----

    let m = &params.motors;

    let mut legs = Vec::with_capacity(m.leg_pins.len());
    for [a, b] in m.leg_pins.iter().copied() {
        legs.push((
            RpiPwm::new(&gpio, a, m.pwm_frequency_hz, m.resolution_bits)?,
            RpiPwm::new(&gpio, b, m.pwm_frequency_hz, m.resolution_bits)?,
        ));
    }
    let legs: [(RpiPwm, RpiPwm); NUM_MOTORS] =
        legs.try_into().map_err(|_| HwError::InvalidOutput)?;

    let standby = RpiPin::new(&gpio, m.standby_pin, false)?;
    let motors = MotorBank::new(legs, standby, m.resolution_bits)?;

    // ---- SERVOS ----

    let s = &params.servos;

    // The PCA9685's OE input is active low. Hold the outputs off before the oscillator starts.
    let output_enable = RpiPin::new(&gpio, s.output_enable_pin, true)?;

    let i2c = I2c::new().map_err(|_| HwError::I2c)?;
    let mut pca = Pca9685::new(i2c, s.i2c_address).map_err(|_| HwError::I2c)?;
    pca.set_prescale(prescale_for(s.oscillator_frequency_hz, s.frequency_hz))
        .map_err(|_| HwError::I2c)?;
    pca.enable().map_err(|_| HwError::I2c)?;

    info!(
        "PCA9685 at {:#04x} running at {} Hz",
        s.i2c_address, s.frequency_hz
    );

    let servos = ServoBank::new(pca, output_enable, ServoBankConfig::from(s))?;

    Ok((motors, servos))
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}
