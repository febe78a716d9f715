//! # Motion Driver
//!
//! Owns everything the main loop touches: the transport, the command interpreter and both
//! actuator banks. Each iteration of the loop has two phases:
//!
//! 1. drain every available input byte, executing each completed line and replying to it,
//! 2. tick the servo bank once, emitting any telemetry that is due.
//!
//! Commands received in an iteration are therefore visible to that iteration's tick.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::info;

// Internal
use crate::hal::{HwError, Platform};
use crate::interp::CommandInterpreter;
use crate::motor_ctrl::MotorBank;
use crate::servo_ctrl::ServoBank;
use crate::transport::{Transport, TransportError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MotionDriver<H: Platform, T> {
    transport: T,

    interp: CommandInterpreter,

    motors: MotorBank<H::MotorPwm, H::Standby>,

    servos: ServoBank<H::Servo, H::ServoEnable>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MotionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HwError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionError {
    /// True if the error means the command stream has ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, MotionError::Transport(TransportError::Closed))
    }
}

impl<H, T> MotionDriver<H, T>
where
    H: Platform,
    T: Transport,
{
    pub fn new(
        transport: T,
        motors: MotorBank<H::MotorPwm, H::Standby>,
        servos: ServoBank<H::Servo, H::ServoEnable>,
    ) -> Self {
        Self {
            transport,
            interp: CommandInterpreter::new(),
            motors,
            servos,
        }
    }

    /// Read and execute every byte currently available.
    ///
    /// ## Returns
    /// The number of responses sent.
    pub fn poll_input(&mut self) -> Result<usize, MotionError> {
        let mut num_responses = 0;

        while let Some(byte) = self.transport.read_byte()? {
            let response = self
                .interp
                .handle_byte(byte, &mut self.motors, &mut self.servos);

            if let Some(response) = response {
                for line in response.lines() {
                    self.transport.write_line(&line)?;
                }
                num_responses += 1;
            }
        }

        Ok(num_responses)
    }

    /// Advance the servo sweeps, writing out any telemetry.
    ///
    /// Hardware failures while sweeping are logged by the servo bank and never end the loop.
    pub fn tick(&mut self, now_ms: u32) -> Result<(), MotionError> {
        for s in self.servos.update(now_ms) {
            self.transport.write_line(&s.to_string())?;
        }

        Ok(())
    }

    /// One full loop iteration: input then tick.
    pub fn run_once(&mut self, now_ms: u32) -> Result<(), MotionError> {
        self.poll_input()?;
        self.tick(now_ms)
    }

    /// Coast every motor, stop every sweep and disable the servo outputs.
    ///
    /// Both banks are shut down even if the first fails.
    pub fn shutdown(&mut self) -> Result<(), MotionError> {
        let motors = self.motors.stop_all();
        let servos = self.servos.shutdown();

        motors?;
        servos?;

        info!("Motion driver shut down");
        Ok(())
    }

    pub fn motors(&self) -> &MotorBank<H::MotorPwm, H::Standby> {
        &self.motors
    }

    pub fn servos(&self) -> &ServoBank<H::Servo, H::ServoEnable> {
        &self.servos
    }

    pub fn servos_mut(&mut self) -> &mut ServoBank<H::Servo, H::ServoEnable> {
        &mut self.servos
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
