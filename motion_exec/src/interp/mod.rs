//! # Command Interpreter Module
//!
//! Turns the incoming byte stream into commands and applies them to the motor and servo banks,
//! producing exactly one response per non-blank line.
//!
//! A line is fully parsed and validated by [`motion_if::Command::from_line`] before any bank is
//! touched, so a rejected line never has a partial effect.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod line_buffer;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, trace, warn};

// Internal
use crate::hal::{DigitalOutput, HwError, PwmOutput, ServoDriver};
use crate::motor_ctrl::MotorBank;
use crate::servo_ctrl::ServoBank;
use motion_if::{CmdError, Command, MotorAction, Response};

pub use line_buffer::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct CommandInterpreter {
    line_buffer: LineBuffer,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one input byte, executing the line it completes if any.
    ///
    /// ## Returns
    /// The response to send, if the byte completed or overflowed a line.
    pub fn handle_byte<P, S, D, O>(
        &mut self,
        byte: u8,
        motors: &mut MotorBank<P, S>,
        servos: &mut ServoBank<D, O>,
    ) -> Option<Response>
    where
        P: PwmOutput,
        S: DigitalOutput,
        D: ServoDriver,
        O: DigitalOutput,
    {
        match self.line_buffer.push(byte)? {
            LineEvent::Line(line) => self.handle_line(&line, motors, servos),
            LineEvent::Overflow => {
                debug!("Input line too long, discarding");
                Some(CmdError::LineTooLong.into())
            }
        }
    }

    /// Parse and execute one line. Blank lines give no response.
    pub fn handle_line<P, S, D, O>(
        &mut self,
        line: &str,
        motors: &mut MotorBank<P, S>,
        servos: &mut ServoBank<D, O>,
    ) -> Option<Response>
    where
        P: PwmOutput,
        S: DigitalOutput,
        D: ServoDriver,
        O: DigitalOutput,
    {
        match Command::from_line(line) {
            Ok(Some(cmd)) => Some(self.execute(&cmd, motors, servos)),
            Ok(None) => None,
            Err(e) => {
                debug!("Rejected {:?}: {}", line, e);
                Some(e.into())
            }
        }
    }

    /// Apply a validated command to the banks.
    pub fn execute<P, S, D, O>(
        &mut self,
        cmd: &Command,
        motors: &mut MotorBank<P, S>,
        servos: &mut ServoBank<D, O>,
    ) -> Response
    where
        P: PwmOutput,
        S: DigitalOutput,
        D: ServoDriver,
        O: DigitalOutput,
    {
        trace!("Executing {}", cmd);

        let result: Result<Response, HwError> = match *cmd {
            Command::Ping => Ok(Response::Pong),
            Command::Help => Ok(Response::Help),
            Command::Servo { channel, pulse_us } => servos
                .set_target_microseconds(channel, pulse_us)
                .map(|_| Response::Ok),
            Command::Sweep { enabled, range } => {
                match range {
                    Some(r) => {
                        servos.set_sweep_range_enabled(r.start as usize, r.end as usize, enabled)
                    }
                    None => {
                        let ch = servos.default_sweep_channel() as usize;
                        servos.set_sweep_enabled(ch, enabled);
                    }
                }
                Ok(Response::Ok)
            }
            Command::Log { enabled } => {
                servos.set_telemetry_enabled(enabled);
                debug!("Sweep telemetry {}", if enabled { "on" } else { "off" });
                Ok(Response::Ok)
            }
            Command::Motor { target, action } => target
                .iter()
                .try_for_each(|index| match action {
                    MotorAction::Run { direction, speed } => {
                        motors.run(index, direction, speed, true)
                    }
                    MotorAction::Start => motors.start(index),
                    MotorAction::Stop => motors.stop(index),
                })
                .map(|_| Response::Ok),
        };

        result.unwrap_or_else(|e| {
            warn!("Hardware fault executing \"{}\": {}", cmd, e);
            CmdError::Hardware.into()
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::sim::{self, SimPin, SimPwm, SimServoDriver};
    use crate::servo_ctrl::ServoBankConfig;
    use motion_if::Direction;

    struct Rig {
        interp: CommandInterpreter,
        motors: MotorBank<SimPwm, SimPin>,
        servos: ServoBank<SimServoDriver, SimPin>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                interp: CommandInterpreter::new(),
                motors: MotorBank::new(sim::motor_legs(), SimPin::new("stby"), 8).unwrap(),
                servos: ServoBank::new(
                    SimServoDriver::new(),
                    SimPin::new("oe"),
                    ServoBankConfig::default(),
                )
                .unwrap(),
            }
        }

        fn send(&mut self, input: &str) -> Vec<String> {
            let mut out = Vec::new();
            for &b in input.as_bytes() {
                if let Some(r) = self.interp.handle_byte(b, &mut self.motors, &mut self.servos) {
                    out.extend(r.lines());
                }
            }
            out
        }
    }

    #[test]
    fn test_ping_and_blank_lines() {
        let mut rig = Rig::new();

        assert_eq!(rig.send("PING\n"), vec!["PONG"]);
        assert_eq!(rig.send("ping\r\n"), vec!["PONG"]);
        assert!(rig.send("   \t \n\n").is_empty());
        assert_eq!(rig.send("FOO\n"), vec!["ERR Unknown command"]);
    }

    #[test]
    fn test_servo_and_sweep() {
        let mut rig = Rig::new();

        assert_eq!(rig.send("S 2 1800\n"), vec!["OK"]);
        assert_eq!(rig.servos.channel(2).unwrap().current_pulse_us(), 1800);

        // Bare SWEEP follows the last tracked S
        assert_eq!(rig.send("SWEEP ON\n"), vec!["OK"]);
        assert!(rig.servos.channel(2).unwrap().sweep().enabled);
        assert!(!rig.servos.channel(0).unwrap().sweep().enabled);

        assert_eq!(rig.send("SWEEP OFF ALL\n"), vec!["OK"]);
        assert!(!rig.servos.channel(2).unwrap().sweep().enabled);

        assert_eq!(rig.send("SWEEP ON 4-1\n"), vec!["OK"]);
        for i in 0..6 {
            assert_eq!(
                rig.servos.channel(i).unwrap().sweep().enabled,
                (1..=4).contains(&i)
            );
        }

        assert_eq!(rig.send("SWEEP ON 7\n"), vec!["ERR SWEEP range"]);
        assert_eq!(rig.send("S 16 1500\n"), vec!["ERR Servo channel"]);
        assert_eq!(rig.send("S 1\n"), vec!["ERR S cmd syntax"]);
    }

    #[test]
    fn test_log() {
        let mut rig = Rig::new();

        assert_eq!(rig.send("LOG OFF\n"), vec!["OK"]);
        assert!(!rig.servos.telemetry_enabled());
        assert_eq!(rig.send("LOG ON\n"), vec!["OK"]);
        assert!(rig.servos.telemetry_enabled());
        assert_eq!(rig.send("LOG MAYBE\n"), vec!["ERR LOG arg"]);
    }

    #[test]
    fn test_motor_targets() {
        let mut rig = Rig::new();

        assert_eq!(rig.send("MOTOR 3 FORWARD 0.5\n"), vec!["OK"]);
        for i in 0..6 {
            let ch = rig.motors.channel(i).unwrap();
            assert_eq!(ch.is_driving(), i == 3);
        }
        assert!(rig.motors.driver_enabled());

        assert_eq!(rig.send("MOTOR 0-1 BACKWARD\n"), vec!["OK"]);
        assert_eq!(rig.motors.channel(1).unwrap().leg_duties(), (0, 255));
        assert_eq!(rig.motors.channel(1).unwrap().direction(), Direction::Backward);

        assert_eq!(rig.send("MOTOR STOP\n"), vec!["OK"]);
        assert!(!rig.motors.driver_enabled());

        assert_eq!(rig.send("MOTOR ALL START\n"), vec!["OK"]);
        assert!(rig.motors.channel(3).unwrap().is_driving());
        assert!(!rig.motors.channel(5).unwrap().is_driving());

        assert_eq!(rig.send("MOTOR 6 STOP\n"), vec!["ERR MOTOR index"]);
        assert!(rig.motors.channel(3).unwrap().is_driving());
    }

    #[test]
    fn test_rejected_speed_changes_nothing() {
        let mut rig = Rig::new();

        rig.send("MOTOR FORWARD 0.4\n");
        assert_eq!(rig.send("MOTOR BACKWARD 1.5\n"), vec!["ERR MOTOR speed"]);

        for i in 0..6 {
            let ch = rig.motors.channel(i).unwrap();
            assert_eq!(ch.direction(), Direction::Forward);
            assert_eq!(ch.target_speed(), 0.4);
        }
    }

    #[test]
    fn test_help() {
        let mut rig = Rig::new();

        let out = rig.send("?\n");
        assert_eq!(out.len(), motion_if::HELP_LINES.len() + 1);
        assert_eq!(out.last().map(String::as_str), Some("OK"));
        assert_eq!(rig.send("help\n"), out);
    }

    #[test]
    fn test_hardware_fault() {
        let mut rig = Rig::new();
        rig.servos.driver_mut().fail_writes = true;

        assert_eq!(rig.send("S 0 1200\n"), vec!["ERR Hardware fault"]);

        // The interpreter carries on
        assert_eq!(rig.send("PING\n"), vec!["PONG"]);
    }
}
