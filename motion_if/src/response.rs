//! # Responses
//!
//! Every command line produces exactly one response. Successful commands answer `OK` (or `PONG`
//! for `PING`, or the help block followed by `OK`), failures answer a single line starting with
//! `ERR `.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix shared by all error responses.
pub const ERR_PREFIX: &str = "ERR ";

/// Human readable protocol reference sent in reply to `HELP` or `?`.
pub const HELP_LINES: [&str; 8] = [
    "Commands:",
    "  PING                                  -> PONG",
    "  S <channel 0-15> <pulse_us>           set servo pulse, stops its sweep",
    "  SWEEP <ON|OFF> [channel|a-b|ALL]      servo sweep on/off",
    "  LOG <ON|OFF>                          sweep telemetry on/off",
    "  MOTOR [id|a-b|ALL] <FORWARD|BACKWARD> [speed 0.0-1.0]",
    "  MOTOR [id|a-b|ALL] <STOP|START>",
    "  HELP | ?                              this text",
];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reason reported in an `ERR` response.
///
/// The `Display` text is exactly what follows `ERR ` on the wire, host clients match on it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdError {
    #[error("Line too long")]
    LineTooLong,

    #[error("Unknown command")]
    UnknownCommand,

    #[error("S cmd syntax")]
    ServoSyntax,

    #[error("Servo channel")]
    ServoChannel,

    #[error("Servo pulse")]
    ServoPulse,

    #[error("SWEEP cmd syntax")]
    SweepSyntax,

    #[error("SWEEP arg")]
    SweepArg,

    #[error("SWEEP range")]
    SweepRange,

    #[error("LOG cmd syntax")]
    LogSyntax,

    #[error("LOG arg")]
    LogArg,

    #[error("MOTOR cmd syntax")]
    MotorSyntax,

    #[error("MOTOR arg")]
    MotorArg,

    #[error("MOTOR speed")]
    MotorSpeed,

    #[error("MOTOR index")]
    MotorIndex,

    #[error("Hardware fault")]
    Hardware,
}

/// A response to one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Reply to `PING`
    Pong,

    /// The command was executed
    Ok,

    /// The help block, terminated by `OK`
    Help,

    /// The command was rejected, or failed while executing
    Err(CmdError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Response {
    /// The lines making up this response, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Response::Pong => vec![String::from("PONG")],
            Response::Ok => vec![String::from("OK")],
            Response::Help => HELP_LINES
                .iter()
                .map(|l| l.to_string())
                .chain(std::iter::once(String::from("OK")))
                .collect(),
            Response::Err(e) => vec![format!("{}{}", ERR_PREFIX, e)],
        }
    }
}

impl From<CmdError> for Response {
    fn from(e: CmdError) -> Self {
        Response::Err(e)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_lines() {
        assert_eq!(
            Response::Err(CmdError::LineTooLong).lines(),
            vec!["ERR Line too long"]
        );
        assert_eq!(
            Response::Err(CmdError::ServoChannel).to_string(),
            "ERR Servo channel"
        );
        assert_eq!(
            Response::from(CmdError::MotorSpeed).to_string(),
            "ERR MOTOR speed"
        );
    }

    #[test]
    fn test_help_ends_with_ok() {
        let lines = Response::Help.lines();
        assert_eq!(lines.len(), HELP_LINES.len() + 1);
        assert_eq!(lines.last().map(String::as_str), Some("OK"));
        assert!(lines.iter().all(|l| !l.starts_with(ERR_PREFIX)));
    }

    #[test]
    fn test_response_serialises() {
        let json = serde_json::to_string(&Response::Err(CmdError::SweepRange)).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Response::Err(CmdError::SweepRange));
    }
}
