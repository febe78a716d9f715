//! # Command module
//!
//! Commands are single ASCII lines made of space or tab separated tokens. The first token names
//! the command and is case-insensitive, as are all keyword arguments. Surplus trailing tokens are
//! ignored.
//!
//! Parsing is all-or-nothing: a line is either turned into a complete [`Command`] or rejected
//! with a [`CmdError`], so a malformed line can never partially act on the rover.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal
use crate::{CmdError, NUM_MOTORS, NUM_SERVOS, NUM_SERVO_DRIVER_CHANNELS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Canonical token selecting every channel.
pub const ALL_TOKEN: &str = "ALL";

/// Deprecated spelling of [`ALL_TOKEN`], still sent by older host bridges.
pub const ALL_TOKEN_BRACKETED: &str = "[ALL]";

/// Motor speed used when a run command omits it.
pub const DEFAULT_MOTOR_SPEED: f32 = 1.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An inclusive range of channel indexes, always stored with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub start: u8,
    pub end: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Direction of rotation of a drive motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

/// What a `MOTOR` command does to the motors it targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotorAction {
    /// Set direction and speed, enabling the output if the speed is nonzero
    Run { direction: Direction, speed: f32 },

    /// Resume driving with the previously set direction and speed
    Start,

    /// Coast, keeping the previous direction and speed for a later `Start`
    Stop,
}

/// A fully validated command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// `PING`
    Ping,

    /// `S <channel> <pulse_us>`
    Servo { channel: u8, pulse_us: i32 },

    /// `SWEEP <ON|OFF> [range]`, no range means the default sweep channel
    Sweep {
        enabled: bool,
        range: Option<ChannelRange>,
    },

    /// `LOG <ON|OFF>`
    Log { enabled: bool },

    /// `MOTOR [target] <action> [speed]`
    Motor {
        target: ChannelRange,
        action: MotorAction,
    },

    /// `HELP` or `?`
    Help,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChannelRange {
    /// A range containing a single channel.
    pub fn single(channel: u8) -> Self {
        Self {
            start: channel,
            end: channel,
        }
    }

    /// A range covering the first `count` channels.
    pub fn all(count: usize) -> Self {
        Self {
            start: 0,
            end: count.saturating_sub(1) as u8,
        }
    }

    /// Build a range from two ends given in any order.
    pub fn new(a: u8, b: u8) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Iterate over the channel indexes in the range.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.start as usize..=self.end as usize
    }

    /// Parse a range token for a table of `count` channels.
    ///
    /// Accepts `ALL`, `[ALL]`, a single index or `a-b`. Reversed ranges are swapped. Returns
    /// `None` if the token is malformed or any end is outside the table.
    pub fn parse(token: &str, count: usize) -> Option<Self> {
        if is_all_token(token) {
            return Some(Self::all(count));
        }

        let range = match token.split_once('-') {
            Some((a, b)) => Self::new(a.parse().ok()?, b.parse().ok()?),
            None => Self::single(token.parse().ok()?),
        };

        if range.end as usize >= count {
            return None;
        }

        Some(range)
    }
}

impl fmt::Display for ChannelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl Direction {
    fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("FORWARD") {
            Some(Direction::Forward)
        } else if token.eq_ignore_ascii_case("BACKWARD") {
            Some(Direction::Backward)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "FORWARD"),
            Direction::Backward => write!(f, "BACKWARD"),
        }
    }
}

impl Command {
    /// Parse a command line.
    ///
    /// Returns `Ok(None)` if the line holds no tokens at all, such lines get no response.
    pub fn from_line(line: &str) -> Result<Option<Self>, CmdError> {
        let mut tokens = tokenize(line);

        let name = match tokens.next() {
            Some(t) => t,
            None => return Ok(None),
        };

        let cmd = if name.eq_ignore_ascii_case("PING") {
            Command::Ping
        } else if name.eq_ignore_ascii_case("S") {
            parse_servo(tokens.next(), tokens.next())?
        } else if name.eq_ignore_ascii_case("SWEEP") {
            parse_sweep(tokens.next(), tokens.next())?
        } else if name.eq_ignore_ascii_case("LOG") {
            Command::Log {
                enabled: parse_on_off(tokens.next(), CmdError::LogSyntax, CmdError::LogArg)?,
            }
        } else if name.eq_ignore_ascii_case("MOTOR") {
            parse_motor(tokens)?
        } else if name.eq_ignore_ascii_case("HELP") || name == "?" {
            Command::Help
        } else {
            return Err(CmdError::UnknownCommand);
        };

        Ok(Some(cmd))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping => write!(f, "PING"),
            Command::Servo { channel, pulse_us } => write!(f, "S {} {}", channel, pulse_us),
            Command::Sweep { enabled, range } => {
                write!(f, "SWEEP {}", on_off(*enabled))?;
                match range {
                    Some(r) => write!(f, " {}", r),
                    None => Ok(()),
                }
            }
            Command::Log { enabled } => write!(f, "LOG {}", on_off(*enabled)),
            Command::Motor { target, action } => {
                write!(f, "MOTOR {} ", target)?;
                match action {
                    MotorAction::Run { direction, speed } => {
                        write!(f, "{} {:.3}", direction, speed)
                    }
                    MotorAction::Start => write!(f, "START"),
                    MotorAction::Stop => write!(f, "STOP"),
                }
            }
            Command::Help => write!(f, "HELP"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a line into its tokens.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ' ' || c == '\t')
        .filter(|t| !t.is_empty())
}

/// True for both spellings of the all-channels token.
pub fn is_all_token(token: &str) -> bool {
    token.eq_ignore_ascii_case(ALL_TOKEN) || token.eq_ignore_ascii_case(ALL_TOKEN_BRACKETED)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn parse_on_off(
    token: Option<&str>,
    missing: CmdError,
    invalid: CmdError,
) -> Result<bool, CmdError> {
    let token = token.ok_or(missing)?;

    if token.eq_ignore_ascii_case("ON") {
        Ok(true)
    } else if token.eq_ignore_ascii_case("OFF") {
        Ok(false)
    } else {
        Err(invalid)
    }
}

fn parse_servo(channel: Option<&str>, pulse: Option<&str>) -> Result<Command, CmdError> {
    let (channel, pulse) = match (channel, pulse) {
        (Some(c), Some(p)) => (c, p),
        _ => return Err(CmdError::ServoSyntax),
    };

    let channel: u8 = match channel.parse() {
        Ok(c) if (c as usize) < NUM_SERVO_DRIVER_CHANNELS => c,
        _ => return Err(CmdError::ServoChannel),
    };

    let pulse_us: i32 = pulse.parse().map_err(|_| CmdError::ServoPulse)?;

    Ok(Command::Servo { channel, pulse_us })
}

fn parse_sweep(state: Option<&str>, range: Option<&str>) -> Result<Command, CmdError> {
    let enabled = parse_on_off(state, CmdError::SweepSyntax, CmdError::SweepArg)?;

    let range = match range {
        Some(t) => Some(ChannelRange::parse(t, NUM_SERVOS).ok_or(CmdError::SweepRange)?),
        None => None,
    };

    Ok(Command::Sweep { enabled, range })
}

fn parse_motor<'a, I>(mut tokens: I) -> Result<Command, CmdError>
where
    I: Iterator<Item = &'a str>,
{
    let first = tokens.next().ok_or(CmdError::MotorSyntax)?;

    // An optional target comes before the action. Action keywords never start with a digit.
    let starts_target = is_all_token(first)
        || first.chars().next().map_or(false, |c| c.is_ascii_digit());

    let (target, action) = if starts_target {
        let target = ChannelRange::parse(first, NUM_MOTORS).ok_or(CmdError::MotorIndex)?;
        (target, tokens.next().ok_or(CmdError::MotorSyntax)?)
    } else {
        (ChannelRange::all(NUM_MOTORS), first)
    };

    let action = if action.eq_ignore_ascii_case("STOP") {
        MotorAction::Stop
    } else if action.eq_ignore_ascii_case("START") {
        MotorAction::Start
    } else {
        let direction = Direction::from_token(action).ok_or(CmdError::MotorArg)?;
        let speed = match tokens.next() {
            Some(t) => parse_speed(t)?,
            None => DEFAULT_MOTOR_SPEED,
        };
        MotorAction::Run { direction, speed }
    };

    Ok(Command::Motor { target, action })
}

/// Speeds are rejected here rather than clamped, an operator typing 2.5 gets told about it.
fn parse_speed(token: &str) -> Result<f32, CmdError> {
    match token.parse::<f32>() {
        Ok(s) if s.is_finite() && (0.0..=1.0).contains(&s) => Ok(s),
        _ => Err(CmdError::MotorSpeed),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
