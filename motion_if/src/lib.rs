//! # Motion interface crate.
//!
//! Provides the line protocol spoken between the motion executable and any host-side client
//! (bridges, consoles, scripts). Everything here is pure data and parsing; nothing touches
//! hardware.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command definitions and the line parser
pub mod cmd;

/// Responses and error reasons written back to the client
pub mod response;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use cmd::*;
pub use response::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of independently driven wheels.
pub const NUM_MOTORS: usize = 6;

/// Number of tracked steering servo channels.
pub const NUM_SERVOS: usize = 6;

/// Number of channels on the servo expander, addressable by the `S` command.
pub const NUM_SERVO_DRIVER_CHANNELS: usize = 16;

/// Maximum number of usable bytes in one command line.
pub const MAX_LINE_LEN: usize = 63;
