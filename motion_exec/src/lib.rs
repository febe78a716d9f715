//! # Motion Library
//!
//! Core of the motion executable: the command interpreter, the motor and servo controllers and
//! the hardware and transport seams they sit on. The executable only wires these together.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Owned aggregate running one loop iteration at a time.
pub mod driver;

/// Hardware abstraction traits and their implementations.
pub mod hal;

/// Line buffering, parsing and dispatch of protocol commands.
pub mod interp;

/// H-bridge motor channels and the shared standby line.
pub mod motor_ctrl;

/// Parameters for the motion executable.
pub mod params;

/// Pulse width clamping and tick conversion.
pub mod pulse;

/// Servo channels, sweeps and telemetry.
pub mod servo_ctrl;

/// Byte-in, line-out transports for the command protocol.
pub mod transport;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use driver::{MotionDriver, MotionError};
