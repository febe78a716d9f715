//! # Motor channel
//!
//! One drive motor behind one H-bridge. Leg A is driven for forward rotation, leg B for
//! backward. Stopping coasts (both legs low), this controller never brakes.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use crate::hal::{HwError, PwmOutput};
use motion_if::Direction;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MotorChannel<P> {
    leg_a: P,
    leg_b: P,

    direction: Direction,

    /// Normalised speed in [0, 1], the sign is carried by `direction`
    target_speed: f32,

    output_enabled: bool,

    max_duty: u32,

    /// Duties last written to (leg A, leg B)
    duties: (u32, u32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P> MotorChannel<P>
where
    P: PwmOutput,
{
    /// Create a new channel from its two legs.
    ///
    /// Nothing is written until the first operation, the owning bank stops every channel during
    /// initialisation.
    pub fn new(leg_a: P, leg_b: P, resolution_bits: u8) -> Self {
        Self {
            leg_a,
            leg_b,
            direction: Direction::Forward,
            target_speed: 0.0,
            output_enabled: false,
            max_duty: max_duty(resolution_bits),
            duties: (0, 0),
        }
    }

    /// Set direction and speed and apply them immediately.
    ///
    /// `speed` is clamped to [0, 1]. If `auto_enable` is set and the clamped speed is nonzero the
    /// output is enabled.
    pub fn run(
        &mut self,
        direction: Direction,
        speed: f32,
        auto_enable: bool,
    ) -> Result<(), HwError> {
        self.direction = direction;
        self.target_speed = clamp_speed(speed);

        if auto_enable && self.target_speed > 0.0 {
            self.output_enabled = true;
        }

        self.apply_output()
    }

    /// Re-enable the output with the stored direction and speed.
    pub fn start(&mut self) -> Result<(), HwError> {
        self.output_enabled = true;
        self.apply_output()
    }

    /// Disable the output and drive both legs low. The stored direction and speed are kept.
    pub fn stop(&mut self) -> Result<(), HwError> {
        self.output_enabled = false;
        self.apply_output()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    /// True if this channel wants the motor driver out of standby.
    pub fn is_driving(&self) -> bool {
        self.output_enabled && self.target_speed > 0.0
    }

    /// The duties last written to (leg A, leg B).
    pub fn leg_duties(&self) -> (u32, u32) {
        self.duties
    }

    /// Access the hardware legs.
    pub fn legs(&self) -> (&P, &P) {
        (&self.leg_a, &self.leg_b)
    }

    /// The raw duty for the current speed.
    pub fn duty(&self) -> u32 {
        (self.target_speed * self.max_duty as f32 + 0.5) as u32
    }

    fn apply_output(&mut self) -> Result<(), HwError> {
        let duty = self.duty();

        let (a, b) = if !self.output_enabled || duty == 0 {
            (0, 0)
        } else {
            match self.direction {
                Direction::Forward => (duty, 0),
                Direction::Backward => (0, duty),
            }
        };

        trace!("Motor legs <- ({}, {})", a, b);

        // Release before driving, so that a direction change never has both legs high at once
        if a == 0 {
            self.write_a(0)?;
            self.write_b(b)
        } else {
            self.write_b(0)?;
            self.write_a(a)
        }
    }

    fn write_a(&mut self, duty: u32) -> Result<(), HwError> {
        self.leg_a.set_duty(duty)?;
        self.duties.0 = duty;
        Ok(())
    }

    fn write_b(&mut self, duty: u32) -> Result<(), HwError> {
        self.leg_b.set_duty(duty)?;
        self.duties.1 = duty;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Maximum raw duty for a resolution, `2^bits - 1`.
pub fn max_duty(resolution_bits: u8) -> u32 {
    (1u32 << resolution_bits.clamp(1, 31)) - 1
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Out of range speeds are limited rather than refused, a slightly off float should still drive.
fn clamp_speed(speed: f32) -> f32 {
    // f32::max ignores NaN, so NaN becomes 0
    speed.max(0.0).min(1.0)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::sim::SimPwm;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn channel() -> MotorChannel<SimPwm> {
        MotorChannel::new(SimPwm::new("a"), SimPwm::new("b"), 8)
    }

    fn hw_duties(ch: &MotorChannel<SimPwm>) -> (u32, u32) {
        let (a, b) = ch.legs();
        (a.duty(), b.duty())
    }

    #[test]
    fn test_max_duty() {
        assert_eq!(max_duty(8), 255);
        assert_eq!(max_duty(12), 4095);
        assert_eq!(max_duty(16), 65535);
    }

    #[test]
    fn test_run_forward_and_backward() {
        let mut ch = channel();

        ch.run(Direction::Forward, 0.5, true).unwrap();
        assert!(ch.output_enabled());
        assert!(ch.is_driving());
        // 0.5 * 255 = 127.5, rounded
        assert_eq!(ch.leg_duties(), (128, 0));
        assert_eq!(hw_duties(&ch), (128, 0));

        ch.run(Direction::Backward, 1.0, true).unwrap();
        assert_eq!(ch.leg_duties(), (0, 255));
        assert_eq!(hw_duties(&ch), (0, 255));
    }

    #[test]
    fn test_speed_clamped() {
        let mut ch = channel();

        ch.run(Direction::Forward, 2.5, true).unwrap();
        assert_eq!(ch.target_speed(), 1.0);
        assert_eq!(ch.leg_duties(), (255, 0));

        ch.run(Direction::Forward, -1.0, true).unwrap();
        assert_eq!(ch.target_speed(), 0.0);
        assert_eq!(ch.leg_duties(), (0, 0));
        assert!(!ch.is_driving());

        ch.run(Direction::Forward, f32::NAN, true).unwrap();
        assert_eq!(ch.target_speed(), 0.0);
    }

    #[test]
    fn test_no_auto_enable() {
        let mut ch = channel();

        ch.run(Direction::Forward, 0.8, false).unwrap();
        assert!(!ch.output_enabled());
        assert_eq!(ch.leg_duties(), (0, 0));

        ch.start().unwrap();
        assert_eq!(ch.leg_duties(), (204, 0));
    }

    #[test]
    fn test_stop_then_start_resumes() {
        let mut ch = channel();

        ch.run(Direction::Backward, 0.25, true).unwrap();
        ch.stop().unwrap();
        assert!(!ch.output_enabled());
        assert_eq!(ch.leg_duties(), (0, 0));
        assert_eq!(hw_duties(&ch), (0, 0));
        assert_eq!(ch.direction(), Direction::Backward);
        assert_eq!(ch.target_speed(), 0.25);

        ch.start().unwrap();
        assert_eq!(ch.leg_duties(), (0, 64));
    }

    #[test]
    fn test_bridge_never_shorted() {
        let mut ch = channel();

        // Deterministic mix of operations
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let dir = if seed & 1 == 0 {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let speed = ((seed >> 8) % 1300) as f32 / 1000.0 - 0.1;

            match (seed >> 24) % 4 {
                0 => ch.stop().unwrap(),
                1 => ch.start().unwrap(),
                2 => ch.run(dir, speed, false).unwrap(),
                _ => ch.run(dir, speed, true).unwrap(),
            }

            let (a, b) = hw_duties(&ch);
            assert!(a == 0 || b == 0, "both legs driven: ({}, {})", a, b);
            assert_eq!((a, b), ch.leg_duties());
        }
    }

    /// A leg sharing its duty with its partner, so every write can check the pair.
    struct BridgeLeg {
        bridge: Rc<RefCell<[u32; 2]>>,
        index: usize,
    }

    impl PwmOutput for BridgeLeg {
        fn set_duty(&mut self, duty: u32) -> Result<(), HwError> {
            let mut bridge = self.bridge.borrow_mut();
            bridge[self.index] = duty;
            assert!(
                bridge[0] == 0 || bridge[1] == 0,
                "both legs driven mid change: {:?}",
                *bridge
            );
            Ok(())
        }
    }

    #[test]
    fn test_direction_change_never_shorts() {
        let bridge = Rc::new(RefCell::new([0u32; 2]));
        let mut ch = MotorChannel::new(
            BridgeLeg {
                bridge: bridge.clone(),
                index: 0,
            },
            BridgeLeg {
                bridge: bridge.clone(),
                index: 1,
            },
            8,
        );

        for i in 0..200 {
            let dir = if i % 2 == 0 {
                Direction::Forward
            } else {
                Direction::Backward
            };
            ch.run(dir, 1.0, true).unwrap();

            if i % 10 == 0 {
                ch.stop().unwrap();
                ch.start().unwrap();
            }
        }

        assert_eq!(*bridge.borrow(), [0, 255]);
    }
}
