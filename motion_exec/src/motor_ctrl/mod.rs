//! # Motor Controller Module
//!
//! Drives the six wheel motors. Each motor has its own H-bridge inputs but all drivers share a
//! single standby line, which has to be held high for any motor to move.
//!
//! The standby line is derived state: it is asserted if and only if at least one channel is
//! enabled with a nonzero speed. It is recomputed after every single channel mutation, so it is
//! never low while a motor is meant to be driving, and never high with every motor idle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod channel;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use crate::hal::{DigitalOutput, HwError, PwmOutput};
use motion_if::{Direction, NUM_MOTORS};

pub use channel::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MotorBank<P, S> {
    channels: [MotorChannel<P>; NUM_MOTORS],

    standby: S,

    /// Last level successfully written to the standby line
    driver_enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P, S> MotorBank<P, S>
where
    P: PwmOutput,
    S: DigitalOutput,
{
    /// Create a new bank, putting the drivers in standby and every motor in coast.
    ///
    /// ## Arguments
    /// - `legs` - The (A, B) PWM outputs of each motor's H-bridge
    /// - `standby` - The shared standby line
    /// - `resolution_bits` - PWM resolution of the legs
    pub fn new(
        legs: [(P, P); NUM_MOTORS],
        standby: S,
        resolution_bits: u8,
    ) -> Result<Self, HwError> {
        let mut bank = Self {
            channels: legs.map(|(a, b)| MotorChannel::new(a, b, resolution_bits)),
            standby,
            driver_enabled: false,
        };

        bank.standby.set_asserted(false)?;

        for ch in bank.channels.iter_mut() {
            ch.stop()?;
        }

        debug!("Motor bank initialised ({} channels)", NUM_MOTORS);

        Ok(bank)
    }

    /// Run one motor. Invalid indexes are ignored.
    pub fn run(
        &mut self,
        index: usize,
        direction: Direction,
        speed: f32,
        auto_enable: bool,
    ) -> Result<(), HwError> {
        self.with_channel(index, |ch| ch.run(direction, speed, auto_enable))
    }

    /// Run every motor with the same direction and speed.
    pub fn run_all(
        &mut self,
        direction: Direction,
        speed: f32,
        auto_enable: bool,
    ) -> Result<(), HwError> {
        for index in 0..NUM_MOTORS {
            self.run(index, direction, speed, auto_enable)?;
        }
        Ok(())
    }

    /// Resume one motor with its stored direction and speed. Invalid indexes are ignored.
    pub fn start(&mut self, index: usize) -> Result<(), HwError> {
        self.with_channel(index, |ch| ch.start())
    }

    /// Resume every motor.
    pub fn start_all(&mut self) -> Result<(), HwError> {
        for index in 0..NUM_MOTORS {
            self.start(index)?;
        }
        Ok(())
    }

    /// Stop (coast) one motor. Invalid indexes are ignored.
    pub fn stop(&mut self, index: usize) -> Result<(), HwError> {
        self.with_channel(index, |ch| ch.stop())
    }

    /// Stop (coast) every motor.
    pub fn stop_all(&mut self) -> Result<(), HwError> {
        for index in 0..NUM_MOTORS {
            self.stop(index)?;
        }
        Ok(())
    }

    /// Get a channel, or `None` if the index is out of range.
    pub fn channel(&self, index: usize) -> Option<&MotorChannel<P>> {
        self.channels.get(index)
    }

    /// Whether the shared standby line is currently asserted.
    pub fn driver_enabled(&self) -> bool {
        self.driver_enabled
    }

    /// Access the standby line hardware.
    pub fn standby(&self) -> &S {
        &self.standby
    }

    /// True if any channel wants the drivers out of standby.
    pub fn any_driving(&self) -> bool {
        self.channels.iter().any(|ch| ch.is_driving())
    }

    /// Recompute the shared standby line from every channel.
    ///
    /// The line is only written when the decision changes.
    pub fn update_standby(&mut self) -> Result<(), HwError> {
        let wanted = self.any_driving();

        if wanted != self.driver_enabled {
            self.standby.set_asserted(wanted)?;
            self.driver_enabled = wanted;
            debug!(
                "Motor drivers {}",
                if wanted { "enabled" } else { "in standby" }
            );
        }

        Ok(())
    }

    /// Apply `op` to one channel then recompute the standby line, even if `op` failed.
    fn with_channel<F>(&mut self, index: usize, op: F) -> Result<(), HwError>
    where
        F: FnOnce(&mut MotorChannel<P>) -> Result<(), HwError>,
    {
        let ch = match self.channels.get_mut(index) {
            Some(ch) => ch,
            None => {
                warn!("Ignoring command for invalid motor index {}", index);
                return Ok(());
            }
        };

        let op_result = op(ch);
        let standby_result = self.update_standby();

        op_result.and(standby_result)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::sim::{self, SimPin, SimPwm};

    fn bank() -> MotorBank<SimPwm, SimPin> {
        MotorBank::new(sim::motor_legs(), SimPin::new("standby"), 8).unwrap()
    }

    fn assert_standby_consistent(bank: &MotorBank<SimPwm, SimPin>) {
        let expected = (0..NUM_MOTORS).any(|i| {
            let ch = bank.channel(i).unwrap();
            ch.output_enabled() && ch.target_speed() > 0.0
        });

        assert_eq!(bank.driver_enabled(), expected);
        assert_eq!(bank.standby().is_asserted(), expected);
    }

    #[test]
    fn test_init() {
        let bank = bank();

        assert!(!bank.driver_enabled());
        assert!(!bank.standby().is_asserted());
        for i in 0..NUM_MOTORS {
            let ch = bank.channel(i).unwrap();
            assert!(!ch.output_enabled());
            assert_eq!(ch.target_speed(), 0.0);
            assert_eq!(ch.legs().0.writes(), 1);
            assert_eq!(ch.legs().1.writes(), 1);
        }
        assert!(bank.channel(NUM_MOTORS).is_none());
    }

    #[test]
    fn test_standby_follows_channels() {
        let mut bank = bank();

        bank.run(2, Direction::Forward, 0.5, true).unwrap();
        assert!(bank.standby().is_asserted());

        bank.run(4, Direction::Backward, 0.3, true).unwrap();
        bank.stop(2).unwrap();
        // Motor 4 still drives
        assert!(bank.standby().is_asserted());

        bank.stop(4).unwrap();
        assert!(!bank.standby().is_asserted());

        // Enabled but at zero speed does not need the drivers
        bank.run(1, Direction::Forward, 0.0, true).unwrap();
        bank.start(1).unwrap();
        assert!(bank.channel(1).unwrap().output_enabled());
        assert!(!bank.standby().is_asserted());

        bank.start(2).unwrap();
        assert!(bank.standby().is_asserted());
        assert_eq!(bank.channel(2).unwrap().leg_duties(), (128, 0));
    }

    #[test]
    fn test_all_variants() {
        let mut bank = bank();

        bank.run_all(Direction::Backward, 1.0, true).unwrap();
        for i in 0..NUM_MOTORS {
            assert_eq!(bank.channel(i).unwrap().leg_duties(), (0, 255));
        }
        assert!(bank.driver_enabled());

        bank.stop_all().unwrap();
        for i in 0..NUM_MOTORS {
            assert_eq!(bank.channel(i).unwrap().leg_duties(), (0, 0));
        }
        assert!(!bank.driver_enabled());

        bank.start_all().unwrap();
        assert!(bank.driver_enabled());
        assert_eq!(bank.channel(5).unwrap().leg_duties(), (0, 255));
    }

    #[test]
    fn test_invalid_index_is_ignored() {
        let mut bank = bank();

        bank.run(NUM_MOTORS, Direction::Forward, 1.0, true).unwrap();
        bank.start(99).unwrap();
        bank.stop(usize::MAX).unwrap();

        assert!(!bank.driver_enabled());
        assert_eq!(bank.standby().writes(), 1);
    }

    #[test]
    fn test_standby_line_only_written_on_change() {
        let mut bank = bank();

        bank.run(0, Direction::Forward, 0.5, true).unwrap();
        bank.run(1, Direction::Forward, 0.5, true).unwrap();
        bank.run(0, Direction::Forward, 0.7, true).unwrap();
        assert_eq!(bank.standby().writes(), 2);
    }

    #[test]
    fn test_standby_invariant_after_every_mutation() {
        let mut bank = bank();

        let mut seed: u32 = 42;
        for _ in 0..5000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let index = ((seed >> 4) % (NUM_MOTORS as u32 + 1)) as usize;
            let direction = if seed & 0x100 == 0 {
                Direction::Forward
            } else {
                Direction::Backward
            };
            // Roughly a third of runs are at zero speed
            let speed = (((seed >> 12) % 30) as f32 / 20.0 - 0.5).max(0.0);

            match (seed >> 24) % 7 {
                0 => bank.stop(index).unwrap(),
                1 => bank.start(index).unwrap(),
                2 => bank.run(index, direction, speed, false).unwrap(),
                3 => bank.stop_all().unwrap(),
                _ => bank.run(index, direction, speed, true).unwrap(),
            }

            assert_standby_consistent(&bank);

            for i in 0..NUM_MOTORS {
                let (a, b) = bank.channel(i).unwrap().legs();
                assert!(a.duty() == 0 || b.duty() == 0);
            }
        }
    }
}
