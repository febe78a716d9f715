//! # Servo Controller Module
//!
//! Drives the six steering servos through a shared 16 channel servo driver. The first
//! [`NUM_SERVOS`] channels of the driver are tracked: they have bounds and can sweep. The
//! remaining driver channels can still be positioned, but the bank keeps no state for them.
//!
//! The driver's output enable line is only touched during bring-up and shutdown. Channel bounds
//! and sweep settings are also fixed at bring-up, from the bank's configuration.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod channel;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::fmt;

// Internal
use crate::hal::{DigitalOutput, HwError, ServoDriver};
use crate::params::ServoParams;
use crate::pulse::{clamp_pulse, PulseTiming, PWM_RESOLUTION};
use motion_if::{NUM_SERVOS, NUM_SERVO_DRIVER_CHANNELS};

pub use channel::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Configuration of the servo bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoBankConfig {
    /// Bounds and sweep settings of every tracked channel, also the bounds of untracked channels
    pub channel: ServoChannelConfig,

    /// Tracked channels with their own bounds and sweep settings
    pub channel_overrides: Vec<(u8, ServoChannelConfig)>,

    pub timing: PulseTiming,

    /// Channel addressed by a sweep command with no range
    pub default_sweep_channel: u8,

    pub telemetry_enabled: bool,

    /// Report one sweep step in this many
    pub telemetry_decimation: u32,
}

/// A sweep position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepTelemetry {
    pub channel: u8,
    pub pulse_us: i32,
}

pub struct ServoBank<D, O> {
    driver: D,
    output_enable: O,

    channels: [ServoChannel; NUM_SERVOS],

    timing: PulseTiming,

    /// Bounds used for untracked driver channels
    passthrough_bounds: (i32, i32),

    default_sweep_channel: u8,

    telemetry_enabled: bool,
    telemetry_decimation: u32,

    outputs_enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl fmt::Display for SweepTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Servo {} pulse: {} us", self.channel, self.pulse_us)
    }
}

impl From<&ServoParams> for ServoBankConfig {
    fn from(p: &ServoParams) -> Self {
        Self {
            channel: ServoChannelConfig {
                min_pulse_us: p.min_pulse_us,
                max_pulse_us: p.max_pulse_us,
                sweep_step_us: p.sweep_step_us,
                sweep_interval_ms: p.sweep_interval_ms,
            },
            channel_overrides: p
                .channels
                .iter()
                .map(|c| {
                    let config = ServoChannelConfig {
                        min_pulse_us: c.min_pulse_us,
                        max_pulse_us: c.max_pulse_us,
                        sweep_step_us: c.sweep_step_us,
                        sweep_interval_ms: c.sweep_interval_ms,
                    };
                    (c.channel, config)
                })
                .collect(),
            timing: PulseTiming::from_frequency(p.frequency_hz, PWM_RESOLUTION),
            default_sweep_channel: p.default_sweep_channel,
            telemetry_enabled: p.telemetry_enabled,
            telemetry_decimation: p.telemetry_decimation,
        }
    }
}

impl Default for ServoBankConfig {
    fn default() -> Self {
        Self::from(&ServoParams::default())
    }
}

impl<D, O> ServoBank<D, O>
where
    D: ServoDriver,
    O: DigitalOutput,
{
    /// Bring up the bank.
    ///
    /// Outputs are disabled while every tracked channel is written with its centre pulse, then
    /// enabled, so the servos never see a stale position from the driver's power-on state.
    ///
    /// A channel with overridden bounds starts at the default centre pulled inside its own bounds.
    pub fn new(driver: D, output_enable: O, config: ServoBankConfig) -> Result<Self, HwError> {
        let mut index = 0;
        let channels = [(); NUM_SERVOS].map(|_| {
            let ch = ServoChannel::new(index, &config.channel);
            index += 1;
            ch
        });

        let mut bank = Self {
            driver,
            output_enable,
            channels,
            timing: config.timing,
            passthrough_bounds: (
                config.channel.min_pulse_us.min(config.channel.max_pulse_us),
                config.channel.min_pulse_us.max(config.channel.max_pulse_us),
            ),
            default_sweep_channel: config.default_sweep_channel,
            telemetry_enabled: config.telemetry_enabled,
            telemetry_decimation: config.telemetry_decimation.max(1),
            outputs_enabled: true,
        };

        for (index, channel_config) in config.channel_overrides.iter() {
            bank.configure_channel(*index as usize, channel_config);
        }

        bank.set_outputs_enabled(false)?;

        for ch in bank.channels.iter() {
            ch.write(&mut bank.driver, &bank.timing)?;
        }

        bank.set_outputs_enabled(true)?;

        info!(
            "Servo bank initialised ({} channels centred, tick = {:.3} us)",
            NUM_SERVOS,
            bank.timing.tick_us()
        );

        Ok(bank)
    }

    /// Advance every sweeping channel.
    ///
    /// A channel whose write fails is logged and left where it was, it retries on the next
    /// update. The other channels carry on regardless.
    ///
    /// ## Returns
    /// The telemetry samples due this tick, empty unless telemetry is enabled.
    pub fn update(&mut self, now_ms: u32) -> Vec<SweepTelemetry> {
        let decimation = if self.telemetry_enabled {
            Some(self.telemetry_decimation)
        } else {
            None
        };

        let mut samples = Vec::new();

        for ch in self.channels.iter_mut() {
            match ch.advance_sweep(&mut self.driver, &self.timing, now_ms, decimation) {
                Ok(Some(pulse_us)) => samples.push(SweepTelemetry {
                    channel: ch.index(),
                    pulse_us,
                }),
                Ok(None) => (),
                Err(e) => warn!("Servo {} sweep step failed: {}", ch.index(), e),
            }
        }

        samples
    }

    /// Replace the bounds and sweep settings of a tracked channel.
    ///
    /// Nothing is written, a pulse pulled inside the new bounds reaches the driver on the
    /// channel's next write.
    pub fn configure_channel(&mut self, channel: usize, config: &ServoChannelConfig) {
        match self.channels.get_mut(channel) {
            Some(ch) => {
                ch.configure_range(config.min_pulse_us, config.max_pulse_us);
                ch.configure_step(config.sweep_step_us, config.sweep_interval_ms);
                debug!(
                    "Servo {} configured: {} to {} us, {} us every {} ms",
                    channel,
                    config.min_pulse_us,
                    config.max_pulse_us,
                    config.sweep_step_us,
                    config.sweep_interval_ms
                );
            }
            None => warn!("Ignoring settings for untracked servo channel {}", channel),
        }
    }

    /// Enable or disable the sweep of a single tracked channel.
    pub fn set_sweep_enabled(&mut self, channel: usize, enabled: bool) {
        match self.channels.get_mut(channel) {
            Some(ch) => ch.set_sweep_enabled(enabled),
            None => warn!("Ignoring sweep for untracked servo channel {}", channel),
        }
    }

    /// Enable or disable the sweep of every channel in `[start, end]`.
    ///
    /// Reversed ranges are swapped, the end is limited to the last tracked channel.
    pub fn set_sweep_range_enabled(&mut self, start: usize, end: usize, enabled: bool) {
        let (start, end) = (start.min(end), start.max(end).min(NUM_SERVOS - 1));

        for channel in start..=end {
            self.set_sweep_enabled(channel, enabled);
        }
    }

    /// Enable or disable the sweep of every tracked channel.
    pub fn set_sweep_all_enabled(&mut self, enabled: bool) {
        self.set_sweep_range_enabled(0, NUM_SERVOS - 1, enabled);
    }

    /// Move a driver channel to a pulse width.
    ///
    /// Tracked channels stop sweeping and become the default sweep channel. Untracked channels
    /// are written directly within the bank's default bounds. Channels the driver doesn't have
    /// are ignored.
    pub fn set_target_microseconds(&mut self, channel: u8, pulse_us: i32) -> Result<(), HwError> {
        let index = channel as usize;

        if let Some(ch) = self.channels.get_mut(index) {
            self.default_sweep_channel = channel;
            return ch.set_target_microseconds(&mut self.driver, &self.timing, pulse_us);
        }

        if index < NUM_SERVO_DRIVER_CHANNELS {
            let (lo, hi) = self.passthrough_bounds;
            let ticks = self.timing.to_ticks(clamp_pulse(pulse_us, lo, hi));
            debug!("Untracked servo channel {} <- {} ticks", channel, ticks);
            return self.driver.set_ticks(channel, ticks);
        }

        warn!("Ignoring pulse for nonexistent servo channel {}", channel);
        Ok(())
    }

    /// Enable or disable the driver's outputs.
    pub fn set_outputs_enabled(&mut self, enabled: bool) -> Result<(), HwError> {
        self.output_enable.set_asserted(enabled)?;
        self.outputs_enabled = enabled;
        debug!(
            "Servo outputs {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn set_telemetry_enabled(&mut self, enabled: bool) {
        self.telemetry_enabled = enabled;
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    pub fn outputs_enabled(&self) -> bool {
        self.outputs_enabled
    }

    pub fn default_sweep_channel(&self) -> u8 {
        self.default_sweep_channel
    }

    /// Get a tracked channel, or `None` if the index is out of range.
    pub fn channel(&self, index: usize) -> Option<&ServoChannel> {
        self.channels.get(index)
    }

    pub fn timing(&self) -> &PulseTiming {
        &self.timing
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn output_enable(&self) -> &O {
        &self.output_enable
    }

    /// Stop every sweep and disable the outputs.
    pub fn shutdown(&mut self) -> Result<(), HwError> {
        self.set_sweep_all_enabled(false);
        self.set_outputs_enabled(false)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::sim::{SimPin, SimServoDriver};

    fn bank() -> ServoBank<SimServoDriver, SimPin> {
        ServoBank::new(SimServoDriver::new(), SimPin::new("oe"), ServoBankConfig::default())
            .unwrap()
    }

    #[test]
    fn test_bring_up() {
        let bank = bank();
        let centre = bank.timing().to_ticks(1500);

        for i in 0..NUM_SERVOS as u8 {
            assert_eq!(bank.driver().ticks(i), Some(centre));
            assert_eq!(bank.channel(i as usize).unwrap().current_pulse_us(), 1500);
        }
        // Untracked channels are left alone
        assert_eq!(bank.driver().ticks(NUM_SERVOS as u8), None);

        // Disabled then enabled
        assert!(bank.output_enable().is_asserted());
        assert_eq!(bank.output_enable().writes(), 2);
        assert!(bank.outputs_enabled());
    }

    #[test]
    fn test_config_from_params() {
        let mut p = ServoParams::default();
        p.frequency_hz = 100;
        p.sweep_step_us = 20;

        let c = ServoBankConfig::from(&p);
        assert_eq!(c.timing.period_us, 10_000);
        assert_eq!(c.channel.sweep_step_us, 20);
        assert_eq!(c.telemetry_decimation, 5);
        assert!(c.channel_overrides.is_empty());
    }

    #[test]
    fn test_channel_overrides() {
        let mut config = ServoBankConfig::default();
        let narrow = ServoChannelConfig {
            min_pulse_us: 1600,
            max_pulse_us: 1800,
            sweep_step_us: 50,
            sweep_interval_ms: 10,
        };
        config.channel_overrides.push((1, narrow));

        let mut bank =
            ServoBank::new(SimServoDriver::new(), SimPin::new("oe"), config).unwrap();
        let timing = *bank.timing();

        // Written at bring-up already inside its own bounds
        assert_eq!(bank.channel(1).unwrap().bounds(), (1600, 1800));
        assert_eq!(bank.channel(1).unwrap().current_pulse_us(), 1600);
        assert_eq!(bank.driver().ticks(1), Some(timing.to_ticks(1600)));
        assert_eq!(bank.channel(0).unwrap().bounds(), (1000, 2000));

        bank.set_sweep_enabled(1, true);
        for t in 0..6 {
            bank.update(t * 10);
        }
        assert_eq!(bank.channel(1).unwrap().current_pulse_us(), 1700);

        bank.set_target_microseconds(1, 1900).unwrap();
        assert_eq!(bank.channel(1).unwrap().current_pulse_us(), 1800);

        // Untracked channels can't be configured
        bank.configure_channel(NUM_SERVOS, &narrow);
    }

    #[test]
    fn test_only_sweeping_channels_move() {
        let mut bank = bank();
        bank.set_sweep_enabled(2, true);
        bank.set_sweep_enabled(4, true);

        for t in 0..10 {
            bank.update(t * 50);
        }

        for i in 0..NUM_SERVOS {
            let p = bank.channel(i).unwrap().current_pulse_us();
            if i == 2 || i == 4 {
                assert_eq!(p, 1600);
            } else {
                assert_eq!(p, 1500);
            }
        }
    }

    #[test]
    fn test_sweep_range_swapped_and_clamped() {
        let mut bank = bank();

        bank.set_sweep_range_enabled(9, 3, true);
        for i in 0..NUM_SERVOS {
            assert_eq!(bank.channel(i).unwrap().sweep().enabled, i >= 3);
        }

        bank.set_sweep_all_enabled(false);
        for i in 0..NUM_SERVOS {
            assert!(!bank.channel(i).unwrap().sweep().enabled);
        }

        // Out of range single channel is ignored
        bank.set_sweep_enabled(NUM_SERVOS, true);
    }

    #[test]
    fn test_telemetry() {
        let mut bank = bank();
        bank.set_sweep_range_enabled(0, 1, true);

        let mut samples = Vec::new();
        for t in 0..10 {
            samples.extend(bank.update(t * 50));
        }

        // Two channels, one report every five steps each
        assert_eq!(samples.len(), 4);
        assert_eq!(
            samples[0],
            SweepTelemetry {
                channel: 0,
                pulse_us: 1550
            }
        );
        assert_eq!(samples[1].channel, 1);

        bank.set_telemetry_enabled(false);
        for t in 10..30 {
            assert!(bank.update(t * 50).is_empty());
        }
        assert_eq!(bank.channel(0).unwrap().current_pulse_us(), 1800);
    }

    #[test]
    fn test_target_tracked_and_passthrough() {
        let mut bank = bank();
        let timing = *bank.timing();

        bank.set_sweep_enabled(3, true);
        bank.set_target_microseconds(3, 1200).unwrap();
        assert!(!bank.channel(3).unwrap().sweep().enabled);
        assert_eq!(bank.channel(3).unwrap().current_pulse_us(), 1200);
        assert_eq!(bank.default_sweep_channel(), 3);

        // Passthrough is clamped to the default bounds
        bank.set_target_microseconds(12, 2500).unwrap();
        assert_eq!(bank.driver().ticks(12), Some(timing.to_ticks(2000)));
        assert_eq!(bank.default_sweep_channel(), 3);

        // Beyond the driver is a no-op
        let writes = bank.driver().writes();
        bank.set_target_microseconds(16, 1500).unwrap();
        assert_eq!(bank.driver().writes(), writes);
    }

    #[test]
    fn test_hardware_failure_propagates() {
        let mut bank = bank();
        bank.driver_mut().fail_writes = true;

        assert!(bank.set_target_microseconds(0, 1200).is_err());
        assert_eq!(bank.channel(0).unwrap().current_pulse_us(), 1500);
    }

    #[test]
    fn test_sweep_fault_on_one_channel() {
        let mut bank = bank();
        let timing = *bank.timing();
        bank.set_sweep_all_enabled(true);
        bank.driver_mut().fail_channel = Some(0);

        let mut samples = Vec::new();
        for t in 0..5 {
            samples.extend(bank.update(t * 50));
        }

        // The failing channel stays where the hardware is
        assert_eq!(bank.channel(0).unwrap().current_pulse_us(), 1500);
        assert_eq!(bank.driver().ticks(0), Some(timing.to_ticks(1500)));

        // Every other channel keeps sweeping and reporting
        for i in 1..NUM_SERVOS {
            assert_eq!(bank.channel(i).unwrap().current_pulse_us(), 1550);
            assert_eq!(bank.driver().ticks(i as u8), Some(timing.to_ticks(1550)));
        }
        assert_eq!(samples.len(), NUM_SERVOS - 1);
        assert!(samples.iter().all(|s| s.channel != 0));

        // Once the fault clears the channel resumes from its last good position
        bank.driver_mut().fail_channel = None;
        bank.update(250);
        assert_eq!(bank.channel(0).unwrap().current_pulse_us(), 1510);
    }

    #[test]
    fn test_shutdown() {
        let mut bank = bank();
        bank.set_sweep_all_enabled(true);

        bank.shutdown().unwrap();
        assert!(!bank.output_enable().is_asserted());
        assert!(!bank.outputs_enabled());
        for i in 0..NUM_SERVOS {
            assert!(!bank.channel(i).unwrap().sweep().enabled);
        }
    }
}
