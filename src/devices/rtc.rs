//! Virtual real-time clock.
//!
//! The hardware clock runs at a fixed 1024 Hz. Each terminal gets its own
//! virtual rate by counting hardware ticks, so one program changing its rate
//! does not affect programs on other terminals.

use crate::config::{RTC_BASE_FREQUENCY, RTC_DEFAULT_FREQUENCY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFrequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcSubscription {
    counter: u32,
    frequency: u32,
    ready: bool,
}

impl RtcSubscription {
    pub const fn new() -> Self {
        Self {
            counter: 0,
            frequency: RTC_DEFAULT_FREQUENCY,
            ready: false,
        }
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Back to 2 Hz with no tick outstanding.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Accepts powers of two from 2 to 1024 Hz.
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), InvalidFrequency> {
        if !hz.is_power_of_two() || !(2..=RTC_BASE_FREQUENCY).contains(&hz) {
            return Err(InvalidFrequency);
        }
        self.frequency = hz;
        self.counter = 0;
        self.ready = false;
        Ok(())
    }

    /// Counts one hardware tick.
    pub fn on_hardware_tick(&mut self) {
        self.counter += 1;
        if self.counter >= RTC_BASE_FREQUENCY / self.frequency {
            self.counter = 0;
            self.ready = true;
        }
    }

    /// Consumes a pending virtual tick.
    pub fn take_tick(&mut self) -> bool {
        core::mem::take(&mut self.ready)
    }
}

impl Default for RtcSubscription {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_fires_every_512_ticks() {
        let mut rtc = RtcSubscription::new();
        for _ in 0..511 {
            rtc.on_hardware_tick();
        }
        assert!(!rtc.take_tick());
        rtc.on_hardware_tick();
        assert!(rtc.take_tick());
        assert!(!rtc.take_tick());
    }

    #[test]
    fn test_max_rate_fires_every_tick() {
        let mut rtc = RtcSubscription::new();
        rtc.set_frequency(1024).unwrap();
        rtc.on_hardware_tick();
        assert!(rtc.take_tick());
    }

    #[test]
    fn test_rejects_bad_rates() {
        let mut rtc = RtcSubscription::new();
        for hz in [0, 1, 3, 100, 2048] {
            assert_eq!(rtc.set_frequency(hz), Err(InvalidFrequency));
        }
        assert_eq!(rtc.frequency(), 2);
        rtc.set_frequency(64).unwrap();
        rtc.reset();
        assert_eq!(rtc.frequency(), 2);
    }
}
