//! Programmable interval timer, channel 0.

pub const PIT_CLOCK_OSC: u32 = 1_193_182;

pub const COMMAND_PORT: u16 = 0x43;
pub const CHANNEL0_PORT: u16 = 0x40;

/// Channel 0, low/high byte access, mode 3 (square wave), binary.
pub const SQUARE_WAVE_COMMAND: u8 = 0x36;

/// Reload value for a rate of `hz`, clamped to what 16 bits can hold.
pub fn divisor(hz: u32) -> u16 {
    let divisor = PIT_CLOCK_OSC / hz.max(1);
    divisor.clamp(1, u16::MAX as u32) as u16
}
