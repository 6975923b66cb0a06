//! PC speaker, driven by PIT channel 2.
//!
//! A write to the sound device is one little-endian word:
//!
//! | Bits  | Meaning                          |
//! |-------|----------------------------------|
//! | 0-7   | frequency in Hz, 1 to 255        |
//! | 8-15  | 0 plays the tone, 1 silences it  |
//!
//! Higher bits are ignored.

/// Name `open` resolves to the speaker instead of a file.
pub const SOUND_DEVICE: &[u8] = b"sound";

pub const CHANNEL2_PORT: u16 = 0x42;
pub const SPEAKER_PORT: u16 = 0x61;

/// Channel 2, low/high byte access, mode 3 (square wave), binary.
pub const CHANNEL2_SQUARE_WAVE: u8 = 0xB6;

/// Timer 2 gate and speaker data bits of `SPEAKER_PORT`.
pub const SPEAKER_GATE: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerCommand {
    Play(u32),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCommand;

pub fn decode(word: u32) -> Result<SpeakerCommand, InvalidCommand> {
    let hz = word & 0xFF;
    match (word >> 8) & 0xFF {
        0 if hz != 0 => Ok(SpeakerCommand::Play(hz)),
        1 => Ok(SpeakerCommand::Stop),
        _ => Err(InvalidCommand),
    }
}

/// Port 0x61 value with the speaker connected or not.
pub fn gate(port: u8, on: bool) -> u8 {
    if on {
        port | SPEAKER_GATE
    } else {
        port & !SPEAKER_GATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(decode(0x00_DC), Ok(SpeakerCommand::Play(220)));
        assert_eq!(decode(0x01_00), Ok(SpeakerCommand::Stop));
        assert_eq!(decode(0x01_DC), Ok(SpeakerCommand::Stop));
        assert_eq!(decode(0xFFFF_00_80), Ok(SpeakerCommand::Play(128)));
        assert_eq!(decode(0x00_00), Err(InvalidCommand));
        assert_eq!(decode(0x02_DC), Err(InvalidCommand));
    }

    #[test]
    fn test_gate_keeps_other_bits() {
        assert_eq!(gate(0xB0, true), 0xB3);
        assert_eq!(gate(0xB3, false), 0xB0);
        assert_eq!(gate(0x02, true), 0x03);
    }
}
