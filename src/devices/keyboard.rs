//! # PS/2 Keyboard Decoding
//!
//! Turns scancode set 1 bytes from port `0x60` into [`KeyEvent`]s.
//!
//! ```text
//! IRQ1 ─▶ port 0x60 ─▶ ScancodeDecoder ─▶ KeyEvent ─▶ visible terminal
//!                       - 0xE0 prefix
//!                       - Shift / Ctrl / Alt / Caps Lock
//!                       - F1..F3
//! ```
//!
//! Bit 7 of a scancode marks a key release. Only modifier releases matter;
//! every other release is dropped.

const EXTENDED_PREFIX: u8 = 0xE0;
const RELEASE_BIT: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2A;
const RIGHT_SHIFT: u8 = 0x36;
const CTRL: u8 = 0x1D;
const ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3A;
const F1: u8 = 0x3B;
const F3: u8 = 0x3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable ASCII byte.
    Char(u8),
    Enter,
    Backspace,
    /// F1 is `Function(1)`.
    Function(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

pub struct ScancodeDecoder {
    is_extended: bool,
    shift_pressed: bool,
    ctrl_pressed: bool,
    alt_pressed: bool,
    caps_lock: bool,
}

impl ScancodeDecoder {
    pub const fn new() -> Self {
        Self {
            is_extended: false,
            shift_pressed: false,
            ctrl_pressed: false,
            alt_pressed: false,
            caps_lock: false,
        }
    }

    pub fn process_scancode(&mut self, scancode: u8) -> Option<KeyEvent> {
        if scancode == EXTENDED_PREFIX {
            self.is_extended = true;
            return None;
        }

        let is_release = scancode & RELEASE_BIT != 0;
        let key_code = scancode & !RELEASE_BIT;

        // Right Ctrl and Right Alt arrive as E0 1D / E0 38; other extended
        // keys (arrows, keypad) have no meaning here.
        if core::mem::take(&mut self.is_extended) && key_code != CTRL && key_code != ALT {
            return None;
        }

        match key_code {
            LEFT_SHIFT | RIGHT_SHIFT => {
                self.shift_pressed = !is_release;
                return None;
            }
            CTRL => {
                self.ctrl_pressed = !is_release;
                return None;
            }
            ALT => {
                self.alt_pressed = !is_release;
                return None;
            }
            _ => {}
        }

        if is_release {
            return None;
        }

        let key = match key_code {
            CAPS_LOCK => {
                self.caps_lock = !self.caps_lock;
                return None;
            }
            F1..=F3 => Key::Function(key_code - F1 + 1),
            0x1C => Key::Enter,
            0x0E => Key::Backspace,
            _ => Key::Char(self.scancode_to_char(key_code)?),
        };

        Some(KeyEvent {
            key,
            ctrl: self.ctrl_pressed,
            alt: self.alt_pressed,
            shift: self.shift_pressed,
        })
    }

    fn scancode_to_char(&self, scancode: u8) -> Option<u8> {
        const LETTERS: [(u8, u8); 26] = [
            (0x10, b'q'), (0x11, b'w'), (0x12, b'e'), (0x13, b'r'), (0x14, b't'),
            (0x15, b'y'), (0x16, b'u'), (0x17, b'i'), (0x18, b'o'), (0x19, b'p'),
            (0x1E, b'a'), (0x1F, b's'), (0x20, b'd'), (0x21, b'f'), (0x22, b'g'),
            (0x23, b'h'), (0x24, b'j'), (0x25, b'k'), (0x26, b'l'), (0x2C, b'z'),
            (0x2D, b'x'), (0x2E, b'c'), (0x2F, b'v'), (0x30, b'b'), (0x31, b'n'),
            (0x32, b'm'),
        ];

        if let Some(&(_, letter)) = LETTERS.iter().find(|(code, _)| *code == scancode) {
            // Caps Lock and Shift cancel out on letters.
            let upper = self.shift_pressed != self.caps_lock;
            return Some(if upper { letter.to_ascii_uppercase() } else { letter });
        }

        let shift = self.shift_pressed;
        let ch = match scancode {
            0x02..=0x0B => {
                let digit = if scancode == 0x0B { b'0' } else { scancode - 0x02 + b'1' };
                if shift {
                    b")!@#$%^&*("[(digit - b'0') as usize]
                } else {
                    digit
                }
            }
            0x39 => b' ',
            0x0F => b'\t',
            0x1A => if shift { b'{' } else { b'[' },
            0x1B => if shift { b'}' } else { b']' },
            0x27 => if shift { b':' } else { b';' },
            0x28 => if shift { b'"' } else { b'\'' },
            0x29 => if shift { b'~' } else { b'`' },
            0x2B => if shift { b'|' } else { b'\\' },
            0x33 => if shift { b'<' } else { b',' },
            0x34 => if shift { b'>' } else { b'.' },
            0x35 => if shift { b'?' } else { b'/' },
            0x0C => if shift { b'_' } else { b'-' },
            0x0D => if shift { b'+' } else { b'=' },
            _ => return None,
        };
        Some(ch)
    }
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}
