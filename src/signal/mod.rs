//! # Signals
//!
//! | No. | Signal      | Routed to                    | Default action   |
//! |-----|-------------|------------------------------|------------------|
//! | 0   | `DivZero`   | current process              | halt with 256    |
//! | 1   | `Segfault`  | current process              | halt with 256    |
//! | 2   | `Interrupt` | visible terminal's process   | halt with 1      |
//! | 3   | `Alarm`     | visible terminal's process   | ignore           |
//! | 4   | `User1`     | current process              | ignore           |
//!
//! Delivery happens only on the way back to user mode. Picking a signal
//! clears every pending flag and blocks every signal; the previous mask comes
//! back once the handler finishes, immediately for default handlers and at
//! `sigreturn` for user handlers.

pub mod delivery;

use crate::config::{EXCEPTION_STATUS, SIGNAL_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    DivZero = 0,
    Segfault = 1,
    Interrupt = 2,
    Alarm = 3,
    User1 = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Terminate(u32),
    Ignore,
}

impl Signal {
    pub const ALL: [Signal; SIGNAL_COUNT] = [
        Signal::DivZero,
        Signal::Segfault,
        Signal::Interrupt,
        Signal::Alarm,
        Signal::User1,
    ];

    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.get(number as usize).copied()
    }

    pub fn number(self) -> u32 {
        self as u32
    }

    /// Console-generated signals go to whoever owns the visible terminal.
    pub fn targets_foreground(self) -> bool {
        matches!(self, Signal::Interrupt | Signal::Alarm)
    }

    pub fn default_action(self) -> DefaultAction {
        match self {
            Signal::DivZero | Signal::Segfault => DefaultAction::Terminate(EXCEPTION_STATUS),
            Signal::Interrupt => DefaultAction::Terminate(1),
            Signal::Alarm | Signal::User1 => DefaultAction::Ignore,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Default,
    /// User-mode entry point.
    User(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalState {
    pending: [bool; SIGNAL_COUNT],
    blocked: [bool; SIGNAL_COUNT],
    saved_blocked: [bool; SIGNAL_COUNT],
    handlers: [Handler; SIGNAL_COUNT],
    delivering: bool,
}

impl SignalState {
    pub const fn new() -> Self {
        Self {
            pending: [false; SIGNAL_COUNT],
            blocked: [false; SIGNAL_COUNT],
            saved_blocked: [false; SIGNAL_COUNT],
            handlers: [Handler::Default; SIGNAL_COUNT],
            delivering: false,
        }
    }

    pub fn raise(&mut self, signal: Signal) {
        self.pending[signal as usize] = true;
    }

    pub fn is_pending(&self, signal: Signal) -> bool {
        self.pending[signal as usize]
    }

    pub fn is_blocked(&self, signal: Signal) -> bool {
        self.blocked[signal as usize]
    }

    pub fn in_delivery(&self) -> bool {
        self.delivering
    }

    pub fn handler(&self, signal: Signal) -> Handler {
        self.handlers[signal as usize]
    }

    pub fn set_handler(&mut self, signal: Signal, handler: Handler) {
        self.handlers[signal as usize] = handler;
    }

    /// Selects the lowest unblocked pending signal and enters delivery.
    pub fn begin_delivery(&mut self) -> Option<(Signal, Handler)> {
        let signal = Signal::ALL
            .into_iter()
            .find(|s| self.pending[*s as usize] && !self.blocked[*s as usize])?;
        self.saved_blocked = self.blocked;
        self.pending = [false; SIGNAL_COUNT];
        self.blocked = [true; SIGNAL_COUNT];
        self.delivering = true;
        Some((signal, self.handler(signal)))
    }

    /// Restores the mask saved by `begin_delivery`. Returns false if no
    /// delivery was in progress.
    pub fn end_delivery(&mut self) -> bool {
        if !self.delivering {
            return false;
        }
        self.blocked = self.saved_blocked;
        self.delivering = false;
        true
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}
