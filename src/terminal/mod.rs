//! # Virtual Terminals
//!
//! Three terminals share one keyboard and one live text page. Each keeps a
//! private text page, a cursor and a line buffer; keystrokes always go to
//! the visible one.
//!
//! ```text
//!   IRQ1 ─▶ ScancodeDecoder ─▶ on_scancode ─┬─ Alt+F1..F3 ─▶ switch_terminal
//!                                           ├─ Ctrl+L      ─▶ clear screen
//!                                           ├─ Ctrl+C      ─▶ signal 2
//!                                           └─ text        ─▶ line buffer + echo
//! ```
//!
//! A terminal renders to the live page while visible and to its private
//! page otherwise. Switching swaps page contents so the live page always
//! shows the visible terminal.

pub mod screen;

pub use screen::Screen;
use screen::TAB_WIDTH;

use crate::arch::{copy_page, Machine};
use crate::config::{terminal_text_page, LINE_BUFFER_LEN, TERMINAL_COUNT, VIDEO_MEMORY};
use crate::devices::keyboard::{Key, KeyEvent};
use crate::devices::rtc::RtcSubscription;
use crate::kernel::Kernel;
use crate::process::Pid;
use crate::signal::Signal;
use core::ops::{Index, IndexMut};
use core::task::Poll;
use x86_64::PhysAddr;

pub struct Terminal {
    /// Has been shown at least once; only invoked terminals are scheduled.
    pub invoked: bool,
    pub active: Option<Pid>,
    pub screen: Screen,
    pub rtc: RtcSubscription,
    line: [u8; LINE_BUFFER_LEN],
    line_len: usize,
    enter_pressed: bool,
    interrupted: bool,
}

impl Terminal {
    pub const fn new() -> Self {
        Self {
            invoked: false,
            active: None,
            screen: Screen::new(),
            rtc: RtcSubscription::new(),
            line: [0; LINE_BUFFER_LEN],
            line_len: 0,
            enter_pressed: false,
            interrupted: false,
        }
    }

    /// Makes a blocked terminal read return 0.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    pub fn clear_interrupt(&mut self) {
        self.interrupted = false;
    }

    /// Appends a typed byte, keeping one slot for the newline. Returns
    /// whether the byte was taken.
    pub fn push_byte(&mut self, byte: u8) -> bool {
        if self.enter_pressed || self.line_len + 1 >= LINE_BUFFER_LEN {
            return false;
        }
        self.line[self.line_len] = byte;
        self.line_len += 1;
        true
    }

    /// Removes and returns the last typed byte of an unfinished line.
    pub fn pop_byte(&mut self) -> Option<u8> {
        if self.enter_pressed || self.line_len == 0 {
            return None;
        }
        self.line_len -= 1;
        Some(self.line[self.line_len])
    }

    /// Terminates the line with a newline. Returns false if a completed
    /// line is still waiting for a reader.
    pub fn complete_line(&mut self) -> bool {
        if self.enter_pressed {
            return false;
        }
        self.line[self.line_len] = b'\n';
        self.line_len += 1;
        self.enter_pressed = true;
        true
    }

    pub fn clear_line(&mut self) {
        self.line_len = 0;
        self.enter_pressed = false;
    }

    /// Hands a completed line to a reader, newline included, truncated to
    /// `out.len()`. The whole line is consumed either way.
    pub fn take_line(&mut self, out: &mut [u8]) -> Poll<usize> {
        if self.interrupted {
            self.interrupted = false;
            self.clear_line();
            return Poll::Ready(0);
        }
        if !self.enter_pressed {
            return Poll::Pending;
        }
        let n = out.len().min(self.line_len);
        out[..n].copy_from_slice(&self.line[..n]);
        self.clear_line();
        Poll::Ready(n)
    }

    pub fn pending_input(&self) -> &[u8] {
        &self.line[..self.line_len]
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Terminals {
    terminals: [Terminal; TERMINAL_COUNT],
    visible: usize,
}

impl Terminals {
    pub const fn new() -> Self {
        Self {
            terminals: [const { Terminal::new() }; TERMINAL_COUNT],
            visible: 0,
        }
    }

    /// Blanks the live page and every private page.
    pub fn init(&mut self, machine: &mut dyn Machine) {
        *self = Self::new();
        for tid in 0..TERMINAL_COUNT {
            self.terminals[tid]
                .screen
                .clear(machine, PhysAddr::new(terminal_text_page(tid)));
        }
        self.terminals[0].screen.clear(machine, PhysAddr::new(VIDEO_MEMORY));
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    /// Page terminal `tid` renders to right now.
    pub fn page_of(&self, tid: usize) -> PhysAddr {
        if tid == self.visible {
            PhysAddr::new(VIDEO_MEMORY)
        } else {
            PhysAddr::new(terminal_text_page(tid))
        }
    }
}

impl Default for Terminals {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Terminals {
    type Output = Terminal;

    fn index(&self, tid: usize) -> &Terminal {
        &self.terminals[tid]
    }
}

impl IndexMut<usize> for Terminals {
    fn index_mut(&mut self, tid: usize) -> &mut Terminal {
        &mut self.terminals[tid]
    }
}

impl Kernel {
    /// Keyboard interrupt with the byte read from the data port.
    pub fn on_scancode(&mut self, machine: &mut dyn Machine, scancode: u8) {
        if let Some(event) = self.keyboard.process_scancode(scancode) {
            self.on_key(machine, event);
        }
    }

    fn on_key(&mut self, machine: &mut dyn Machine, event: KeyEvent) {
        let tid = self.terminals.visible();
        let page = PhysAddr::new(VIDEO_MEMORY);

        match event.key {
            Key::Function(n @ 1..=3) if event.alt => {
                self.switch_terminal(machine, n as usize - 1);
            }
            Key::Char(b'l' | b'L') if event.ctrl => {
                let terminal = &mut self.terminals[tid];
                terminal.screen.clear(machine, page);
                terminal.clear_line();
            }
            Key::Char(b'c' | b'C') if event.ctrl => {
                let _ = self.send_signal(Signal::Interrupt.number());
            }
            _ if event.ctrl || event.alt => {}
            Key::Enter => {
                let terminal = &mut self.terminals[tid];
                if terminal.complete_line() {
                    terminal.screen.put_byte(machine, page, b'\n');
                }
            }
            Key::Backspace => {
                let terminal = &mut self.terminals[tid];
                if let Some(byte) = terminal.pop_byte() {
                    let cells = if byte == b'\t' { TAB_WIDTH } else { 1 };
                    for _ in 0..cells {
                        terminal.screen.put_byte(machine, page, b'\x08');
                    }
                }
            }
            Key::Char(byte) => {
                let terminal = &mut self.terminals[tid];
                if terminal.push_byte(byte) {
                    terminal.screen.put_byte(machine, page, byte);
                }
            }
            Key::Function(_) => {}
        }
    }

    /// Brings terminal `tid` to the front. The first switch to a terminal
    /// puts it in the rotation; the scheduler starts its shell.
    pub fn switch_terminal(&mut self, machine: &mut dyn Machine, tid: usize) {
        let old = self.terminals.visible();
        if tid == old || tid >= TERMINAL_COUNT {
            return;
        }
        let live = PhysAddr::new(VIDEO_MEMORY);
        copy_page(machine, live, PhysAddr::new(terminal_text_page(old)));
        copy_page(machine, PhysAddr::new(terminal_text_page(tid)), live);
        self.terminals.visible = tid;
        if !self.terminals[tid].invoked {
            crate::println!("terminal {}: invoked", tid);
            self.terminals[tid].invoked = true;
        }
        // The running process may have just moved on or off screen.
        if let Some(pid) = self.current_pid() {
            self.refresh_video_window(machine, pid);
        }
    }

    /// Renders `bytes` on terminal `tid`.
    pub(crate) fn terminal_write(&mut self, machine: &mut dyn Machine, tid: usize, bytes: &[u8]) {
        let page = self.terminals.page_of(tid);
        self.terminals[tid].screen.write(machine, page, bytes);
    }

    /// Hardware RTC interrupt; advances every terminal's virtual clock.
    pub fn on_rtc_interrupt(&mut self) {
        for tid in 0..TERMINAL_COUNT {
            self.terminals[tid].rtc.on_hardware_tick();
        }
    }
}
