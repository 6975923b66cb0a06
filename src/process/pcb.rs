//! Process control block.

use super::fd::FdTable;
use super::Pid;
use crate::config::ARG_LEN;
use crate::signal::SignalState;
use crate::trap::SavedContext;

#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub pid: Pid,
    /// `None` for the first shell of a terminal.
    pub parent: Option<Pid>,
    pub terminal: usize,
    pub files: FdTable,
    /// Where `execute` or a preempted tick left this process.
    pub context: SavedContext,
    pub has_vidmap: bool,
    pub signals: SignalState,
    args: [u8; ARG_LEN],
    args_len: usize,
}

impl Pcb {
    pub const fn empty() -> Self {
        Self {
            pid: Pid::new(0),
            parent: None,
            terminal: 0,
            files: FdTable::empty(),
            context: SavedContext::empty(),
            has_vidmap: false,
            signals: SignalState::new(),
            args: [0; ARG_LEN],
            args_len: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn args(&self) -> &[u8] {
        &self.args[..self.args_len]
    }

    /// Stores at most `ARG_LEN` bytes of `args`.
    pub fn set_args(&mut self, args: &[u8]) {
        let len = args.len().min(ARG_LEN);
        self.args[..len].copy_from_slice(&args[..len]);
        self.args_len = len;
    }
}

impl Default for Pcb {
    fn default() -> Self {
        Self::empty()
    }
}
