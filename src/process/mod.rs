//! # Processes
//!
//! - [`table`]: the fixed pid pool and the PCB array it indexes
//! - [`pcb`]: per-process bookkeeping
//! - [`fd`]: descriptor tables and open-file kinds
//! - [`exec`]: loading a program into a fresh pid, and tearing it down
//!
//! ## Lifecycle
//!
//! ```text
//!  Idle ─ execute ─▶ Validating ─▶ Loading ─▶ Running ─ halt ─▶ Idle
//!            │ bad name/magic          │
//!            └──── -1, no side effects ┘ pool full
//! ```

pub mod exec;
pub mod fd;
pub mod pcb;
pub mod table;

pub use fd::{FdTable, FileKind, OpenFile, Stream};
pub use pcb::Pcb;
pub use table::{ProcessTable, TableFull};

use core::fmt;

/// Index into the process pool. Valid while its slot is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(usize);

impl Pid {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
