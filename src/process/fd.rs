//! Per-process descriptor tables.
//!
//! Slots 0 and 1 are the owning terminal's input and output for the whole
//! life of the process. `open` hands out slots 2 through 7.

use crate::config::{FD_TABLE_SIZE, FIRST_FREE_FD};
use crate::syscalls::SyscallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Input,
    Output,
}

/// What an open descriptor refers to. Read and write dispatch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Terminal(Stream),
    RealTimeClock,
    RegularFile { inode: u32 },
    Directory,
    Sound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub kind: FileKind,
    /// Byte offset for regular files, entry index for the directory.
    pub position: u32,
}

impl OpenFile {
    pub const fn new(kind: FileKind) -> Self {
        Self { kind, position: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdTable {
    slots: [Option<OpenFile>; FD_TABLE_SIZE],
}

impl FdTable {
    pub const fn empty() -> Self {
        Self {
            slots: [None; FD_TABLE_SIZE],
        }
    }

    /// Table with only the terminal pair open.
    pub const fn for_terminal() -> Self {
        let mut table = Self::empty();
        table.slots[0] = Some(OpenFile::new(FileKind::Terminal(Stream::Input)));
        table.slots[1] = Some(OpenFile::new(FileKind::Terminal(Stream::Output)));
        table
    }

    pub fn get(&self, fd: u32) -> Result<&OpenFile, SyscallError> {
        self.slots
            .get(fd as usize)
            .and_then(Option::as_ref)
            .ok_or(SyscallError::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: u32) -> Result<&mut OpenFile, SyscallError> {
        self.slots
            .get_mut(fd as usize)
            .and_then(Option::as_mut)
            .ok_or(SyscallError::BadDescriptor)
    }

    /// Places `file` in the lowest free slot from 2 up.
    pub fn install(&mut self, file: OpenFile) -> Result<u32, SyscallError> {
        let (fd, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .skip(FIRST_FREE_FD)
            .find(|(_, slot)| slot.is_none())
            .ok_or(SyscallError::NoFreeDescriptor)?;
        *slot = Some(file);
        Ok(fd as u32)
    }

    /// Closes `fd`. The terminal pair cannot be closed.
    pub fn close(&mut self, fd: u32) -> Result<OpenFile, SyscallError> {
        if (fd as usize) < FIRST_FREE_FD {
            return Err(SyscallError::BadDescriptor);
        }
        self.slots
            .get_mut(fd as usize)
            .and_then(Option::take)
            .ok_or(SyscallError::BadDescriptor)
    }

    pub fn close_all(&mut self) {
        self.slots = [None; FD_TABLE_SIZE];
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::empty()
    }
}
