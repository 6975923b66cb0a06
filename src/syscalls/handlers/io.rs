//! # I/O System Call Handlers
//!
//! Descriptor operations for user processes. What a call does depends on
//! the kind of object behind the descriptor:
//!
//! | Kind       | read                          | write                    |
//! |------------|-------------------------------|--------------------------|
//! | stdin (0)  | one line, waits for Enter     | fails                    |
//! | stdout (1) | fails                         | renders on the terminal  |
//! | RTC        | waits for the next tick       | sets the rate (4 bytes)  |
//! | file       | bytes from the file position  | fails                    |
//! | directory  | next file name, 0 at the end  | fails                    |
//! | sound      | returns 0                     | plays or stops (4 bytes) |

use crate::arch::Machine;
use crate::config::{COPY_CHUNK, LINE_BUFFER_LEN};
use crate::devices::speaker::{self, SpeakerCommand, SOUND_DEVICE};
use crate::fs::{FileType, FsError, NAME_LEN};
use crate::kernel::Kernel;
use crate::memory::{check_user_range, copy_from_user, copy_to_user, read_user_cstr};
use crate::process::{FileKind, OpenFile, Stream};
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};
use core::task::Poll;

/// Read from file descriptor
pub fn sys_read(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    fd: u32,
    buf: u32,
    nbytes: u32,
) -> Poll<SyscallResult> {
    let (file, tid) = match kernel.current_pcb() {
        Ok(pcb) => match pcb.files.get(fd) {
            Ok(file) => (*file, pcb.terminal),
            Err(err) => return Poll::Ready(Err(err)),
        },
        Err(err) => return Poll::Ready(Err(err)),
    };
    if let Err(err) = check_user_range(buf, nbytes as usize) {
        return Poll::Ready(Err(err.into()));
    }

    match file.kind {
        FileKind::Terminal(Stream::Input) => {
            let mut line = [0u8; LINE_BUFFER_LEN];
            let want = (nbytes as usize).min(LINE_BUFFER_LEN);
            kernel.terminals[tid].take_line(&mut line[..want]).map(|n| -> SyscallResult {
                copy_to_user(machine, &kernel.memory, buf, &line[..n])?;
                Ok(n as i32)
            })
        }
        FileKind::RealTimeClock => {
            if kernel.terminals[tid].rtc.take_tick() {
                Poll::Ready(Ok(0))
            } else {
                Poll::Pending
            }
        }
        FileKind::RegularFile { inode } => {
            Poll::Ready(read_file(kernel, machine, fd, inode, file.position, buf, nbytes))
        }
        FileKind::Directory => {
            Poll::Ready(read_directory(kernel, machine, fd, file.position, buf, nbytes))
        }
        FileKind::Sound => Poll::Ready(Ok(0)),
        FileKind::Terminal(Stream::Output) => Poll::Ready(Err(SyscallError::Unsupported)),
    }
}

fn read_file(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    fd: u32,
    inode: u32,
    position: u32,
    buf: u32,
    nbytes: u32,
) -> SyscallResult {
    let fs = kernel.fs()?;
    let mut chunk = [0u8; COPY_CHUNK];
    let mut done = 0u32;
    while done < nbytes {
        let want = ((nbytes - done) as usize).min(COPY_CHUNK);
        let n = fs
            .read_data(inode, position + done, &mut chunk[..want])
            .map_err(|_| SyscallError::InvalidArgument)?;
        if n == 0 {
            break;
        }
        copy_to_user(machine, &kernel.memory, buf + done, &chunk[..n])?;
        done += n as u32;
    }
    kernel.current_pcb_mut()?.files.get_mut(fd)?.position = position + done;
    Ok(done as i32)
}

fn read_directory(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    fd: u32,
    index: u32,
    buf: u32,
    nbytes: u32,
) -> SyscallResult {
    let dentry = match kernel.fs()?.read_dentry_by_index(index) {
        Ok(dentry) => dentry,
        Err(FsError::BadIndex) => return Ok(0),
        Err(_) => return Err(SyscallError::InvalidArgument),
    };
    let name = dentry.name();
    let n = name.len().min(nbytes as usize);
    copy_to_user(machine, &kernel.memory, buf, &name[..n])?;
    kernel.current_pcb_mut()?.files.get_mut(fd)?.position = index + 1;
    Ok(n as i32)
}

/// Write to file descriptor
pub fn sys_write(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    fd: u32,
    buf: u32,
    nbytes: u32,
) -> SyscallResult {
    let pcb = kernel.current_pcb()?;
    let (file, tid) = (*pcb.files.get(fd)?, pcb.terminal);
    check_user_range(buf, nbytes as usize)?;

    match file.kind {
        FileKind::Terminal(Stream::Output) => {
            let mut chunk = [0u8; COPY_CHUNK];
            let mut done = 0u32;
            while done < nbytes {
                let n = ((nbytes - done) as usize).min(COPY_CHUNK);
                copy_from_user(machine, &kernel.memory, buf + done, &mut chunk[..n])?;
                kernel.terminal_write(machine, tid, &chunk[..n]);
                done += n as u32;
            }
            Ok(nbytes as i32)
        }
        FileKind::RealTimeClock => {
            if nbytes != 4 {
                return Err(SyscallError::InvalidArgument);
            }
            let mut hz = [0u8; 4];
            copy_from_user(machine, &kernel.memory, buf, &mut hz)?;
            kernel.terminals[tid]
                .rtc
                .set_frequency(u32::from_le_bytes(hz))
                .map_err(|_| SyscallError::InvalidArgument)?;
            Ok(0)
        }
        FileKind::Sound => {
            if nbytes != 4 {
                return Err(SyscallError::InvalidArgument);
            }
            let mut word = [0u8; 4];
            copy_from_user(machine, &kernel.memory, buf, &mut word)?;
            match speaker::decode(u32::from_le_bytes(word)) {
                Ok(SpeakerCommand::Play(hz)) => machine.set_speaker(Some(hz)),
                Ok(SpeakerCommand::Stop) => machine.set_speaker(None),
                Err(_) => return Err(SyscallError::InvalidArgument),
            }
            Ok(0)
        }
        FileKind::Terminal(Stream::Input) | FileKind::RegularFile { .. } | FileKind::Directory => {
            Err(SyscallError::Unsupported)
        }
    }
}

/// Open a file by name
pub fn sys_open(kernel: &mut Kernel, machine: &mut dyn Machine, filename: u32) -> SyscallResult {
    let mut name = [0u8; NAME_LEN + 1];
    let len = read_user_cstr(machine, &kernel.memory, filename, &mut name)?;
    let kind = if &name[..len] == SOUND_DEVICE {
        FileKind::Sound
    } else {
        let dentry = kernel
            .fs()?
            .read_dentry_by_name(&name[..len])
            .map_err(|_| SyscallError::NotFound)?;
        match dentry.file_type {
            FileType::Rtc => FileKind::RealTimeClock,
            FileType::Directory => FileKind::Directory,
            FileType::Regular => FileKind::RegularFile {
                inode: dentry.inode,
            },
        }
    };
    let pcb = kernel.current_pcb_mut()?;
    let tid = pcb.terminal;
    let fd = pcb.files.install(OpenFile::new(kind))?;
    if kind == FileKind::RealTimeClock {
        kernel.terminals[tid].rtc.reset();
    }
    Ok(fd as i32)
}

/// Close a file descriptor
pub fn sys_close(kernel: &mut Kernel, fd: u32) -> SyscallResult {
    kernel.current_pcb_mut()?.files.close(fd)?;
    Ok(0)
}
