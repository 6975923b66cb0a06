//! Program loading and teardown.
//!
//! An executable is a file whose first 40 bytes are a header:
//!
//! | Offset | Size | Field                         |
//! |--------|------|-------------------------------|
//! | 0      | 4    | magic `7F 45 4C 46`           |
//! | 24     | 4    | entry point, little-endian    |
//!
//! The whole file, header included, is copied to `PROGRAM_LOAD_ADDR`.

use super::{FdTable, Pid};
use crate::arch::Machine;
use crate::config::{
    kernel_stack_top, COPY_CHUNK, ENTRY_POINT_OFFSET, EXECUTABLE_HEADER_LEN, EXECUTABLE_MAGIC,
    PROGRAM_LOAD_ADDR, SHELL, USER_STACK_TOP, USER_WINDOW_END,
};
use crate::fs::{FileSystem, FileType};
use crate::kernel::{Completion, Kernel, UserEntry};
use crate::memory::copy_to_user;
use crate::signal::SignalState;
use crate::syscalls::SyscallError;
use crate::trap::SavedContext;

/// Splits a command line into the program name and its argument string.
///
/// Leading spaces are skipped; the name runs to the next space and the rest,
/// trimmed of spaces on both ends, is the argument.
pub fn parse_command(command: &[u8]) -> Result<(&[u8], &[u8]), SyscallError> {
    let command = trim_spaces(command);
    let name_len = command
        .iter()
        .position(|&b| b == b' ')
        .unwrap_or(command.len());
    if name_len == 0 {
        return Err(SyscallError::BadCommand);
    }
    let (name, rest) = command.split_at(name_len);
    Ok((name, trim_spaces(rest)))
}

fn trim_spaces(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executable {
    pub inode: u32,
    pub length: u32,
    pub entry: u32,
}

/// Resolves `name` and checks that it is a loadable program.
pub fn validate(fs: &FileSystem<'_>, name: &[u8]) -> Result<Executable, SyscallError> {
    let dentry = fs
        .read_dentry_by_name(name)
        .map_err(|_| SyscallError::BadCommand)?;
    if dentry.file_type != FileType::Regular {
        return Err(SyscallError::BadCommand);
    }

    let mut header = [0u8; EXECUTABLE_HEADER_LEN];
    let read = fs
        .read_data(dentry.inode, 0, &mut header)
        .map_err(|_| SyscallError::BadCommand)?;
    if read < EXECUTABLE_HEADER_LEN || header[..4] != EXECUTABLE_MAGIC {
        return Err(SyscallError::BadCommand);
    }

    let length = fs
        .file_length(dentry.inode)
        .map_err(|_| SyscallError::BadCommand)?;
    if length > USER_WINDOW_END - PROGRAM_LOAD_ADDR {
        return Err(SyscallError::BadCommand);
    }

    let mut entry = [0u8; 4];
    entry.copy_from_slice(&header[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4]);
    Ok(Executable {
        inode: dentry.inode,
        length,
        entry: u32::from_le_bytes(entry),
    })
}

impl Kernel {
    /// Loads `command` as a new process on terminal `tid`.
    ///
    /// Fails without side effects if the program is not loadable or the pid
    /// pool is exhausted. On success the new process is current on `tid`, its
    /// frame is mapped and its kernel stack installed.
    pub(crate) fn spawn(
        &mut self,
        machine: &mut dyn Machine,
        tid: usize,
        parent: Option<Pid>,
        command: &[u8],
    ) -> Result<UserEntry, SyscallError> {
        let fs = self.fs()?;
        let (name, args) = parse_command(command)?;
        let program = validate(&fs, name)?;
        let pid = self
            .processes
            .allocate()
            .map_err(|_| SyscallError::TooManyProcesses)?;

        let previous = self.terminals[tid].active;
        self.terminals[tid].active = Some(pid);
        self.memory.map_process(machine, pid);

        if let Err(err) = self.load_image(machine, &fs, &program) {
            crate::println!("exec: loading pid {} failed: {:?}", pid, err);
            self.processes.free(pid);
            self.terminals[tid].active = previous;
            if let Some(previous) = previous {
                self.memory.map_process(machine, previous);
            }
            return Err(SyscallError::BadCommand);
        }

        if let Some(pcb) = self.processes.get_mut(pid) {
            pcb.parent = parent;
            pcb.terminal = tid;
            pcb.files = FdTable::for_terminal();
            pcb.context = SavedContext::empty();
            pcb.has_vidmap = false;
            pcb.signals = SignalState::new();
            pcb.set_args(args);
        }
        self.refresh_video_window(machine, pid);

        let kernel_stack_top = kernel_stack_top(machine.kernel_stack_region_end(), pid.index());
        machine.set_kernel_stack(kernel_stack_top);

        Ok(UserEntry {
            pid,
            entry: program.entry,
            user_stack: USER_STACK_TOP,
            kernel_stack_top,
        })
    }

    fn load_image(
        &self,
        machine: &mut dyn Machine,
        fs: &FileSystem<'_>,
        program: &Executable,
    ) -> Result<(), SyscallError> {
        let mut chunk = [0u8; COPY_CHUNK];
        let mut offset = 0u32;
        while offset < program.length {
            let n = fs
                .read_data(program.inode, offset, &mut chunk)
                .map_err(|_| SyscallError::BadCommand)?;
            if n == 0 {
                break;
            }
            copy_to_user(machine, &self.memory, PROGRAM_LOAD_ADDR + offset, &chunk[..n])
                .map_err(|_| SyscallError::BadAddress)?;
            offset += n as u32;
        }
        Ok(())
    }

    /// Ends the current process with `status`.
    ///
    /// A terminal's first shell is never allowed to exit: its pid is recycled
    /// and a new shell starts in its place. Any other process hands control
    /// back to its parent, whose pending `execute` returns `status`.
    pub(crate) fn halt(&mut self, machine: &mut dyn Machine, status: u32) -> Completion {
        let Some(pid) = self.current_pid() else {
            panic!("halt with no current process");
        };
        let Some(pcb) = self.processes.get_mut(pid) else {
            panic!("halt of unallocated pid {}", pid);
        };
        let parent = pcb.parent;
        let tid = pcb.terminal;
        pcb.files.close_all();
        pcb.has_vidmap = false;
        self.processes.free(pid);
        self.terminals[tid].clear_interrupt();

        match parent {
            None => {
                crate::println!(
                    "terminal {}: shell (pid {}) exited with {}, restarting",
                    tid,
                    pid,
                    status
                );
                self.terminals[tid].active = None;
                match self.spawn(machine, tid, None, SHELL) {
                    Ok(entry) => Completion::EnterUser(entry),
                    Err(err) => panic!("terminal {}: cannot restart shell: {:?}", tid, err),
                }
            }
            Some(parent) => {
                // Also replaces or removes the child's video window.
                self.activate(machine, parent);
                self.terminals[tid].active = Some(parent);
                let context = self
                    .processes
                    .get(parent)
                    .map(|p| p.context)
                    .unwrap_or_else(SavedContext::empty);
                Completion::Resume {
                    stack_ptr: context.stack_ptr,
                    value: Some(status as i32),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{process_frame, MAX_TASK_NUM};
    use crate::process::{FileKind, Stream};
    use crate::testing::{booted_kernel, booted_kernel_with, executable, sys, FsImageBuilder};
    use crate::trap::TrapFrame;
    use core::task::Poll;
    use x86_64::PhysAddr;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(b"shell").unwrap(), (&b"shell"[..], &b""[..]));
        assert_eq!(
            parse_command(b"  cat   frame0.txt  ").unwrap(),
            (&b"cat"[..], &b"frame0.txt"[..])
        );
        assert_eq!(parse_command(b"grep a b").unwrap(), (&b"grep"[..], &b"a b"[..]));
        assert_eq!(parse_command(b"   "), Err(SyscallError::BadCommand));
        assert_eq!(parse_command(b""), Err(SyscallError::BadCommand));
    }

    #[test]
    fn test_validate_rejects_non_programs() {
        let image = FsImageBuilder::new()
            .directory(".")
            .file("text", b"just some text, definitely longer than forty bytes ....")
            .file("tiny", &[0x7f, b'E', b'L', b'F'])
            .file("prog", &executable(0x0804_8018, b"body"))
            .build();
        let fs = FileSystem::mount(image).unwrap();
        assert_eq!(validate(&fs, b"."), Err(SyscallError::BadCommand));
        assert_eq!(validate(&fs, b"text"), Err(SyscallError::BadCommand));
        assert_eq!(validate(&fs, b"tiny"), Err(SyscallError::BadCommand));
        assert_eq!(validate(&fs, b"missing"), Err(SyscallError::BadCommand));
        let p = validate(&fs, b"prog").unwrap();
        assert_eq!(p.entry, 0x0804_8018);
        assert_eq!(p.length, EXECUTABLE_HEADER_LEN as u32 + 4);
    }

    #[test]
    fn test_execute_copies_image_and_builds_pcb() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let child_sp = sys::execute(&mut kernel, &mut machine, shell_sp, b"counter  42 ");
        let child = Pid::new(1);

        let pcb = *kernel.processes.get(child).unwrap();
        assert_eq!(pcb.pid, child);
        assert_eq!(pcb.parent, Some(Pid::new(0)));
        assert_eq!(pcb.terminal, 0);
        assert_eq!(pcb.args(), b"42");
        assert_eq!(pcb.files.get(0).unwrap().kind, FileKind::Terminal(Stream::Input));
        assert_eq!(pcb.files.open_count(), 2);
        assert_eq!(kernel.terminals[0].active, Some(child));

        let mut magic = [0u8; 4];
        machine.read_phys(PhysAddr::new(process_frame(1) + 0x48000), &mut magic);
        assert_eq!(magic, EXECUTABLE_MAGIC);

        // The shell's context now points at its execute frame.
        let shell = kernel.processes.get(Pid::new(0)).unwrap();
        assert_eq!(shell.context.stack_ptr, shell_sp);
        assert_eq!(child_sp, machine.kernel_stack - crate::trap::TRAP_FRAME_BYTES as u64);
    }

    #[test]
    fn test_execute_copies_image_larger_than_one_chunk() {
        let body: Vec<u8> = (0..3 * COPY_CHUNK + 17).map(|i| (i % 253) as u8).collect();
        let image = executable(PROGRAM_LOAD_ADDR + 0x100, &body);
        let (mut kernel, mut machine, shell_sp) = booted_kernel_with(&[("big", &image[..])]);
        sys::execute(&mut kernel, &mut machine, shell_sp, b"big");

        let mut loaded = vec![0u8; image.len()];
        machine.read_phys(PhysAddr::new(process_frame(1) + 0x48000), &mut loaded);
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_execute_nonexistent_has_no_side_effects() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let stack_before = machine.kernel_stack;
        let cmd = sys::put_str(&mut machine, &kernel, b"nonexistent");
        let result = sys::call(&mut kernel, &mut machine, shell_sp, 2, cmd, 0, 0);
        assert_eq!(result, Poll::Ready(shell_sp));
        assert_eq!(machine.trap_frame(shell_sp).rax as u32 as i32, -1);
        assert_eq!(kernel.live_processes(), 1);
        assert_eq!(kernel.current_pid(), Some(Pid::new(0)));
        assert_eq!(kernel.memory.mapped_process(), Some(Pid::new(0)));
        assert_eq!(machine.kernel_stack, stack_before);
    }

    #[test]
    fn test_pool_exhaustion() {
        let (mut kernel, mut machine, mut sp) = booted_kernel();
        for _ in 1..MAX_TASK_NUM {
            sp = sys::execute(&mut kernel, &mut machine, sp, b"counter");
        }
        assert_eq!(kernel.live_processes(), MAX_TASK_NUM);
        let cmd = sys::put_str(&mut machine, &kernel, b"counter");
        assert_eq!(sys::call(&mut kernel, &mut machine, sp, 2, cmd, 0, 0), Poll::Ready(sp));
        assert_eq!(machine.trap_frame(sp).rax as u32 as i32, -1);
        assert_eq!(kernel.current_pid(), Some(Pid::new(MAX_TASK_NUM - 1)));
    }

    #[test]
    fn test_halt_resumes_parent_with_status() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        machine.trap_frame(shell_sp).rbx = 0x1234;
        let child_sp = sys::execute(&mut kernel, &mut machine, shell_sp, b"counter");
        let saved = *machine.trap_frame(shell_sp);

        let resumed = sys::call(&mut kernel, &mut machine, child_sp, 1, 0x1_07, 0, 0);
        assert_eq!(resumed, Poll::Ready(shell_sp));
        let after = *machine.trap_frame(shell_sp);
        // Only eax changes, and the status is zero-extended from one byte.
        assert_eq!(after.rax, 7);
        assert_eq!(TrapFrame { rax: saved.rax, ..after }, saved);
        assert_eq!(kernel.current_pid(), Some(Pid::new(0)));
        assert_eq!(kernel.memory.mapped_process(), Some(Pid::new(0)));
        assert_eq!(kernel.live_processes(), 1);
        assert_eq!(
            machine.kernel_stack,
            kernel_stack_top(machine.kernel_stack_region_end(), 0)
        );
    }

    #[test]
    fn test_root_shell_halt_restarts_shell() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let resumed = sys::call(&mut kernel, &mut machine, shell_sp, 1, 0, 0, 0);
        let Poll::Ready(sp) = resumed else {
            panic!("halt must not block");
        };
        assert_eq!(kernel.current_pid(), Some(Pid::new(0)));
        assert_eq!(kernel.live_processes(), 1);
        assert!(kernel.processes.get(Pid::new(0)).unwrap().is_root());
        let frame = machine.trap_frame(sp);
        assert!(frame.from_user());
        assert_eq!(frame.rip, PROGRAM_LOAD_ADDR as u64 + 0x100);
    }
}
