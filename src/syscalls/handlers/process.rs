//! # Process System Call Handlers
//!
//! `execute` and `halt` are the two calls that change which process runs:
//! `execute` suspends the caller in its trap frame and enters the child,
//! `halt` ends the child and resumes that frame with the exit status in eax.

use crate::arch::Machine;
use crate::config::COMMAND_LEN;
use crate::kernel::{Completion, Kernel};
use crate::memory::{copy_to_user, read_user_cstr};
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};
use crate::trap::SavedContext;

/// End the current process. Only the low byte of `status` is reported.
pub fn sys_halt(kernel: &mut Kernel, machine: &mut dyn Machine, status: u32) -> Completion {
    kernel.halt(machine, status & 0xFF)
}

/// Run `command` as a child of the caller on the same terminal
pub fn sys_execute(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    stack_ptr: u64,
    command: u32,
) -> Result<Completion, SyscallError> {
    let mut line = [0u8; COMMAND_LEN];
    let len = read_user_cstr(machine, &kernel.memory, command, &mut line)?;
    let caller = kernel.current_pid().ok_or(SyscallError::NoProcess)?;
    let tid = kernel.current_pcb()?.terminal;

    let entry = kernel.spawn(machine, tid, Some(caller), &line[..len])?;

    // The caller sleeps in this very frame until the child halts.
    let frame_ptr = machine.trap_frame(stack_ptr).rbp;
    if let Some(pcb) = kernel.processes.get_mut(caller) {
        pcb.context = SavedContext {
            stack_ptr,
            frame_ptr,
        };
    }
    crate::println!("exec: pid {} started by pid {}", entry.pid, caller);
    Ok(Completion::EnterUser(entry))
}

/// Copy the argument string, NUL-terminated, into `buf`
pub fn sys_getargs(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    buf: u32,
    nbytes: u32,
) -> SyscallResult {
    let pcb = kernel.current_pcb()?;
    let args = pcb.args();
    if args.is_empty() {
        return Err(SyscallError::NoArguments);
    }
    if args.len() + 1 > nbytes as usize {
        return Err(SyscallError::InvalidArgument);
    }
    let mut out = [0u8; crate::config::ARG_LEN + 1];
    out[..args.len()].copy_from_slice(args);
    let len = args.len() + 1;
    copy_to_user(machine, &kernel.memory, buf, &out[..len])?;
    Ok(0)
}
