//! # Signal System Call Handlers

use crate::arch::Machine;
use crate::kernel::{Completion, Kernel};
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// Install `handler_address` for `signum`; 0 restores the default
pub fn sys_set_handler(kernel: &mut Kernel, signum: u32, handler_address: u32) -> SyscallResult {
    kernel.set_signal_handler(signum, handler_address)?;
    Ok(0)
}

/// Return from a user signal handler into the interrupted code
pub fn sys_sigreturn(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    stack_ptr: u64,
) -> Result<Completion, SyscallError> {
    kernel.sigreturn(machine, stack_ptr)
}
