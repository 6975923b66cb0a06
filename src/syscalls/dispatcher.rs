use super::handlers;
use super::numbers::SyscallNumber;
use crate::arch::Machine;
use crate::kernel::{Completion, Kernel};
use crate::memory::BadUserPointer;
use core::task::Poll;

/// System call result type: the value returned in eax.
pub type SyscallResult = Result<i32, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Program missing, not executable, or the command line is empty.
    BadCommand,
    /// Every pid is in use.
    TooManyProcesses,
    /// Descriptor slots 2 to 7 are all open.
    NoFreeDescriptor,
    BadDescriptor,
    /// User pointer outside the user window.
    BadAddress,
    InvalidArgument,
    NotFound,
    /// Operation not defined for this kind of descriptor.
    Unsupported,
    NoArguments,
    /// No process is running on the executing terminal.
    NoProcess,
}

impl SyscallError {
    /// The user ABI has a single failure value.
    pub fn as_errno(self) -> i32 {
        match self {
            Self::BadCommand
            | Self::TooManyProcesses
            | Self::NoFreeDescriptor
            | Self::BadDescriptor
            | Self::BadAddress
            | Self::InvalidArgument
            | Self::NotFound
            | Self::Unsupported
            | Self::NoArguments
            | Self::NoProcess => -1,
        }
    }
}

impl From<BadUserPointer> for SyscallError {
    fn from(_: BadUserPointer) -> Self {
        Self::BadAddress
    }
}

/// Main syscall dispatcher.
///
/// `stack_ptr` is the `int 0x80` trap frame. `Pending` means a read has
/// nothing to return yet and the whole call must be retried later.
pub fn dispatch(
    kernel: &mut Kernel,
    machine: &mut dyn Machine,
    stack_ptr: u64,
) -> Poll<Completion> {
    let (number, arg0, arg1, arg2) = machine.trap_frame(stack_ptr).syscall_args();
    let syscall = SyscallNumber::from(number);

    #[cfg(feature = "trace-syscalls")]
    crate::println!(
        "SYSCALL: pid {:?} {:?}({:#x}, {:#x}, {:#x})",
        kernel.current_pid(),
        syscall,
        arg0,
        arg1,
        arg2
    );

    let result = match syscall {
        SyscallNumber::Halt => Ok(handlers::process::sys_halt(kernel, machine, arg0)),
        SyscallNumber::Execute => handlers::process::sys_execute(kernel, machine, stack_ptr, arg0),
        SyscallNumber::Read => match handlers::io::sys_read(kernel, machine, arg0, arg1, arg2) {
            Poll::Ready(result) => result.map(Completion::Return),
            Poll::Pending => return Poll::Pending,
        },
        SyscallNumber::Write => {
            handlers::io::sys_write(kernel, machine, arg0, arg1, arg2).map(Completion::Return)
        }
        SyscallNumber::Open => handlers::io::sys_open(kernel, machine, arg0).map(Completion::Return),
        SyscallNumber::Close => handlers::io::sys_close(kernel, arg0).map(Completion::Return),
        SyscallNumber::GetArgs => {
            handlers::process::sys_getargs(kernel, machine, arg0, arg1).map(Completion::Return)
        }
        SyscallNumber::Vidmap => {
            handlers::memory::sys_vidmap(kernel, machine, arg0).map(Completion::Return)
        }
        SyscallNumber::SetHandler => {
            handlers::signal::sys_set_handler(kernel, arg0, arg1).map(Completion::Return)
        }
        SyscallNumber::Sigreturn => handlers::signal::sys_sigreturn(kernel, machine, stack_ptr),
        SyscallNumber::Unknown => Err(SyscallError::Unsupported),
    };

    Poll::Ready(result.unwrap_or_else(|err| {
        #[cfg(feature = "trace-syscalls")]
        crate::println!("SYSCALL: {:?} failed: {:?}", syscall, err);
        Completion::Return(err.as_errno())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{booted_kernel, sys};

    #[test]
    fn test_every_error_is_minus_one() {
        let all = [
            SyscallError::BadCommand,
            SyscallError::TooManyProcesses,
            SyscallError::NoFreeDescriptor,
            SyscallError::BadDescriptor,
            SyscallError::BadAddress,
            SyscallError::InvalidArgument,
            SyscallError::NotFound,
            SyscallError::Unsupported,
            SyscallError::NoArguments,
            SyscallError::NoProcess,
        ];
        assert!(all.iter().all(|e| e.as_errno() == -1));
    }

    #[test]
    fn test_unknown_number_fails() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        for number in [0, 11, 0xFFFF_FFFF] {
            assert_eq!(sys::call(&mut kernel, &mut machine, sp, number, 0, 0, 0), Poll::Ready(sp));
            assert_eq!(machine.trap_frame(sp).rax, 0xFFFF_FFFF);
        }
    }

    #[test]
    fn test_only_eax_is_written() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        sys::call(&mut kernel, &mut machine, sp, 6, 2, 0, 0);
        let frame = *machine.trap_frame(sp);
        assert_eq!((frame.rbx, frame.rcx, frame.rdx), (2, 0, 0));
    }
}
