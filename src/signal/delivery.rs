//! Sending and delivering signals.
//!
//! A user handler runs on a frame pushed below the interrupted user stack
//! pointer:
//!
//! ```text
//!   high  ┌───────────────────────┐ <- old esp
//!         │ trampoline (8 bytes)  │  mov eax, 10 ; int 0x80
//!         │ saved TrapFrame       │
//!         │ signal number (u32)   │
//!   low   │ return address (u32)  │ <- esp on handler entry
//!         └───────────────────────┘
//! ```
//!
//! When the handler returns it lands in the trampoline, which calls
//! `sigreturn`. At that point esp points at the signal number, so the saved
//! frame starts 4 bytes above it.

use super::{DefaultAction, Handler, Signal};
use crate::arch::Machine;
use crate::config::EXCEPTION_STATUS;
use crate::kernel::{Completion, Kernel};
use crate::memory::{copy_from_user, copy_to_user};
use crate::syscalls::SyscallError;
use crate::trap::{TrapFrame, TRAP_FRAME_BYTES};

/// `mov eax, 10 ; int 0x80`, padded with `nop`.
const TRAMPOLINE: [u8; 8] = [0xB8, 0x0A, 0x00, 0x00, 0x00, 0xCD, 0x80, 0x90];

impl Kernel {
    /// Marks `signum` pending on its target process.
    pub fn send_signal(&mut self, signum: u32) -> Result<(), SyscallError> {
        let signal = Signal::from_number(signum).ok_or(SyscallError::InvalidArgument)?;
        let target = if signal.targets_foreground() {
            let visible = self.terminals.visible();
            if signal == Signal::Interrupt {
                self.terminals[visible].interrupt();
            }
            self.terminals[visible].active
        } else {
            self.current_pid()
        };
        if let Some(pcb) = target.and_then(|pid| self.processes.get_mut(pid)) {
            pcb.signals.raise(signal);
        }
        Ok(())
    }

    /// Installs `handler` for `signum` on the current process. Address 0
    /// puts the default handler back.
    pub fn set_signal_handler(&mut self, signum: u32, handler: u32) -> Result<(), SyscallError> {
        let signal = Signal::from_number(signum).ok_or(SyscallError::InvalidArgument)?;
        let handler = match handler {
            0 => Handler::Default,
            addr => Handler::User(addr),
        };
        self.current_pcb_mut()?.signals.set_handler(signal, handler);
        Ok(())
    }

    /// Delivers at most one signal to the current process, which is about
    /// to return to user mode through the frame at `stack_ptr`.
    ///
    /// Returns a new completion if a default handler ended the process.
    pub(crate) fn deliver_signals(
        &mut self,
        machine: &mut dyn Machine,
        stack_ptr: u64,
    ) -> Option<Completion> {
        let pcb = self.current_pcb_mut().ok()?;
        let (signal, handler) = pcb.signals.begin_delivery()?;

        match handler {
            Handler::Default => {
                pcb.signals.end_delivery();
                match signal.default_action() {
                    DefaultAction::Ignore => None,
                    DefaultAction::Terminate(status) => Some(self.halt(machine, status)),
                }
            }
            Handler::User(entry) => {
                if self.push_signal_frame(machine, stack_ptr, signal, entry).is_ok() {
                    return None;
                }
                crate::println!("pid {:?}: unusable stack for signal {:?}", self.current_pid(), signal);
                if let Ok(pcb) = self.current_pcb_mut() {
                    pcb.signals.end_delivery();
                }
                Some(self.halt(machine, EXCEPTION_STATUS))
            }
        }
    }

    fn push_signal_frame(
        &mut self,
        machine: &mut dyn Machine,
        stack_ptr: u64,
        signal: Signal,
        entry: u32,
    ) -> Result<(), SyscallError> {
        let frame = *machine.trap_frame(stack_ptr);
        let esp = frame.rsp as u32;
        let trampoline = esp.checked_sub(TRAMPOLINE.len() as u32).ok_or(SyscallError::BadAddress)?;
        let saved = trampoline
            .checked_sub(TRAP_FRAME_BYTES as u32)
            .ok_or(SyscallError::BadAddress)?;
        let signum_at = saved.checked_sub(4).ok_or(SyscallError::BadAddress)?;
        let return_at = signum_at.checked_sub(4).ok_or(SyscallError::BadAddress)?;

        copy_to_user(machine, &self.memory, trampoline, &TRAMPOLINE)?;
        copy_to_user(machine, &self.memory, saved, &frame.to_bytes())?;
        copy_to_user(machine, &self.memory, signum_at, &signal.number().to_le_bytes())?;
        copy_to_user(machine, &self.memory, return_at, &trampoline.to_le_bytes())?;

        let live = machine.trap_frame(stack_ptr);
        live.rsp = return_at as u64;
        live.rip = entry as u64;
        Ok(())
    }

    /// Restores the frame saved when the current handler was entered and
    /// the mask saved when delivery began.
    pub(crate) fn sigreturn(
        &mut self,
        machine: &mut dyn Machine,
        stack_ptr: u64,
    ) -> Result<Completion, SyscallError> {
        if !self.current_pcb()?.signals.in_delivery() {
            return Err(SyscallError::InvalidArgument);
        }
        let esp = machine.trap_frame(stack_ptr).rsp as u32;
        let mut bytes = [0u8; TRAP_FRAME_BYTES];
        copy_from_user(machine, &self.memory, esp.wrapping_add(4), &mut bytes)?;
        let saved = TrapFrame::from_bytes(&bytes);
        machine.trap_frame(stack_ptr).restore_user_view(&saved);
        self.current_pcb_mut()?.signals.end_delivery();
        Ok(Completion::Resume {
            stack_ptr,
            value: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USER_STACK_TOP;
    use crate::process::Pid;
    use crate::testing::{booted_kernel, sys};
    use core::task::Poll;

    const HANDLER: u32 = 0x0804_8200;

    #[test]
    fn test_send_validates_range() {
        let (mut kernel, _, _) = booted_kernel();
        assert_eq!(kernel.send_signal(5), Err(SyscallError::InvalidArgument));
        assert_eq!(kernel.set_signal_handler(9, HANDLER), Err(SyscallError::InvalidArgument));
    }

    #[test]
    fn test_ignored_by_default() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        kernel.send_signal(Signal::User1.number()).unwrap();
        let before = *machine.trap_frame(sp);
        assert_eq!(kernel.deliver_signals(&mut machine, sp), None);
        assert_eq!(*machine.trap_frame(sp), before);
        let st = kernel.current_pcb().unwrap().signals;
        assert!(!st.in_delivery() && !st.is_blocked(Signal::User1));
    }

    #[test]
    fn test_user_handler_frame_and_sigreturn() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        machine.trap_frame(sp).rbx = 77;
        let interrupted = *machine.trap_frame(sp);

        kernel.set_signal_handler(Signal::User1.number(), HANDLER).unwrap();
        kernel.send_signal(Signal::User1.number()).unwrap();
        assert_eq!(kernel.deliver_signals(&mut machine, sp), None);

        let frame = *machine.trap_frame(sp);
        assert_eq!(frame.rip, HANDLER as u64);
        let esp = frame.rsp as u32;
        assert_eq!(esp, USER_STACK_TOP - 8 - TRAP_FRAME_BYTES as u32 - 8);
        let mut word = [0u8; 4];
        copy_from_user(&mut machine, &kernel.memory, esp, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), USER_STACK_TOP - 8);
        copy_from_user(&mut machine, &kernel.memory, esp + 4, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), 4);
        let mut code = [0u8; 8];
        copy_from_user(&mut machine, &kernel.memory, USER_STACK_TOP - 8, &mut code).unwrap();
        assert_eq!(code, TRAMPOLINE);

        // Handler body scribbles on registers, then `ret` pops the return
        // address and the trampoline traps with eax = 10.
        {
            let f = machine.trap_frame(sp);
            f.rbx = 1;
            f.rsp = (esp + 4) as u64;
            f.rip = (USER_STACK_TOP - 8 + 7) as u64;
        }
        let resumed = sys::call(&mut kernel, &mut machine, sp, 10, 0, 0, 0);
        assert_eq!(resumed, Poll::Ready(sp));
        let after = *machine.trap_frame(sp);
        assert_eq!(after.rip, interrupted.rip);
        assert_eq!(after.rsp, interrupted.rsp);
        assert_eq!(after.rbx, 77);
        let st = kernel.current_pcb().unwrap().signals;
        assert!(!st.in_delivery());
        assert!(!st.is_blocked(Signal::User1));
    }

    #[test]
    fn test_signal_sent_during_handler_waits_for_sigreturn() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        kernel.set_signal_handler(Signal::User1.number(), HANDLER).unwrap();
        kernel.send_signal(Signal::User1.number()).unwrap();
        kernel.deliver_signals(&mut machine, sp);
        let in_handler = *machine.trap_frame(sp);

        kernel.send_signal(Signal::User1.number()).unwrap();
        assert_eq!(kernel.deliver_signals(&mut machine, sp), None);
        assert_eq!(*machine.trap_frame(sp), in_handler);
        assert!(kernel.current_pcb().unwrap().signals.is_pending(Signal::User1));

        machine.trap_frame(sp).rsp += 4;
        // sigreturn restores the mask, then the still-pending signal is
        // delivered again on the same way out.
        sys::call(&mut kernel, &mut machine, sp, 10, 0, 0, 0);
        let st = kernel.current_pcb().unwrap().signals;
        assert!(st.in_delivery());
        assert!(!st.is_pending(Signal::User1));
        assert_eq!(machine.trap_frame(sp).rip, HANDLER as u64);
    }

    #[test]
    fn test_sigreturn_outside_handler_fails() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        sys::call(&mut kernel, &mut machine, sp, 10, 0, 0, 0);
        assert_eq!(machine.trap_frame(sp).rax as u32 as i32, -1);
    }

    #[test]
    fn test_interrupt_targets_visible_terminal() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        sys::execute(&mut kernel, &mut machine, shell_sp, b"counter");
        kernel.send_signal(Signal::Interrupt.number()).unwrap();
        let child = kernel.processes.get(Pid::new(1)).unwrap();
        assert!(child.signals.is_pending(Signal::Interrupt));
        assert!(!kernel.processes.get(Pid::new(0)).unwrap().signals.is_pending(Signal::Interrupt));
    }

    #[test]
    fn test_stack_too_low_for_frame_halts_child() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let child_sp = sys::execute(&mut kernel, &mut machine, shell_sp, b"counter");
        kernel.set_signal_handler(Signal::User1.number(), HANDLER).unwrap();
        kernel.send_signal(Signal::User1.number()).unwrap();
        // Room for the trampoline and saved frame but not the two words below.
        machine.trap_frame(child_sp).rsp = (TRAMPOLINE.len() + TRAP_FRAME_BYTES + 4) as u64;

        assert_eq!(
            kernel.deliver_signals(&mut machine, child_sp),
            Some(Completion::Resume {
                stack_ptr: shell_sp,
                value: Some(EXCEPTION_STATUS as i32),
            })
        );
        assert_eq!(kernel.current_pid(), Some(Pid::new(0)));
        assert_eq!(kernel.live_processes(), 1);
    }

    #[test]
    fn test_stack_outside_window_halts_child() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let child_sp = sys::execute(&mut kernel, &mut machine, shell_sp, b"counter");
        kernel.set_signal_handler(Signal::User1.number(), HANDLER).unwrap();
        kernel.send_signal(Signal::User1.number()).unwrap();
        machine.trap_frame(child_sp).rsp = crate::config::USER_WINDOW_BASE as u64;

        let resumed = sys::call(&mut kernel, &mut machine, child_sp, 6, 2, 0, 0);
        assert_eq!(resumed, Poll::Ready(shell_sp));
        assert_eq!(machine.trap_frame(shell_sp).rax, EXCEPTION_STATUS as u64);
        assert_eq!(kernel.current_pid(), Some(Pid::new(0)));
    }

    #[test]
    fn test_reset_to_default_handler() {
        let (mut kernel, _, _) = booted_kernel();
        kernel.set_signal_handler(Signal::Alarm.number(), HANDLER).unwrap();
        kernel.set_signal_handler(Signal::Alarm.number(), 0).unwrap();
        assert_eq!(
            kernel.current_pcb().unwrap().signals.handler(Signal::Alarm),
            Handler::Default
        );
    }
}
