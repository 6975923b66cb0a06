//! # Kernel State
//!
//! `Kernel` owns every piece of mutable kernel state: the address-space
//! manager, the process table, the terminals, the scheduler rotation and
//! the mounted file system. The platform keeps exactly one instance behind
//! an [`IrqMutex`](crate::sync::IrqMutex) and calls in from its interrupt
//! stubs.
//!
//! ## Trap flow
//!
//! ```text
//!   stub ─▶ handle_trap(stack_ptr) ─┬─ timer    ─▶ on_tick
//!                                   ├─ int 0x80 ─▶ syscalls::dispatch
//!                                   └─ fault    ─▶ on_exception
//!                                          │
//!                                     Completion
//!                                          │
//!                 finish: write return value / build entry frame,
//!                 deliver signals if returning to ring 3
//!                                          │
//!   stub ◀── stack pointer of the frame to resume
//! ```
//!
//! Operations in the `impl Kernel` blocks are spread over the modules that
//! own their concern: `process::exec`, `sched`, `signal::delivery`,
//! `terminal` and `syscalls`.

use crate::arch::Machine;
use crate::config::{
    kernel_stack_top, terminal_text_page, TERMINAL_COUNT, VIDEO_MEMORY,
};
use crate::devices::keyboard::ScancodeDecoder;
use crate::fs::{FileSystem, FsError};
use crate::memory::AddressSpaceManager;
use crate::process::{Pcb, Pid, ProcessTable};
use crate::sched::RoundRobin;
use crate::signal::Signal;
use crate::syscalls::SyscallError;
use crate::terminal::Terminals;
use crate::trap::{TrapFrame, TRAP_FRAME_BYTES};
use core::task::Poll;
use x86_64::PhysAddr;

pub const DIVIDE_ERROR_VECTOR: u64 = 0;
pub const INVALID_OPCODE_VECTOR: u64 = 6;
pub const GENERAL_PROTECTION_VECTOR: u64 = 13;
pub const PAGE_FAULT_VECTOR: u64 = 14;
pub const TIMER_VECTOR: u64 = 32;
pub const SYSCALL_VECTOR: u64 = 0x80;

/// A fresh user program, ready for its first entry into ring 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserEntry {
    pub pid: Pid,
    pub entry: u32,
    pub user_stack: u32,
    pub kernel_stack_top: u64,
}

impl UserEntry {
    /// Where the initial trap frame goes on the new kernel stack.
    pub fn frame_ptr(&self) -> u64 {
        self.kernel_stack_top - TRAP_FRAME_BYTES as u64
    }
}

/// How a trap ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Return `value` in eax of the trapping frame.
    Return(i32),
    /// Resume a saved frame, optionally overwriting its eax.
    Resume { stack_ptr: u64, value: Option<i32> },
    /// Start a new program.
    EnterUser(UserEntry),
}

pub struct Kernel {
    pub(crate) memory: AddressSpaceManager,
    pub(crate) processes: ProcessTable,
    pub(crate) terminals: Terminals,
    pub(crate) scheduler: RoundRobin,
    pub(crate) keyboard: ScancodeDecoder,
    pub(crate) ticks: u64,
    fs: Option<FileSystem<'static>>,
}

impl Kernel {
    pub const fn new() -> Self {
        Self {
            memory: AddressSpaceManager::new(),
            processes: ProcessTable::new(),
            terminals: Terminals::new(),
            scheduler: RoundRobin::new(),
            keyboard: ScancodeDecoder::new(),
            ticks: 0,
            fs: None,
        }
    }

    pub fn mount(&mut self, image: &'static [u8]) -> Result<(), FsError> {
        let fs = FileSystem::mount(image)?;
        crate::println!("fs: mounted, {} entries", fs.dir_count());
        self.fs = Some(fs);
        Ok(())
    }

    pub(crate) fn fs(&self) -> Result<FileSystem<'static>, SyscallError> {
        self.fs.ok_or(SyscallError::NotFound)
    }

    /// Builds the page tables, blanks the screens and starts the shell on
    /// terminal 0. Returns the frame to resume into.
    pub fn boot(&mut self, machine: &mut dyn Machine) -> Result<u64, SyscallError> {
        self.memory.init(machine);
        self.terminals.init(machine);
        self.terminals[0].invoked = true;
        let entry = self.spawn(machine, 0, None, crate::config::SHELL)?;
        crate::println!("boot: shell is pid {} on terminal 0", entry.pid);
        Ok(self.finish(machine, Completion::EnterUser(entry), entry.frame_ptr()))
    }

    /// Services the trap whose frame is at `stack_ptr`.
    ///
    /// `Pending` means a blocking read is not ready yet: the caller should
    /// let interrupts in and retry with the same frame.
    pub fn handle_trap(&mut self, machine: &mut dyn Machine, stack_ptr: u64) -> Poll<u64> {
        let vector = machine.trap_frame(stack_ptr).vector;
        let completion = match vector {
            TIMER_VECTOR => self.on_tick(machine, stack_ptr),
            SYSCALL_VECTOR => match crate::syscalls::dispatch(self, machine, stack_ptr) {
                Poll::Ready(completion) => completion,
                Poll::Pending => return Poll::Pending,
            },
            vector => self.on_exception(machine, stack_ptr, vector),
        };
        Poll::Ready(self.finish(machine, completion, stack_ptr))
    }

    /// Applies `completion` and delivers signals on the way out to ring 3.
    pub(crate) fn finish(
        &mut self,
        machine: &mut dyn Machine,
        mut completion: Completion,
        mut current: u64,
    ) -> u64 {
        loop {
            let stack_ptr = match completion {
                Completion::Return(value) => {
                    machine.trap_frame(current).set_return(value);
                    current
                }
                Completion::Resume { stack_ptr, value } => {
                    if let Some(value) = value {
                        machine.trap_frame(stack_ptr).set_return(value);
                    }
                    stack_ptr
                }
                Completion::EnterUser(entry) => {
                    let stack_ptr = entry.frame_ptr();
                    *machine.trap_frame(stack_ptr) =
                        TrapFrame::user_entry(entry.entry, entry.user_stack);
                    stack_ptr
                }
            };
            if !machine.trap_frame(stack_ptr).from_user() {
                return stack_ptr;
            }
            match self.deliver_signals(machine, stack_ptr) {
                Some(next) => {
                    completion = next;
                    current = stack_ptr;
                }
                None => return stack_ptr,
            }
        }
    }

    fn on_exception(&mut self, machine: &mut dyn Machine, stack_ptr: u64, vector: u64) -> Completion {
        let frame = *machine.trap_frame(stack_ptr);
        if !frame.from_user() {
            panic!(
                "kernel exception {} at {:#x}, error code {:#x}",
                vector, frame.rip, frame.error_code
            );
        }
        let signal = match vector {
            DIVIDE_ERROR_VECTOR => Signal::DivZero,
            _ => Signal::Segfault,
        };
        crate::println!(
            "pid {:?}: exception {} at {:#x}, error code {:#x}",
            self.current_pid(),
            vector,
            frame.rip,
            frame.error_code
        );
        let blocked = self
            .current_pcb()
            .map(|pcb| pcb.signals.is_blocked(signal))
            .unwrap_or(false);
        if blocked {
            // Returning would fault again at the same instruction.
            return self.halt(machine, crate::config::EXCEPTION_STATUS);
        }
        // DivZero and Segfault always target the current process.
        let _ = self.send_signal(signal.number());
        Completion::Resume {
            stack_ptr,
            value: None,
        }
    }

    /// The process running on the executing terminal.
    pub fn current_pid(&self) -> Option<Pid> {
        self.terminals[self.scheduler.current()].active
    }

    pub(crate) fn current_pcb(&self) -> Result<&Pcb, SyscallError> {
        let pid = self.current_pid().ok_or(SyscallError::NoProcess)?;
        self.processes.get(pid).ok_or(SyscallError::NoProcess)
    }

    pub(crate) fn current_pcb_mut(&mut self) -> Result<&mut Pcb, SyscallError> {
        let pid = self.current_pid().ok_or(SyscallError::NoProcess)?;
        self.processes.get_mut(pid).ok_or(SyscallError::NoProcess)
    }

    /// Installs `pid`'s frame, kernel stack and video window.
    pub(crate) fn activate(&mut self, machine: &mut dyn Machine, pid: Pid) {
        self.memory.map_process(machine, pid);
        machine.set_kernel_stack(kernel_stack_top(machine.kernel_stack_region_end(), pid.index()));
        self.refresh_video_window(machine, pid);
    }

    /// Points the video window at the live page if `pid`'s terminal is
    /// visible, at its private page otherwise, or removes it if `pid`
    /// never called vidmap.
    pub(crate) fn refresh_video_window(&mut self, machine: &mut dyn Machine, pid: Pid) {
        let Some(pcb) = self.processes.get(pid) else {
            return;
        };
        let present = pcb.has_vidmap;
        let target = if pcb.terminal == self.terminals.visible() {
            VIDEO_MEMORY
        } else {
            terminal_text_page(pcb.terminal)
        };
        self.memory.map_video_window(machine, present, PhysAddr::new(target));
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Cursor of the visible terminal, for the display driver.
    pub fn visible_cursor(&self) -> (usize, usize) {
        self.terminals[self.terminals.visible()].screen.cursor()
    }

    pub fn live_processes(&self) -> usize {
        self.processes.live_count()
    }

    pub fn invoked_terminals(&self) -> usize {
        (0..TERMINAL_COUNT).filter(|t| self.terminals[*t].invoked).count()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
