//! # Scheduler
//!
//! Timer-driven round robin over terminals. Each invoked terminal gets one
//! tick-long turn per rotation, spent in whatever process is currently
//! active on it. Terminals nobody has switched to yet are skipped.
//!
//! A switch saves the preempted trap frame in the outgoing PCB, maps the
//! incoming process and its kernel stack, and resumes its saved frame.

use crate::arch::Machine;
use crate::config::{ALARM_PERIOD_TICKS, SHELL, TERMINAL_COUNT};
use crate::kernel::{Completion, Kernel};
use crate::signal::Signal;
use crate::trap::SavedContext;

/// Which terminal is executing, and which comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    current: usize,
}

impl RoundRobin {
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Moves to the next terminal after the current one for which
    /// `eligible` holds, wrapping around. Stays put if there is none.
    pub fn advance(&mut self, eligible: impl Fn(usize) -> bool) -> usize {
        if let Some(next) = (1..=TERMINAL_COUNT)
            .map(|step| (self.current + step) % TERMINAL_COUNT)
            .find(|t| eligible(*t))
        {
            self.current = next;
        }
        self.current
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Timer interrupt. `stack_ptr` is the preempted frame.
    pub(crate) fn on_tick(&mut self, machine: &mut dyn Machine, stack_ptr: u64) -> Completion {
        machine.end_of_timer_interrupt();
        self.ticks += 1;
        if self.ticks % ALARM_PERIOD_TICKS == 0 {
            let _ = self.send_signal(Signal::Alarm.number());
        }

        let stay = Completion::Resume {
            stack_ptr,
            value: None,
        };
        if self.invoked_terminals() < 2 {
            return stay;
        }

        let frame_ptr = machine.trap_frame(stack_ptr).rbp;
        let preempted = self.current_pid();
        if let Ok(pcb) = self.current_pcb_mut() {
            pcb.context = SavedContext {
                stack_ptr,
                frame_ptr,
            };
        }

        let rotation = self.scheduler;
        let terminals = &self.terminals;
        let next = self.scheduler.advance(|t| terminals[t].invoked);

        match self.terminals[next].active {
            Some(pid) => {
                let context = self
                    .processes
                    .get(pid)
                    .map(|pcb| pcb.context)
                    .filter(|context| !context.is_empty());
                let Some(context) = context else {
                    panic!("terminal {}: pid {} has no saved context", next, pid);
                };
                self.activate(machine, pid);
                Completion::Resume {
                    stack_ptr: context.stack_ptr,
                    value: None,
                }
            }
            None => match self.spawn(machine, next, None, SHELL) {
                Ok(entry) => {
                    crate::println!("terminal {}: shell is pid {}", next, entry.pid);
                    Completion::EnterUser(entry)
                }
                Err(err) => {
                    // Nothing to run there; keep it out of the rotation.
                    crate::println!("terminal {}: cannot start shell: {:?}", next, err);
                    self.terminals[next].invoked = false;
                    self.scheduler = rotation;
                    if let Some(pid) = preempted {
                        self.activate(machine, pid);
                    }
                    stay
                }
            },
        }
    }
}
