//! # Interrupt-Safe Critical Sections
//!
//! On a single CPU the only concurrency is interrupts, so a critical section
//! is "interrupts masked". `IrqGuard` masks on entry and restores the prior
//! state on drop, which keeps nested sections correct: an inner section
//! entered with interrupts already masked leaves them masked.
//!
//! `IrqMutex` pairs a `spin::Mutex` with an `IrqGuard`, so an interrupt
//! handler can never spin on a lock held by the code it interrupted.
//!
//! `poll_until` is the one suspension primitive: a process waiting for a
//! flag set by an interrupt handler keeps its timeslice and re-checks after
//! every interrupt. It does not yield; the timer preempts it.

use core::ops::{Deref, DerefMut};
use core::task::Poll;
use spin::{Mutex, MutexGuard};

#[cfg(target_os = "none")]
mod cpu {
    use x86_64::instructions::interrupts;

    pub fn enabled() -> bool {
        interrupts::are_enabled()
    }

    pub fn disable() {
        interrupts::disable();
    }

    pub fn enable() {
        interrupts::enable();
    }

    pub fn wait() {
        interrupts::enable_and_hlt();
        interrupts::disable();
    }
}

#[cfg(test)]
mod cpu {
    use std::cell::Cell;

    std::thread_local! {
        static ENABLED: Cell<bool> = const { Cell::new(true) };
    }

    pub fn enabled() -> bool {
        ENABLED.with(|e| e.get())
    }

    pub fn disable() {
        ENABLED.with(|e| e.set(false));
    }

    pub fn enable() {
        ENABLED.with(|e| e.set(true));
    }

    pub fn wait() {
        std::thread::yield_now();
    }
}

#[cfg(not(any(test, target_os = "none")))]
mod cpu {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn wait() {
        core::hint::spin_loop();
    }
}

/// Whether interrupts are currently enabled.
pub fn interrupts_enabled() -> bool {
    cpu::enabled()
}

/// Masks interrupts for its lifetime.
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    pub fn new() -> Self {
        let was_enabled = cpu::enabled();
        if was_enabled {
            cpu::disable();
        }
        Self { was_enabled }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            cpu::enable();
        }
    }
}

pub struct IrqMutex<T> {
    inner: Mutex<T>,
}

pub struct IrqMutexGuard<'a, T> {
    // Field order matters: the lock is released before interrupts return.
    guard: MutexGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> IrqMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let irq = IrqGuard::new();
        IrqMutexGuard {
            guard: self.inner.lock(),
            _irq: irq,
        }
    }

    pub fn try_lock(&self) -> Option<IrqMutexGuard<'_, T>> {
        let irq = IrqGuard::new();
        self.inner.try_lock().map(|guard| IrqMutexGuard { guard, _irq: irq })
    }
}

impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Re-runs `attempt` until it is ready, letting interrupts in between tries.
///
/// `attempt` is called with interrupts masked. Between attempts interrupts
/// are enabled until the next one arrives, so the timer may switch this
/// process out and later resume the loop where it left off.
pub fn poll_until<T>(mut attempt: impl FnMut() -> Poll<T>) -> T {
    let _guard = IrqGuard::new();
    loop {
        if let Poll::Ready(value) = attempt() {
            return value;
        }
        cpu::wait();
    }
}
