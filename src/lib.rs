//! # Tern Kernel
//!
//! A small multi-terminal teaching kernel. Three virtual terminals each run a
//! chain of 32-bit user programs loaded from a read-only file system; a
//! timer-driven round-robin scheduler rotates between terminals and a
//! five-signal subsystem rides on the same context-switch machinery.
//!
//! ## Layout
//!
//! | Module      | Responsibility                                        |
//! |-------------|-------------------------------------------------------|
//! | `memory`    | Page directory/tables, process mapping, user copies   |
//! | `process`   | Pid pool, PCBs, descriptor tables, execute/halt        |
//! | `sched`     | Round-robin rotation across terminals                  |
//! | `signal`    | Pending/blocked masks, handlers, delivery              |
//! | `terminal`  | Line discipline, terminal switching, text rendering    |
//! | `fs`        | Read-only block file system                            |
//! | `devices`   | Keyboard decoding, virtual RTC, PIT and speaker        |
//! | `syscalls`  | `int 0x80` numbers and dispatch                        |
//! | `arch`      | `Machine` trait and the PC platform layer              |
//!
//! Everything outside `arch::pc` is hardware-independent and runs under
//! `cargo test` on the host against `testing::MockMachine`.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

/// Serial console output. Under unit tests this goes to the host stdout.
#[macro_export]
macro_rules! println {
    () => {
        $crate::_print(format_args!("\n"))
    };
    ($($arg:tt)*) => {{
        $crate::_print(format_args!("{}\n", format_args!($($arg)*)));
    }};
}

pub mod arch;
pub mod config;
pub mod devices;
pub mod fs;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod sched;
pub mod signal;
pub mod sync;
pub mod syscalls;
pub mod terminal;
pub mod trap;

#[cfg(test)]
pub mod testing;

pub use kernel::Kernel;

#[cfg(target_os = "none")]
pub static SERIAL: spin::Mutex<uart_16550::SerialPort> =
    spin::Mutex::new(unsafe { uart_16550::SerialPort::new(0x3F8) });

#[doc(hidden)]
#[cfg(target_os = "none")]
pub fn _print(args: core::fmt::Arguments) {
    use core::fmt::Write;
    // Interrupt handlers log too.
    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = SERIAL.lock().write_fmt(args);
    });
}

#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: core::fmt::Arguments) {
    std::print!("{}", args);
}

#[doc(hidden)]
#[cfg(not(any(test, target_os = "none")))]
pub fn _print(_args: core::fmt::Arguments) {}
