//! # System Call Handlers
//!
//! ## Modules
//!
//! - `io`: descriptor operations (read, write, open, close)
//! - `process`: halt, execute, getargs
//! - `memory`: vidmap
//! - `signal`: set_handler, sigreturn
//!
//! ## Handler Signature
//!
//! Handlers take the kernel, the machine and the raw 32-bit arguments. Most
//! return a plain value for eax:
//! ```ignore
//! fn sys_close(kernel: &mut Kernel, fd: u32) -> SyscallResult
//! ```
//! Handlers that may switch processes return a [`Completion`] instead, and
//! `sys_read` returns `Poll::Pending` while its data is not ready.
//!
//! [`Completion`]: crate::kernel::Completion

pub mod io;
pub mod memory;
pub mod process;
pub mod signal;
