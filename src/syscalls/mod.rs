//! # System Calls
//!
//! User programs trap with `int 0x80`: number in eax, arguments in ebx, ecx
//! and edx, result in eax. Every failure returns -1.

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

pub use dispatcher::{dispatch, SyscallError, SyscallResult};
pub use numbers::SyscallNumber;
