//! # Devices
//!
//! Hardware-independent halves of the device drivers. Port I/O lives in
//! `arch::pc`; what is decided from the bytes lives here.

pub mod keyboard;
pub mod pit;
pub mod rtc;
pub mod speaker;
