//! # Memory Management
//!
//! - [`paging`]: entry encoding and the page-table type
//! - [`address_space`]: the single manager that owns the directory
//! - [`user`]: range-checked copies into and out of the user window
//!
//! There is no heap. Process memory is one fixed 4 MiB frame per pid.

pub mod address_space;
pub mod paging;
pub mod user;

pub use address_space::AddressSpaceManager;
pub use user::{check_user_range, copy_from_user, copy_to_user, read_user_cstr, BadUserPointer};
