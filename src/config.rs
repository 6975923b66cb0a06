//! # Kernel Configuration
//!
//! Compile-time limits and the fixed memory layout shared by the core and
//! the platform layer.
//!
//! ## Virtual layout (user side, 32-bit)
//!
//! | Address        | Size   | Contents                              |
//! |----------------|--------|---------------------------------------|
//! | `0x0800_0000`  | 4 MiB  | User window (current process frame)   |
//! | `0x0804_8000`  | -      | Program load address                  |
//! | `0x083F_FFFC`  | -      | Initial user stack pointer            |
//! | `0x0880_0000`  | 4 KiB  | Video window (`vidmap`)               |
//!
//! ## Physical layout
//!
//! | Address                 | Contents                              |
//! |-------------------------|---------------------------------------|
//! | `0xB8000`               | Live text page (what the user sees)   |
//! | `0xB9000 + tid * 4 KiB` | Private text page of terminal `tid`   |
//! | `4 MiB`                 | Kernel region (global, uncached)      |
//! | `(pid + 2) * 4 MiB`     | Frame of process `pid`                |

/// Size of the pid pool.
pub const MAX_TASK_NUM: usize = 6;

/// Number of virtual terminals.
pub const TERMINAL_COUNT: usize = 3;

/// Descriptor slots per process; 0 and 1 are the terminal.
pub const FD_TABLE_SIZE: usize = 8;

/// First descriptor slot `open` may hand out.
pub const FIRST_FREE_FD: usize = 2;

/// Capacity of the argument string kept in each PCB.
pub const ARG_LEN: usize = 128;

/// Longest command line `execute` accepts from user space.
pub const COMMAND_LEN: usize = 128;

/// Number of defined signals.
pub const SIGNAL_COUNT: usize = 5;

/// Keyboard line buffer capacity, newline included.
pub const LINE_BUFFER_LEN: usize = 128;

pub const SMALL_PAGE_SIZE: u64 = 4 * 1024;
pub const PROCESS_FRAME_SIZE: u64 = 4 * 1024 * 1024;

pub const USER_WINDOW_BASE: u32 = 0x0800_0000;
pub const USER_WINDOW_SIZE: u32 = 0x0040_0000;
pub const USER_WINDOW_END: u32 = USER_WINDOW_BASE + USER_WINDOW_SIZE;
pub const PROGRAM_LOAD_ADDR: u32 = 0x0804_8000;
pub const USER_STACK_TOP: u32 = USER_WINDOW_END - 4;
pub const VIDMAP_ADDR: u32 = 0x0880_0000;

/// Physical address of the live text page.
pub const VIDEO_MEMORY: u64 = 0xB8000;

/// Physical base of the kernel region mapped at init.
pub const KERNEL_REGION: u64 = 0x0040_0000;

/// Per-process kernel stack, carved downward from the region end.
pub const KERNEL_STACK_SIZE: usize = 8 * 1024;

/// Largest bounce buffer kept on a kernel stack.
pub const COPY_CHUNK: usize = 512;

/// Timer interrupt rate.
pub const PIT_FREQUENCY_HZ: u32 = 100;

/// Hardware RTC rate; per-terminal virtual rates divide it.
pub const RTC_BASE_FREQUENCY: u32 = 1024;
pub const RTC_DEFAULT_FREQUENCY: u32 = 2;

/// Ticks between alarm signals (10 seconds).
pub const ALARM_PERIOD_TICKS: u64 = 10 * PIT_FREQUENCY_HZ as u64;

/// Executable magic: `\x7fELF`.
pub const EXECUTABLE_MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];
pub const EXECUTABLE_HEADER_LEN: usize = 40;
pub const ENTRY_POINT_OFFSET: usize = 24;

/// Program started on every fresh terminal.
pub const SHELL: &[u8] = b"shell";

/// Exit status reported when a process dies by exception.
pub const EXCEPTION_STATUS: u32 = 256;

/// Physical frame backing process `pid`.
pub const fn process_frame(pid: usize) -> u64 {
    (pid as u64 + 2) * PROCESS_FRAME_SIZE
}

/// Physical private text page of terminal `tid`.
pub const fn terminal_text_page(tid: usize) -> u64 {
    VIDEO_MEMORY + (tid as u64 + 1) * SMALL_PAGE_SIZE
}

/// Top of the kernel stack of `pid`, given the end of the stack region.
pub const fn kernel_stack_top(region_end: u64, pid: usize) -> u64 {
    region_end - (pid * KERNEL_STACK_SIZE) as u64
}
