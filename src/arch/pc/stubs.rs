//! Trap entry and exit.
//!
//! Every vector that may switch processes enters through one common stub
//! which completes a [`TrapFrame`](crate::trap::TrapFrame) on the current
//! kernel stack and hands its address to [`trap_entry`]. The address that
//! comes back is the frame to resume, possibly on another process's stack:
//! loading it into rsp and unwinding is the whole context switch.

use super::{display, with_kernel};
use crate::kernel::TIMER_VECTOR;
use crate::sync::poll_until;
use crate::trap::USER_DATA_SELECTOR;
use core::arch::global_asm;

macro_rules! trap_stubs {
    ($(($vector:literal, $name:ident, $has_error:literal)),* $(,)?) => {
        global_asm!(
            $(
                concat!(".global ", stringify!($name)),
                concat!(stringify!($name), ":"),
                concat!(".if ", stringify!($has_error), " == 0"),
                "    push 0",
                ".endif",
                concat!("    push ", stringify!($vector)),
                "    jmp trap_common",
            )*
        );

        extern "C" {
            $(pub fn $name();)*
        }
    };
}

trap_stubs!(
    (0, trap_divide_error, 0),
    (4, trap_overflow, 0),
    (5, trap_bound_range, 0),
    (6, trap_invalid_opcode, 0),
    (7, trap_device_not_available, 0),
    (10, trap_invalid_tss, 1),
    (11, trap_segment_not_present, 1),
    (12, trap_stack_segment, 1),
    (13, trap_general_protection, 1),
    (14, trap_page_fault, 1),
    (16, trap_x87_floating_point, 0),
    (17, trap_alignment_check, 1),
    (19, trap_simd_floating_point, 0),
    (32, trap_timer, 0),
    (128, trap_syscall, 0),
);

global_asm!(
    ".global trap_common",
    "trap_common:",
    "    push rax",
    "    push rbx",
    "    push rcx",
    "    push rdx",
    "    push rsi",
    "    push rdi",
    "    push rbp",
    "    push r8",
    "    push r9",
    "    push r10",
    "    push r11",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    cld",
    "    mov rdi, rsp",
    "    call {entry}",
    "    mov rsp, rax",
    ".global trap_resume",
    "trap_resume:",
    // Compatibility-mode code addresses memory through ds and es.
    "    mov ax, {user_data}",
    "    mov ds, ax",
    "    mov es, ax",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop r11",
    "    pop r10",
    "    pop r9",
    "    pop r8",
    "    pop rbp",
    "    pop rdi",
    "    pop rsi",
    "    pop rdx",
    "    pop rcx",
    "    pop rbx",
    "    pop rax",
    "    add rsp, 16",
    "    iretq",
    entry = sym trap_entry,
    user_data = const USER_DATA_SELECTOR,
);

/// Services one trap. Blocking system calls spin here, with interrupts
/// let in between attempts, until they complete.
extern "C" fn trap_entry(stack_ptr: u64) -> u64 {
    poll_until(|| {
        with_kernel(|kernel, machine| {
            let vector = crate::arch::Machine::trap_frame(machine, stack_ptr).vector;
            let next = kernel.handle_trap(machine, stack_ptr);
            if vector == TIMER_VECTOR {
                display::refresh(machine, kernel.visible_cursor());
            }
            next
        })
    })
}

/// Abandons the current stack and resumes the frame at `stack_ptr`.
///
/// # Safety
/// `stack_ptr` must point at a complete trap frame on a kernel stack.
pub unsafe fn resume_frame(stack_ptr: u64) -> ! {
    core::arch::asm!(
        "mov rsp, {0}",
        "jmp trap_resume",
        in(reg) stack_ptr,
        options(noreturn),
    )
}
