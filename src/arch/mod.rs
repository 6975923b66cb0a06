//! # Platform Layer
//!
//! The kernel core never touches hardware directly. Everything it needs from
//! the machine goes through [`Machine`]:
//!
//! | Concern            | Methods                                          |
//! |--------------------|--------------------------------------------------|
//! | Physical memory    | `read_phys`, `write_phys`, `table_address`       |
//! | Paging registers   | `load_directory`, `flush_tlb`                    |
//! | Privileged stack   | `kernel_stack_region_end`, `set_kernel_stack`    |
//! | Kernel stacks      | `trap_frame`                                     |
//! | Timer              | `end_of_timer_interrupt`                         |
//! | Speaker            | `set_speaker`                                    |
//!
//! Register-level context handling is not part of the trait: the PC
//! stubs capture a [`SavedContext`](crate::trap::SavedContext) on entry and
//! resume one on exit, and those two places are the only ones that touch the
//! stack pointer. In between, the core edits saved frames through
//! `trap_frame`.

use crate::config::{COPY_CHUNK, SMALL_PAGE_SIZE};
use crate::memory::paging::PageTable;
use crate::trap::TrapFrame;
use x86_64::PhysAddr;

#[cfg(target_os = "none")]
pub mod pc;

pub trait Machine {
    /// Copies physical memory at `addr` into `buf`.
    fn read_phys(&self, addr: PhysAddr, buf: &mut [u8]);

    /// Copies `data` into physical memory at `addr`.
    fn write_phys(&mut self, addr: PhysAddr, data: &[u8]);

    /// Physical address of a kernel-resident page table.
    fn table_address(&self, table: &PageTable) -> PhysAddr;

    /// Makes `directory` the active user-half directory.
    fn load_directory(&mut self, directory: PhysAddr);

    /// Reloads the page-directory base register with its own value.
    fn flush_tlb(&mut self);

    /// One past the highest byte of the kernel stack region.
    fn kernel_stack_region_end(&self) -> u64;

    /// Stack the CPU switches to on a ring 3 -> ring 0 transition.
    fn set_kernel_stack(&mut self, top: u64);

    /// The trap frame whose lowest byte is at `stack_ptr`.
    fn trap_frame(&mut self, stack_ptr: u64) -> &mut TrapFrame;

    fn end_of_timer_interrupt(&mut self);

    /// Sounds the speaker at `hz`, or silences it on `None`.
    fn set_speaker(&mut self, tone: Option<u32>);
}

/// Copies one physical page to another through a bounce buffer.
pub fn copy_page(machine: &mut dyn Machine, from: PhysAddr, to: PhysAddr) {
    let mut chunk = [0u8; COPY_CHUNK];
    for offset in (0..SMALL_PAGE_SIZE).step_by(COPY_CHUNK) {
        machine.read_phys(from + offset, &mut chunk);
        machine.write_phys(to + offset, &chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMachine;

    #[test]
    fn test_copy_page_moves_every_byte() {
        let mut machine = MockMachine::new();
        let from = PhysAddr::new(0xB9000);
        let to = PhysAddr::new(0xBA000);
        let pattern: Vec<u8> = (0..SMALL_PAGE_SIZE).map(|i| (i * 7 % 251) as u8).collect();
        machine.write_phys(from, &pattern);
        machine.write_phys(to + SMALL_PAGE_SIZE, &[0xAA]);

        copy_page(&mut machine, from, to);

        let mut copied = vec![0u8; SMALL_PAGE_SIZE as usize];
        machine.read_phys(to, &mut copied);
        assert_eq!(copied, pattern);
        let mut next = [0u8; 1];
        machine.read_phys(to + SMALL_PAGE_SIZE, &mut next);
        assert_eq!(next, [0xAA]);
    }
}
