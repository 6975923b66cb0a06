//! # Address-Space Manager
//!
//! Owns the one page directory and its two small tables. All mapping
//! changes go through the methods here; every method that changes what user
//! code can see ends with a TLB flush.
//!
//! ## Directory slots (2 MiB each)
//!
//! | Slot   | Virtual range              | Backing                          |
//! |--------|----------------------------|----------------------------------|
//! | 0      | `0x0000_0000..0x0020_0000` | Low table (text pages)           |
//! | 2, 3   | `0x0040_0000..0x0080_0000` | Kernel region, global, uncached  |
//! | 64, 65 | `0x0800_0000..0x0840_0000` | Current process frame            |
//! | 68     | `0x0880_0000..`            | Video table, entry 0 = window    |

use super::paging::{PageEntry, PageTable, ENTRY_COUNT, LARGE_PAGE_SIZE};
use crate::arch::Machine;
use crate::config::{
    process_frame, terminal_text_page, KERNEL_REGION, PROCESS_FRAME_SIZE, SMALL_PAGE_SIZE,
    TERMINAL_COUNT, USER_WINDOW_BASE, VIDEO_MEMORY, VIDMAP_ADDR,
};
use crate::process::Pid;
use x86_64::structures::paging::PageTableFlags as Flags;
use x86_64::PhysAddr;

const LOW_SLOT: usize = 0;
const KERNEL_SLOT: usize = (KERNEL_REGION / LARGE_PAGE_SIZE) as usize;
const USER_SLOT: usize = (USER_WINDOW_BASE as u64 / LARGE_PAGE_SIZE) as usize;
const VIDEO_SLOT: usize = (VIDMAP_ADDR as u64 / LARGE_PAGE_SIZE) as usize;
const SLOTS_PER_FRAME: usize = (PROCESS_FRAME_SIZE / LARGE_PAGE_SIZE) as usize;

pub struct AddressSpaceManager {
    directory: PageTable,
    low_table: PageTable,
    video_table: PageTable,
}

impl AddressSpaceManager {
    pub const fn new() -> Self {
        Self {
            directory: PageTable::new(),
            low_table: PageTable::new(),
            video_table: PageTable::new(),
        }
    }

    /// Builds the fixed mappings and activates the directory.
    pub fn init(&mut self, machine: &mut dyn Machine) {
        self.directory.clear();
        self.low_table.clear();
        self.video_table.clear();

        let text_pages =
            core::iter::once(VIDEO_MEMORY).chain((0..TERMINAL_COUNT).map(terminal_text_page));
        for page in text_pages {
            self.low_table[(page / SMALL_PAGE_SIZE) as usize] =
                PageEntry::new(PhysAddr::new(page), Flags::PRESENT | Flags::WRITABLE);
        }
        self.directory[LOW_SLOT] = PageEntry::new(
            machine.table_address(&self.low_table),
            Flags::PRESENT | Flags::WRITABLE,
        );

        for half in 0..SLOTS_PER_FRAME {
            self.directory[KERNEL_SLOT + half] = PageEntry::new(
                PhysAddr::new(KERNEL_REGION + half as u64 * LARGE_PAGE_SIZE),
                Flags::PRESENT | Flags::WRITABLE | Flags::HUGE_PAGE | Flags::GLOBAL | Flags::NO_CACHE,
            );
        }

        // The window page itself stays absent until vidmap asks for it.
        self.directory[VIDEO_SLOT] = PageEntry::new(
            machine.table_address(&self.video_table),
            Flags::PRESENT | Flags::WRITABLE | Flags::USER_ACCESSIBLE,
        );

        let directory = machine.table_address(&self.directory);
        machine.load_directory(directory);
        self.flush_tlb(machine);
    }

    /// Points the user window at the frame of `pid`.
    pub fn map_process(&mut self, machine: &mut dyn Machine, pid: Pid) {
        let base = process_frame(pid.index());
        for half in 0..SLOTS_PER_FRAME {
            self.directory[USER_SLOT + half] = PageEntry::new(
                PhysAddr::new(base + half as u64 * LARGE_PAGE_SIZE),
                Flags::PRESENT
                    | Flags::WRITABLE
                    | Flags::USER_ACCESSIBLE
                    | Flags::HUGE_PAGE
                    | Flags::NO_CACHE,
            );
        }
        self.flush_tlb(machine);
    }

    /// Installs the user video page at `VIDMAP_ADDR` over `target`, or
    /// removes it.
    pub fn map_video_window(&mut self, machine: &mut dyn Machine, present: bool, target: PhysAddr) {
        self.video_table[0] = if present {
            PageEntry::new(target, Flags::PRESENT | Flags::WRITABLE | Flags::USER_ACCESSIBLE)
        } else {
            PageEntry::blank()
        };
        self.flush_tlb(machine);
    }

    pub fn flush_tlb(&self, machine: &mut dyn Machine) {
        machine.flush_tlb();
    }

    /// Software walk of the directory for a 32-bit virtual address.
    pub fn translate(&self, vaddr: u32) -> Option<PhysAddr> {
        let slot = (vaddr as u64 / LARGE_PAGE_SIZE) as usize;
        let entry = self.directory[slot];
        if !entry.is_present() {
            return None;
        }
        if entry.is_large() {
            return Some(entry.addr() + (vaddr as u64 % LARGE_PAGE_SIZE));
        }
        let table = match slot {
            LOW_SLOT => &self.low_table,
            VIDEO_SLOT => &self.video_table,
            _ => return None,
        };
        let page = table[(vaddr as u64 / SMALL_PAGE_SIZE) as usize % ENTRY_COUNT];
        page.is_present()
            .then(|| page.addr() + (vaddr as u64 % SMALL_PAGE_SIZE))
    }

    /// Which process frame currently backs the user window.
    pub fn mapped_process(&self) -> Option<Pid> {
        let entry = self.directory[USER_SLOT];
        if !entry.is_present() {
            return None;
        }
        let frame = entry.addr().as_u64() / PROCESS_FRAME_SIZE;
        frame.checked_sub(2).map(|index| Pid::new(index as usize))
    }

    /// Current target of the video window, if it is mapped.
    pub fn video_window(&self) -> Option<PhysAddr> {
        let entry = self.video_table[0];
        entry.is_present().then(|| entry.addr())
    }

    pub fn directory_entry(&self, slot: usize) -> PageEntry {
        self.directory[slot]
    }
}

impl Default for AddressSpaceManager {
    fn default() -> Self {
        Self::new()
    }
}
