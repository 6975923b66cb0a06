//! # Page Directory and Table Entries
//!
//! One 8-byte entry format serves the directory and its small tables:
//!
//! | Bit(s) | Flag              | Meaning                                 |
//! |--------|-------------------|-----------------------------------------|
//! | 0      | `PRESENT`         | Translation is valid                    |
//! | 1      | `WRITABLE`        | Writes allowed                          |
//! | 2      | `USER_ACCESSIBLE` | Ring 3 may use the translation          |
//! | 3      | `WRITE_THROUGH`   | Write-through caching                   |
//! | 4      | `NO_CACHE`        | Caching disabled                        |
//! | 5      | `ACCESSED`        | Set by the CPU on use                   |
//! | 6      | `DIRTY`           | Set by the CPU on write                 |
//! | 7      | `HUGE_PAGE`       | Directory entry maps a large page       |
//! | 8      | `GLOBAL`          | Survives a directory reload             |
//! | 12..51 | address           | Frame (or next table) physical address  |

use core::ops::{Index, IndexMut};
use x86_64::structures::paging::PageTableFlags;
use x86_64::PhysAddr;

pub const ENTRY_COUNT: usize = 512;

/// Bytes mapped by one large directory entry.
pub const LARGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;

const ADDRESS_MASK: u64 = 0x000f_ffff_ffff_f000;

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(u64);

impl PageEntry {
    /// Not present, writable, supervisor-only.
    pub const fn blank() -> Self {
        Self(PageTableFlags::WRITABLE.bits())
    }

    pub fn new(addr: PhysAddr, flags: PageTableFlags) -> Self {
        Self((addr.as_u64() & ADDRESS_MASK) | flags.bits())
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn flags(self) -> PageTableFlags {
        PageTableFlags::from_bits_truncate(self.0)
    }

    pub fn addr(self) -> PhysAddr {
        PhysAddr::new(self.0 & ADDRESS_MASK)
    }

    pub fn set_addr(&mut self, addr: PhysAddr) {
        self.0 = (self.0 & !ADDRESS_MASK) | (addr.as_u64() & ADDRESS_MASK);
    }

    pub fn is_present(self) -> bool {
        self.flags().contains(PageTableFlags::PRESENT)
    }

    pub fn is_writable(self) -> bool {
        self.flags().contains(PageTableFlags::WRITABLE)
    }

    pub fn is_user(self) -> bool {
        self.flags().contains(PageTableFlags::USER_ACCESSIBLE)
    }

    pub fn is_cache_disabled(self) -> bool {
        self.flags().contains(PageTableFlags::NO_CACHE)
    }

    pub fn is_large(self) -> bool {
        self.flags().contains(PageTableFlags::HUGE_PAGE)
    }

    pub fn is_global(self) -> bool {
        self.flags().contains(PageTableFlags::GLOBAL)
    }

    pub fn set_present(&mut self, on: bool) {
        self.set(PageTableFlags::PRESENT, on);
    }

    pub fn set_user(&mut self, on: bool) {
        self.set(PageTableFlags::USER_ACCESSIBLE, on);
    }

    fn set(&mut self, flag: PageTableFlags, on: bool) {
        if on {
            self.0 |= flag.bits();
        } else {
            self.0 &= !flag.bits();
        }
    }
}

impl core::fmt::Debug for PageEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageEntry")
            .field("addr", &self.addr())
            .field("flags", &self.flags())
            .finish()
    }
}

/// One page-aligned table of 512 entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntry; ENTRY_COUNT],
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [PageEntry::blank(); ENTRY_COUNT],
        }
    }

    /// Resets every entry to [`PageEntry::blank`].
    pub fn clear(&mut self) {
        self.entries.fill(PageEntry::blank());
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageEntry> {
        self.entries.iter()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for PageTable {
    type Output = PageEntry;

    fn index(&self, index: usize) -> &PageEntry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut PageEntry {
        &mut self.entries[index]
    }
}
