//! # PC Platform
//!
//! Real-hardware [`Machine`] for x86_64 long mode, entered from
//! `bootloader_api`. User programs run as 32-bit code in compatibility
//! mode below 4 GiB; the kernel lives in the upper half.
//!
//! ```text
//!   PML4[0] ─▶ PDPT[0] ─▶ directory (AddressSpaceManager, 2 MiB entries)
//!   PML4[256..] ─▶ bootloader mappings: kernel, physical memory, framebuffer
//! ```
//!
//! All physical memory is reachable at a fixed offset chosen by the
//! bootloader, which is how `read_phys`/`write_phys` and the text pages
//! work.

pub mod display;
pub mod gdt;
pub mod init;
pub mod interrupts;
pub mod pic;
pub mod stubs;

use crate::arch::Machine;
use crate::config::{KERNEL_STACK_SIZE, MAX_TASK_NUM};
use crate::memory::paging::PageTable;
use crate::sync::IrqMutex;
use crate::trap::TrapFrame;
use crate::Kernel;
use x86_64::registers::control::Cr3;
use x86_64::structures::paging::{
    OffsetPageTable, PageTable as HardwareTable, PageTableFlags, PhysFrame, Translate,
};
use x86_64::{PhysAddr, VirtAddr};

pub static KERNEL: IrqMutex<Kernel> = IrqMutex::new(Kernel::new());
static MACHINE: IrqMutex<Option<HardwareMachine>> = IrqMutex::new(None);

#[repr(C, align(16))]
struct KernelStacks([u8; KERNEL_STACK_SIZE * MAX_TASK_NUM]);

static mut KERNEL_STACKS: KernelStacks = KernelStacks([0; KERNEL_STACK_SIZE * MAX_TASK_NUM]);

/// Links PML4[0] to the user directory.
static mut LOW_PDPT: HardwareTable = HardwareTable::new();

pub struct HardwareMachine {
    physical_offset: u64,
    mapper: OffsetPageTable<'static>,
}

impl HardwareMachine {
    /// # Safety
    /// `physical_offset` must be where the bootloader mapped all physical
    /// memory, and this must be the only `HardwareMachine`.
    pub unsafe fn new(physical_offset: u64) -> Self {
        let (frame, _) = Cr3::read();
        let pml4 = (physical_offset + frame.start_address().as_u64()) as *mut HardwareTable;
        Self {
            physical_offset,
            mapper: OffsetPageTable::new(&mut *pml4, VirtAddr::new(physical_offset)),
        }
    }

    fn virt(&self, addr: PhysAddr) -> u64 {
        self.physical_offset + addr.as_u64()
    }

    fn translate(&self, ptr: *const u8) -> PhysAddr {
        let addr = VirtAddr::from_ptr(ptr);
        match self.mapper.translate_addr(addr) {
            Some(phys) => phys,
            None => panic!("kernel address {:?} is not mapped", addr),
        }
    }
}

impl Machine for HardwareMachine {
    fn read_phys(&self, addr: PhysAddr, buf: &mut [u8]) {
        unsafe {
            core::ptr::copy_nonoverlapping(self.virt(addr) as *const u8, buf.as_mut_ptr(), buf.len());
        }
    }

    fn write_phys(&mut self, addr: PhysAddr, data: &[u8]) {
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), self.virt(addr) as *mut u8, data.len());
        }
    }

    fn table_address(&self, table: &PageTable) -> PhysAddr {
        self.translate(table as *const PageTable as *const u8)
    }

    fn load_directory(&mut self, directory: PhysAddr) {
        let user = PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE;
        let pdpt = unsafe { &mut *core::ptr::addr_of_mut!(LOW_PDPT) };
        pdpt[0].set_addr(directory, user);
        let pdpt_phys = self.translate(pdpt as *const HardwareTable as *const u8);
        let pml4 = self.mapper.level_4_table_mut();
        pml4[0].set_addr(pdpt_phys, user);
        self.flush_tlb();
    }

    fn flush_tlb(&mut self) {
        let (frame, flags): (PhysFrame, _) = Cr3::read();
        unsafe { Cr3::write(frame, flags) };
    }

    fn kernel_stack_region_end(&self) -> u64 {
        let stacks = core::ptr::addr_of!(KERNEL_STACKS) as u64;
        stacks + core::mem::size_of::<KernelStacks>() as u64
    }

    fn set_kernel_stack(&mut self, top: u64) {
        gdt::set_kernel_stack(VirtAddr::new(top));
    }

    fn trap_frame(&mut self, stack_ptr: u64) -> &mut TrapFrame {
        // Frames live on the static kernel stacks for as long as the
        // process they belong to is suspended in them.
        unsafe { &mut *(stack_ptr as *mut TrapFrame) }
    }

    fn end_of_timer_interrupt(&mut self) {
        pic::end_of_interrupt(pic::InterruptIndex::Timer);
    }

    fn set_speaker(&mut self, tone: Option<u32>) {
        interrupts::set_speaker(tone);
    }
}

pub(crate) fn install_machine(machine: HardwareMachine) {
    *MACHINE.lock() = Some(machine);
}

/// Runs `f` on the kernel and the machine. Always locks in that order.
pub fn with_kernel<R>(f: impl FnOnce(&mut Kernel, &mut HardwareMachine) -> R) -> R {
    let mut kernel = KERNEL.lock();
    let mut machine = MACHINE.lock();
    let Some(machine) = machine.as_mut() else {
        panic!("platform used before init");
    };
    f(&mut kernel, machine)
}
