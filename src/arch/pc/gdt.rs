use crate::trap::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};
use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

/// 32-bit ring 3 code: base 0, limit 4 GiB, D=1, L=0.
const USER_CODE32: u64 = 0x00CF_FA00_0000_FFFF;
/// Ring 3 data: base 0, limit 4 GiB, writable.
const USER_DATA: u64 = 0x00CF_F200_0000_FFFF;

static mut DOUBLE_FAULT_STACK: [u8; 4096] = [0; 4096];

// Written on every process switch, so not behind a Lazy.
static mut TSS: TaskStateSegment = TaskStateSegment::new();

struct Selectors {
    code_selector: SegmentSelector,
    data_selector: SegmentSelector,
    tss_selector: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();

    let code_selector = gdt.append(Descriptor::kernel_code_segment());
    let data_selector = gdt.append(Descriptor::kernel_data_segment());
    let user_code = gdt.append(Descriptor::UserSegment(USER_CODE32));
    let user_data = gdt.append(Descriptor::UserSegment(USER_DATA));
    let tss_selector =
        gdt.append(unsafe { Descriptor::tss_segment_unchecked(core::ptr::addr_of!(TSS)) });

    assert_eq!(user_code.0 as u64, USER_CODE_SELECTOR);
    assert_eq!(user_data.0 as u64, USER_DATA_SELECTOR);

    (
        gdt,
        Selectors {
            code_selector,
            data_selector,
            tss_selector,
        },
    )
});

pub fn init() {
    unsafe {
        let stack_start = core::ptr::addr_of!(DOUBLE_FAULT_STACK) as u64;
        (*core::ptr::addr_of_mut!(TSS)).interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
            VirtAddr::new(stack_start + 4096);
    }

    let (ref gdt, ref selectors) = *GDT;
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.code_selector);
        DS::set_reg(selectors.data_selector);
        ES::set_reg(selectors.data_selector);
        SS::set_reg(selectors.data_selector);

        x86_64::instructions::tables::load_tss(selectors.tss_selector);
    }
}

/// Stack the CPU loads on a ring 3 -> ring 0 transition.
pub fn set_kernel_stack(top: VirtAddr) {
    unsafe {
        (*core::ptr::addr_of_mut!(TSS)).privilege_stack_table[0] = top;
    }
}
