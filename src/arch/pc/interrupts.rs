use super::pic::{end_of_interrupt, InterruptIndex};
use super::{gdt, stubs, with_kernel};
use crate::kernel::SYSCALL_VECTOR;
use crate::println;
use spin::Lazy;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};
use x86_64::{PrivilegeLevel, VirtAddr};

const KEYBOARD_DATA_PORT: u16 = 0x60;
const CMOS_INDEX_PORT: u16 = 0x70;
const CMOS_DATA_PORT: u16 = 0x71;
const RTC_STATUS_C: u8 = 0x0C;

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    // CPU EXCEPTIONS (0-31), timer and int 0x80 all go through the trap
    // stubs so they can switch processes.
    let stub = |f: unsafe extern "C" fn()| VirtAddr::new(f as usize as u64);
    unsafe {
        idt.divide_error.set_handler_addr(stub(stubs::trap_divide_error));
        idt.overflow.set_handler_addr(stub(stubs::trap_overflow));
        idt.bound_range_exceeded.set_handler_addr(stub(stubs::trap_bound_range));
        idt.invalid_opcode.set_handler_addr(stub(stubs::trap_invalid_opcode));
        idt.device_not_available.set_handler_addr(stub(stubs::trap_device_not_available));
        idt.invalid_tss.set_handler_addr(stub(stubs::trap_invalid_tss));
        idt.segment_not_present.set_handler_addr(stub(stubs::trap_segment_not_present));
        idt.stack_segment_fault.set_handler_addr(stub(stubs::trap_stack_segment));
        idt.general_protection_fault.set_handler_addr(stub(stubs::trap_general_protection));
        idt.page_fault.set_handler_addr(stub(stubs::trap_page_fault));
        idt.x87_floating_point.set_handler_addr(stub(stubs::trap_x87_floating_point));
        idt.alignment_check.set_handler_addr(stub(stubs::trap_alignment_check));
        idt.simd_floating_point.set_handler_addr(stub(stubs::trap_simd_floating_point));

        idt[InterruptIndex::Timer.as_u8()].set_handler_addr(stub(stubs::trap_timer));
        idt[SYSCALL_VECTOR as u8]
            .set_handler_addr(stub(stubs::trap_syscall))
            .set_privilege_level(PrivilegeLevel::Ring3);
    }
    idt.breakpoint.set_handler_fn(breakpoint_handler);
    // Double fault needs its own stack to avoid cascading failures
    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    // HARDWARE INTERRUPTS that never switch processes
    idt[InterruptIndex::Keyboard.as_u8()].set_handler_fn(keyboard_interrupt_handler);
    idt[InterruptIndex::Rtc.as_u8()].set_handler_fn(rtc_interrupt_handler);

    idt
});

pub fn init_idt() {
    IDT.load();
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    println!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn double_fault_handler(stack_frame: InterruptStackFrame, error_code: u64) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{stack_frame:#?}\n CODE{error_code}");
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    let mut port = Port::new(KEYBOARD_DATA_PORT);
    let scancode: u8 = unsafe { port.read() };

    with_kernel(|kernel, machine| kernel.on_scancode(machine, scancode));

    end_of_interrupt(InterruptIndex::Keyboard);
}

extern "x86-interrupt" fn rtc_interrupt_handler(_stack_frame: InterruptStackFrame) {
    with_kernel(|kernel, _| kernel.on_rtc_interrupt());

    // The RTC raises nothing more until status C has been read.
    unsafe {
        Port::<u8>::new(CMOS_INDEX_PORT).write(RTC_STATUS_C);
        let _: u8 = Port::new(CMOS_DATA_PORT).read();
    }
    end_of_interrupt(InterruptIndex::Rtc);
}

/// Runs the RTC's periodic interrupt at 1024 Hz.
pub fn init_rtc() {
    const STATUS_A: u8 = 0x8A;
    const STATUS_B: u8 = 0x8B;
    const PERIODIC_ENABLE: u8 = 0x40;
    const RATE_1024_HZ: u8 = 6;

    let mut index = Port::<u8>::new(CMOS_INDEX_PORT);
    let mut data = Port::<u8>::new(CMOS_DATA_PORT);
    unsafe {
        index.write(STATUS_B);
        let b = data.read();
        index.write(STATUS_B);
        data.write(b | PERIODIC_ENABLE);

        index.write(STATUS_A);
        let a = data.read();
        index.write(STATUS_A);
        data.write((a & 0xF0) | RATE_1024_HZ);
    }
}

/// Programs PIT channel 0 as the scheduler tick.
pub fn init_pit(hz: u32) {
    use crate::devices::pit::{divisor, CHANNEL0_PORT, COMMAND_PORT, SQUARE_WAVE_COMMAND};

    let [low, high] = divisor(hz).to_le_bytes();
    unsafe {
        Port::<u8>::new(COMMAND_PORT).write(SQUARE_WAVE_COMMAND);
        let mut channel = Port::<u8>::new(CHANNEL0_PORT);
        channel.write(low);
        channel.write(high);
    }
}

/// Starts channel 2 at `hz` and connects it to the speaker, or disconnects it.
pub fn set_speaker(tone: Option<u32>) {
    use crate::devices::pit::{divisor, COMMAND_PORT};
    use crate::devices::speaker::{gate, CHANNEL2_PORT, CHANNEL2_SQUARE_WAVE, SPEAKER_PORT};

    let mut speaker = Port::<u8>::new(SPEAKER_PORT);
    unsafe {
        if let Some(hz) = tone {
            let [low, high] = divisor(hz).to_le_bytes();
            Port::<u8>::new(COMMAND_PORT).write(CHANNEL2_SQUARE_WAVE);
            let mut channel = Port::<u8>::new(CHANNEL2_PORT);
            channel.write(low);
            channel.write(high);
        }
        let current = speaker.read();
        speaker.write(gate(current, tone.is_some()));
    }
}
