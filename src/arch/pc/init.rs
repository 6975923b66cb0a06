//! Kernel initialization phases
//!
//! Boot runs a fixed list of phases in order. Each one is tracked in a
//! status table and reported on the serial console; the first failure
//! stops the boot.

use super::{display, gdt, interrupts, pic, stubs, with_kernel, HardwareMachine};
use crate::config::{process_frame, MAX_TASK_NUM, PIT_FREQUENCY_HZ};
use crate::println;
use bootloader_api::info::{MemoryRegionKind, MemoryRegions};
use bootloader_api::BootInfo;
use core::fmt;
use spin::Mutex;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(&'static str),
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

/// Kernel component status
#[derive(Debug, Clone, Copy)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

const PHASES: [&str; 6] = [
    "Memory Layout",
    "Descriptor Tables",
    "Interrupt Controller",
    "File System",
    "Display",
    "First Shell",
];

static INIT_STATUS: Mutex<[ComponentStatus; PHASES.len()]> = Mutex::new({
    let mut table = [ComponentStatus {
        name: "",
        status: InitStatus::NotStarted,
    }; PHASES.len()];
    let mut i = 0;
    while i < PHASES.len() {
        table[i].name = PHASES[i];
        i += 1;
    }
    table
});

fn update_component_status(name: &'static str, status: InitStatus) {
    let mut components = INIT_STATUS.lock();
    if let Some(comp) = components.iter_mut().find(|c| c.name == name) {
        comp.status = status;
    }
}

/// Snapshot of every phase, in boot order.
pub fn statuses() -> [ComponentStatus; PHASES.len()] {
    *INIT_STATUS.lock()
}

fn init_phase<T>(
    name: &'static str,
    init_fn: impl FnOnce() -> Result<T, &'static str>,
) -> Result<T, &'static str> {
    update_component_status(name, InitStatus::InProgress);
    let index = PHASES.iter().position(|p| *p == name).unwrap_or(0);
    println!("[{}/{}] Initializing {}...", index + 1, PHASES.len(), name);

    match init_fn() {
        Ok(value) => {
            update_component_status(name, InitStatus::Completed);
            println!("    ok: {}", name);
            Ok(value)
        }
        Err(e) => {
            update_component_status(name, InitStatus::Failed(e));
            println!("    FAILED: {}: {}", name, e);
            Err(e)
        }
    }
}

/// Brings the machine up and returns the trap frame of the first shell.
pub fn init_kernel(boot_info: &'static mut BootInfo) -> Result<u64, &'static str> {
    println!("tern kernel booting");

    let physical_offset = boot_info
        .physical_memory_offset
        .into_option()
        .ok_or("bootloader did not map physical memory")?;
    let ramdisk_len = boot_info.ramdisk_len;
    let ramdisk_addr = boot_info.ramdisk_addr.into_option();
    let BootInfo {
        memory_regions,
        framebuffer,
        ..
    } = boot_info;
    let framebuffer = framebuffer.as_mut();

    init_phase("Memory Layout", || {
        check_process_frames(memory_regions)?;
        super::install_machine(unsafe { HardwareMachine::new(physical_offset) });
        Ok(())
    })?;

    init_phase("Descriptor Tables", || {
        gdt::init();
        interrupts::init_idt();
        Ok(())
    })?;

    init_phase("Interrupt Controller", || {
        pic::init();
        interrupts::init_pit(PIT_FREQUENCY_HZ);
        interrupts::init_rtc();
        Ok(())
    })?;

    init_phase("File System", || {
        let addr = ramdisk_addr.ok_or("no ramdisk with a file-system image")?;
        let image = unsafe { core::slice::from_raw_parts(addr as *const u8, ramdisk_len as usize) };
        with_kernel(|kernel, _| kernel.mount(image)).map_err(|_| "file-system image is corrupt")
    })?;

    init_phase("Display", move || {
        display::init(framebuffer.ok_or("no framebuffer")?);
        Ok(())
    })?;

    init_phase("First Shell", || {
        with_kernel(|kernel, machine| kernel.boot(machine)).map_err(|_| "cannot start shell")
    })
}

/// Process frames sit at fixed physical addresses; they must be free RAM.
fn check_process_frames(regions: &MemoryRegions) -> Result<(), &'static str> {
    let start = process_frame(0);
    let end = process_frame(MAX_TASK_NUM);
    let mut covered = start;
    while covered < end {
        let region = regions
            .iter()
            .find(|r| r.kind == MemoryRegionKind::Usable && r.start <= covered && covered < r.end)
            .ok_or("process frames overlap reserved memory")?;
        covered = region.end;
    }
    Ok(())
}

/// Enters the first shell. Never returns.
pub fn start(first_frame: u64) -> ! {
    println!("entering user mode");
    unsafe { stubs::resume_frame(first_frame) }
}
