#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
extern crate rlibc;

#[cfg(target_os = "none")]
mod boot {
    use bootloader_api::config::{BootloaderConfig, Mapping};
    use bootloader_api::{entry_point, BootInfo};
    use core::panic::PanicInfo;
    use tern::arch::pc::init;
    use tern::config::KERNEL_STACK_SIZE;
    use tern::println;

    const BOOTLOADER_CONFIG: BootloaderConfig = {
        let mut config = BootloaderConfig::new_default();
        config.mappings.physical_memory = Some(Mapping::Dynamic);
        // Keep PML4[0] free for the user page directory.
        config.mappings.dynamic_range_start = Some(0xFFFF_8000_0000_0000);
        config.kernel_stack_size = 16 * KERNEL_STACK_SIZE as u64;
        config
    };

    entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

    fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
        tern::SERIAL.lock().init();

        match init::init_kernel(boot_info) {
            Ok(first_frame) => init::start(first_frame),
            Err(e) => {
                println!("Kernel initialization failed: {}", e);
                for component in init::statuses() {
                    println!("    {:<22} {}", component.name, component.status);
                }
                halt_loop()
            }
        }
    }

    fn halt_loop() -> ! {
        x86_64::instructions::interrupts::disable();
        loop {
            x86_64::instructions::hlt();
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("PANIC : {} | {:?}", info.message(), info.location());
        halt_loop()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
