//! # Memory System Call Handlers
//!
//! `vidmap` gives a process direct access to its terminal's text page at
//! `VIDMAP_ADDR`. The window follows the process: it shows the live page
//! while the terminal is visible and the private page otherwise, and it is
//! removed when the process halts.

use crate::arch::Machine;
use crate::config::VIDMAP_ADDR;
use crate::kernel::Kernel;
use crate::memory::{check_user_range, copy_to_user};
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// Map the video window and store its address at `screen_start`
pub fn sys_vidmap(kernel: &mut Kernel, machine: &mut dyn Machine, screen_start: u32) -> SyscallResult {
    check_user_range(screen_start, 4)?;
    let pid = kernel.current_pid().ok_or(SyscallError::NoProcess)?;
    kernel.current_pcb_mut()?.has_vidmap = true;
    kernel.refresh_video_window(machine, pid);
    copy_to_user(machine, &kernel.memory, screen_start, &VIDMAP_ADDR.to_le_bytes())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use crate::arch::Machine;
    use crate::config::{USER_WINDOW_BASE, VIDEO_MEMORY, VIDMAP_ADDR};
    use crate::memory::copy_from_user;
    use crate::testing::{booted_kernel, sys};
    use x86_64::PhysAddr;

    #[test]
    fn test_vidmap_maps_and_reports_address() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        let out = USER_WINDOW_BASE + 0x3000;
        sys::call(&mut kernel, &mut machine, sp, 8, out, 0, 0);
        assert_eq!(machine.trap_frame(sp).rax, 0);
        let mut word = [0u8; 4];
        copy_from_user(&mut machine, &kernel.memory, out, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), VIDMAP_ADDR);
        assert_eq!(kernel.memory.translate(VIDMAP_ADDR), Some(PhysAddr::new(VIDEO_MEMORY)));
        assert!(kernel.current_pcb().unwrap().has_vidmap);
    }

    #[test]
    fn test_vidmap_rejects_kernel_pointer() {
        let (mut kernel, mut machine, sp) = booted_kernel();
        sys::call(&mut kernel, &mut machine, sp, 8, 0x0040_0000, 0, 0);
        assert_eq!(machine.trap_frame(sp).rax as u32 as i32, -1);
        assert_eq!(kernel.memory.translate(VIDMAP_ADDR), None);
    }

    #[test]
    fn test_window_removed_when_child_halts() {
        let (mut kernel, mut machine, shell_sp) = booted_kernel();
        let child_sp = sys::execute(&mut kernel, &mut machine, shell_sp, b"counter");
        sys::call(&mut kernel, &mut machine, child_sp, 8, USER_WINDOW_BASE + 0x3000, 0, 0);
        assert!(kernel.memory.video_window().is_some());
        sys::call(&mut kernel, &mut machine, child_sp, 1, 0, 0, 0);
        assert_eq!(kernel.memory.video_window(), None);
    }
}
