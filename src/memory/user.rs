//! Range-checked copies between the kernel and the current process's
//! user window. Pointers are checked before any byte is touched.

use super::address_space::AddressSpaceManager;
use crate::arch::Machine;
use crate::config::{USER_WINDOW_BASE, USER_WINDOW_END};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadUserPointer;

/// Checks that `[addr, addr + len)` lies inside the user window.
pub fn check_user_range(addr: u32, len: usize) -> Result<(), BadUserPointer> {
    let end = (addr as u64).checked_add(len as u64).ok_or(BadUserPointer)?;
    if addr < USER_WINDOW_BASE || end > USER_WINDOW_END as u64 {
        return Err(BadUserPointer);
    }
    Ok(())
}

pub fn copy_from_user(
    machine: &mut dyn Machine,
    memory: &AddressSpaceManager,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), BadUserPointer> {
    check_user_range(addr, buf.len())?;
    if buf.is_empty() {
        return Ok(());
    }
    let phys = memory.translate(addr).ok_or(BadUserPointer)?;
    // Both halves of a process frame are physically contiguous.
    machine.read_phys(phys, buf);
    Ok(())
}

pub fn copy_to_user(
    machine: &mut dyn Machine,
    memory: &AddressSpaceManager,
    addr: u32,
    data: &[u8],
) -> Result<(), BadUserPointer> {
    check_user_range(addr, data.len())?;
    if data.is_empty() {
        return Ok(());
    }
    let phys = memory.translate(addr).ok_or(BadUserPointer)?;
    machine.write_phys(phys, data);
    Ok(())
}

/// Reads a NUL-terminated string into `buf` and returns its length.
///
/// Fails if the string leaves the user window or does not fit in `buf`.
pub fn read_user_cstr(
    machine: &mut dyn Machine,
    memory: &AddressSpaceManager,
    addr: u32,
    buf: &mut [u8],
) -> Result<usize, BadUserPointer> {
    for (i, slot) in buf.iter_mut().enumerate() {
        let mut byte = [0u8];
        let at = addr.checked_add(i as u32).ok_or(BadUserPointer)?;
        copy_from_user(machine, memory, at, &mut byte)?;
        if byte[0] == 0 {
            return Ok(i);
        }
        *slot = byte[0];
    }
    Err(BadUserPointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{process_frame, PROGRAM_LOAD_ADDR};
    use crate::process::Pid;
    use crate::testing::MockMachine;
    use x86_64::PhysAddr;

    fn mapped() -> (AddressSpaceManager, MockMachine) {
        let mut machine = MockMachine::new();
        let mut memory = AddressSpaceManager::new();
        memory.init(&mut machine);
        memory.map_process(&mut machine, Pid::new(2));
        (memory, machine)
    }

    #[test]
    fn test_range_check_bounds() {
        assert!(check_user_range(USER_WINDOW_BASE, 16).is_ok());
        assert!(check_user_range(USER_WINDOW_END - 4, 4).is_ok());
        assert_eq!(check_user_range(USER_WINDOW_END - 4, 5), Err(BadUserPointer));
        assert_eq!(check_user_range(USER_WINDOW_BASE - 1, 1), Err(BadUserPointer));
        assert_eq!(check_user_range(0, 0), Err(BadUserPointer));
        assert_eq!(check_user_range(u32::MAX, 2), Err(BadUserPointer));
    }

    #[test]
    fn test_copy_lands_in_process_frame() {
        let (memory, mut machine) = mapped();
        copy_to_user(&mut machine, &memory, PROGRAM_LOAD_ADDR, b"abc").unwrap();
        let mut raw = [0u8; 3];
        machine.read_phys(PhysAddr::new(process_frame(2) + 0x48000), &mut raw);
        assert_eq!(&raw, b"abc");

        let mut back = [0u8; 3];
        copy_from_user(&mut machine, &memory, PROGRAM_LOAD_ADDR, &mut back).unwrap();
        assert_eq!(&back, b"abc");
    }

    #[test]
    fn test_kernel_pointer_rejected() {
        let (memory, mut machine) = mapped();
        assert_eq!(
            copy_to_user(&mut machine, &memory, 0xB8000, b"x"),
            Err(BadUserPointer)
        );
    }

    #[test]
    fn test_read_cstr() {
        let (memory, mut machine) = mapped();
        copy_to_user(&mut machine, &memory, PROGRAM_LOAD_ADDR, b"shell\0junk").unwrap();
        let mut buf = [0u8; 16];
        let n = read_user_cstr(&mut machine, &memory, PROGRAM_LOAD_ADDR, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"shell");

        let mut tiny = [0u8; 3];
        assert_eq!(
            read_user_cstr(&mut machine, &memory, PROGRAM_LOAD_ADDR, &mut tiny),
            Err(BadUserPointer)
        );
    }
}
