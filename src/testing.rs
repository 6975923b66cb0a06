//! Host-side test support: a simulated machine, a file-system image
//! builder and shortcuts for driving system calls.

use crate::arch::Machine;
use crate::config::{EXECUTABLE_HEADER_LEN, ENTRY_POINT_OFFSET, EXECUTABLE_MAGIC, PROGRAM_LOAD_ADDR, USER_WINDOW_BASE};
use crate::fs::{FileType, BLOCK_SIZE, NAME_LEN};
use crate::memory::paging::PageTable;
use crate::trap::TrapFrame;
use crate::Kernel;
use std::boxed::Box;
use std::collections::HashMap;
use std::vec::Vec;
use x86_64::PhysAddr;

const PAGE: u64 = 4096;

/// End of the simulated kernel-stack region.
pub const STACK_REGION_END: u64 = 0x0080_0000;

/// Sparse physical memory plus counters for every privileged operation.
#[derive(Default)]
pub struct MockMachine {
    pages: HashMap<u64, Box<[u8; PAGE as usize]>>,
    frames: HashMap<u64, TrapFrame>,
    pub directory_loads: usize,
    pub tlb_flushes: usize,
    pub kernel_stack: u64,
    pub kernel_stack_installs: usize,
    pub timer_acks: usize,
    /// Tone the speaker is playing.
    pub speaker: Option<u32>,
}

impl MockMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Machine for MockMachine {
    fn read_phys(&self, addr: PhysAddr, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let a = addr.as_u64() + i as u64;
            *byte = self
                .pages
                .get(&(a / PAGE))
                .map_or(0, |page| page[(a % PAGE) as usize]);
        }
    }

    fn write_phys(&mut self, addr: PhysAddr, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let a = addr.as_u64() + i as u64;
            let page = self
                .pages
                .entry(a / PAGE)
                .or_insert_with(|| Box::new([0; PAGE as usize]));
            page[(a % PAGE) as usize] = *byte;
        }
    }

    fn table_address(&self, table: &PageTable) -> PhysAddr {
        PhysAddr::new(table as *const PageTable as u64)
    }

    fn load_directory(&mut self, _directory: PhysAddr) {
        self.directory_loads += 1;
    }

    fn flush_tlb(&mut self) {
        self.tlb_flushes += 1;
    }

    fn kernel_stack_region_end(&self) -> u64 {
        STACK_REGION_END
    }

    fn set_kernel_stack(&mut self, top: u64) {
        self.kernel_stack = top;
        self.kernel_stack_installs += 1;
    }

    fn trap_frame(&mut self, stack_ptr: u64) -> &mut TrapFrame {
        self.frames.entry(stack_ptr).or_default()
    }

    fn end_of_timer_interrupt(&mut self) {
        self.timer_acks += 1;
    }

    fn set_speaker(&mut self, tone: Option<u32>) {
        self.speaker = tone;
    }
}

enum Node {
    Directory,
    Rtc,
    File(Vec<u8>),
}

/// Builds a file-system image in memory.
#[derive(Default)]
pub struct FsImageBuilder {
    entries: Vec<(Vec<u8>, Node)>,
}

impl FsImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push((name.as_bytes().to_vec(), Node::Directory));
        self
    }

    pub fn rtc(mut self, name: &str) -> Self {
        self.entries.push((name.as_bytes().to_vec(), Node::Rtc));
        self
    }

    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.entries
            .push((name.as_bytes().to_vec(), Node::File(contents.to_vec())));
        self
    }

    /// Lays out the image and leaks it, as a ramdisk would be.
    pub fn build(self) -> &'static [u8] {
        let files: Vec<&Vec<u8>> = self
            .entries
            .iter()
            .filter_map(|(_, node)| match node {
                Node::File(data) => Some(data),
                _ => None,
            })
            .collect();
        let inode_count = files.len();
        let data_blocks: usize = files.iter().map(|f| f.len().div_ceil(BLOCK_SIZE)).sum();
        let mut image = vec![0u8; (1 + inode_count + data_blocks) * BLOCK_SIZE];

        put_u32(&mut image, 0, self.entries.len() as u32);
        put_u32(&mut image, 4, inode_count as u32);
        put_u32(&mut image, 8, data_blocks as u32);

        let mut inode = 0usize;
        let mut next_block = 0usize;
        for (index, (name, node)) in self.entries.iter().enumerate() {
            assert!(name.len() <= NAME_LEN, "name too long for a dentry");
            let at = 64 + index * 64;
            image[at..at + name.len()].copy_from_slice(name);
            let (file_type, inode_number) = match node {
                Node::Directory => (FileType::Directory, 0),
                Node::Rtc => (FileType::Rtc, 0),
                Node::File(data) => {
                    let inode_at = (1 + inode) * BLOCK_SIZE;
                    put_u32(&mut image, inode_at, data.len() as u32);
                    for (slot, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
                        put_u32(&mut image, inode_at + 4 + slot * 4, next_block as u32);
                        let block_at = (1 + inode_count + next_block) * BLOCK_SIZE;
                        image[block_at..block_at + chunk.len()].copy_from_slice(chunk);
                        next_block += 1;
                    }
                    inode += 1;
                    (FileType::Regular, inode as u32 - 1)
                }
            };
            put_u32(&mut image, at + NAME_LEN, file_type.as_raw());
            put_u32(&mut image, at + NAME_LEN + 4, inode_number);
        }
        Box::leak(image.into_boxed_slice())
    }
}

fn put_u32(image: &mut [u8], at: usize, value: u32) {
    image[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// An executable file image: header with `entry`, then `body`.
pub fn executable(entry: u32, body: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; EXECUTABLE_HEADER_LEN];
    image[..4].copy_from_slice(&EXECUTABLE_MAGIC);
    image[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
    image.extend_from_slice(body);
    image
}

/// A kernel booted on a small image, with the shell running as pid 0.
/// Returns the shell's trap frame pointer.
pub fn booted_kernel() -> (Box<Kernel>, MockMachine, u64) {
    booted_kernel_with(&[])
}

/// [`booted_kernel`] with `extra` files added to the image.
pub fn booted_kernel_with(extra: &[(&str, &[u8])]) -> (Box<Kernel>, MockMachine, u64) {
    let entry = PROGRAM_LOAD_ADDR + 0x100;
    let mut builder = FsImageBuilder::new()
        .directory(".")
        .rtc("rtc")
        .file("shell", &executable(entry, b"shell body"))
        .file("counter", &executable(entry, b"counter body"))
        .file("frame0.txt", b"fish in a bowl");
    for (name, contents) in extra {
        builder = builder.file(name, contents);
    }
    let image = builder.build();
    let mut kernel = Box::new(Kernel::new());
    kernel.mount(image).unwrap();
    let mut machine = MockMachine::new();
    let sp = kernel.boot(&mut machine).unwrap();
    (kernel, machine, sp)
}

/// Issuing system calls the way `int 0x80` does.
pub mod sys {
    use super::*;
    use crate::kernel::SYSCALL_VECTOR;
    use core::task::Poll;

    /// Scratch user address for string arguments.
    pub const SCRATCH: u32 = USER_WINDOW_BASE + 0x1000;

    pub fn call(
        kernel: &mut Kernel,
        machine: &mut MockMachine,
        stack_ptr: u64,
        number: u32,
        a: u32,
        b: u32,
        c: u32,
    ) -> Poll<u64> {
        let frame = machine.trap_frame(stack_ptr);
        frame.vector = SYSCALL_VECTOR;
        frame.rax = number as u64;
        frame.rbx = a as u64;
        frame.rcx = b as u64;
        frame.rdx = c as u64;
        kernel.handle_trap(machine, stack_ptr)
    }

    /// Writes `bytes` plus a NUL into the current process at `SCRATCH`.
    pub fn put_str(machine: &mut MockMachine, kernel: &Kernel, bytes: &[u8]) -> u32 {
        let mut data = bytes.to_vec();
        data.push(0);
        crate::memory::copy_to_user(machine, &kernel.memory, SCRATCH, &data).unwrap();
        SCRATCH
    }

    /// Runs `execute(command)` and returns the child's entry frame.
    pub fn execute(
        kernel: &mut Kernel,
        machine: &mut MockMachine,
        stack_ptr: u64,
        command: &[u8],
    ) -> u64 {
        let cmd = put_str(machine, kernel, command);
        match call(kernel, machine, stack_ptr, 2, cmd, 0, 0) {
            Poll::Ready(next) if next != stack_ptr => next,
            other => panic!(
                "execute {:?} did not start a child: {:?}, eax {:#x}",
                core::str::from_utf8(command),
                other,
                machine.trap_frame(stack_ptr).rax
            ),
        }
    }
}
