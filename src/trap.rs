//! # Trap Frames and Saved Contexts
//!
//! Every entry into the kernel that can switch processes (timer, `int 0x80`,
//! faults) goes through one assembly stub which pushes the general-purpose
//! registers on top of the CPU's interrupt frame. The resulting `TrapFrame`
//! lives on the interrupted process's kernel stack.
//!
//! A suspended process is fully described by the address of its topmost
//! trap frame: resuming it means loading that address into the stack pointer
//! and running the stub epilogue. `SavedContext` records exactly that.
//!
//! ```text
//!   high  ┌──────────┐
//!         │ ss       │  pushed by the CPU
//!         │ rsp      │
//!         │ rflags   │
//!         │ cs       │
//!         │ rip      │
//!         │ error    │  CPU or stub
//!         │ vector   │  stub
//!         │ rax..r15 │  stub
//!   low   └──────────┘ <- SavedContext::stack_ptr
//! ```

/// Ring-3 selectors installed by the platform GDT.
pub const USER_CODE_SELECTOR: u64 = 0x1B;
pub const USER_DATA_SELECTOR: u64 = 0x23;

/// RFLAGS with IF set and the reserved bit 1.
pub const USER_RFLAGS: u64 = 0x202;

const RFLAGS_USER_MASK: u64 = 0xDD5; // CF PF AF ZF SF TF DF OF

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

pub const TRAP_FRAME_WORDS: usize = 22;
pub const TRAP_FRAME_BYTES: usize = TRAP_FRAME_WORDS * 8;

impl TrapFrame {
    /// Frame that starts a user program at `entry` with stack `stack`.
    pub fn user_entry(entry: u32, stack: u32) -> Self {
        Self {
            rip: entry as u64,
            cs: USER_CODE_SELECTOR,
            rflags: USER_RFLAGS,
            rsp: stack as u64,
            ss: USER_DATA_SELECTOR,
            ..Self::default()
        }
    }

    pub fn from_user(&self) -> bool {
        self.cs & 3 == 3
    }

    /// The 32-bit `int 0x80` arguments: number, ebx, ecx, edx.
    pub fn syscall_args(&self) -> (u32, u32, u32, u32) {
        (
            self.rax as u32,
            self.rbx as u32,
            self.rcx as u32,
            self.rdx as u32,
        )
    }

    pub fn set_return(&mut self, value: i32) {
        self.rax = value as u32 as u64;
    }

    pub fn to_bytes(&self) -> [u8; TRAP_FRAME_BYTES] {
        let words = [
            self.r15, self.r14, self.r13, self.r12, self.r11, self.r10, self.r9, self.r8,
            self.rbp, self.rdi, self.rsi, self.rdx, self.rcx, self.rbx, self.rax, self.vector,
            self.error_code, self.rip, self.cs, self.rflags, self.rsp, self.ss,
        ];
        let mut out = [0u8; TRAP_FRAME_BYTES];
        for (chunk, word) in out.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; TRAP_FRAME_BYTES]) -> Self {
        let mut w = [0u64; TRAP_FRAME_WORDS];
        for (word, chunk) in w.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            *word = u64::from_le_bytes(b);
        }
        Self {
            r15: w[0],
            r14: w[1],
            r13: w[2],
            r12: w[3],
            r11: w[4],
            r10: w[5],
            r9: w[6],
            r8: w[7],
            rbp: w[8],
            rdi: w[9],
            rsi: w[10],
            rdx: w[11],
            rcx: w[12],
            rbx: w[13],
            rax: w[14],
            vector: w[15],
            error_code: w[16],
            rip: w[17],
            cs: w[18],
            rflags: w[19],
            rsp: w[20],
            ss: w[21],
        }
    }

    /// Copies a frame that came back from user memory, keeping only what
    /// user code may legitimately change.
    pub fn restore_user_view(&mut self, saved: &TrapFrame) {
        let vector = self.vector;
        let error_code = self.error_code;
        *self = *saved;
        self.vector = vector;
        self.error_code = error_code;
        self.rip = saved.rip as u32 as u64;
        self.rsp = saved.rsp as u32 as u64;
        self.cs = USER_CODE_SELECTOR;
        self.ss = USER_DATA_SELECTOR;
        self.rflags = (saved.rflags & RFLAGS_USER_MASK) | USER_RFLAGS;
    }
}

/// Where a suspended process resumes: its topmost trap frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedContext {
    pub stack_ptr: u64,
    pub frame_ptr: u64,
}

impl SavedContext {
    pub const fn empty() -> Self {
        Self {
            stack_ptr: 0,
            frame_ptr: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack_ptr == 0
    }
}
