//! System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    // Process
    Halt = 1,
    Execute = 2,

    // I/O
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,

    GetArgs = 7,
    Vidmap = 8,

    // Signals
    SetHandler = 9,
    Sigreturn = 10,

    Unknown = u32::MAX,
}

impl From<u32> for SyscallNumber {
    fn from(num: u32) -> Self {
        match num {
            1 => Self::Halt,
            2 => Self::Execute,
            3 => Self::Read,
            4 => Self::Write,
            5 => Self::Open,
            6 => Self::Close,
            7 => Self::GetArgs,
            8 => Self::Vidmap,
            9 => Self::SetHandler,
            10 => Self::Sigreturn,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering() {
        assert_eq!(SyscallNumber::from(1), SyscallNumber::Halt);
        assert_eq!(SyscallNumber::from(10), SyscallNumber::Sigreturn);
        assert_eq!(SyscallNumber::Sigreturn as u32, 10);
        assert_eq!(SyscallNumber::from(0), SyscallNumber::Unknown);
        assert_eq!(SyscallNumber::from(11), SyscallNumber::Unknown);
    }
}
