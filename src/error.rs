use thiserror::Error;

/// Engine-level faults (§7). CIO/SIO error codes are *not* represented here —
/// per spec they travel through the `Y` register and status bytes, not as
/// Rust errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("exec on undefined memory at ${0:04X}")]
    ExecUndef(u16),
    #[error("exec on uninitialized memory at ${0:04X}")]
    ExecUninit(u16),
    #[error("read from undefined memory at ${0:04X}")]
    ReadUndef(u16),
    #[error("read from uninitialized memory at ${0:04X}")]
    ReadUninit(u16),
    #[error("write to undefined memory at ${0:04X}")]
    WriteUndef(u16),
    #[error("write to ROM at ${0:04X}")]
    WriteRom(u16),
    #[error("BRK executed at ${0:04X}")]
    Break(u16),
    #[error("invalid instruction ${0:02X} at ${1:04X}")]
    InvalidIns(u8, u16),
    /// Internal sentinel raised when a re-entrant `call()` returns through
    /// its synthesized RTS. Never escapes `Cpu::call`.
    #[error("call-return sentinel")]
    CallRet,
    #[error("cycle limit reached at ${0:04X}")]
    CycleLimit(u16),
    #[error("user error: {0}")]
    User(String),
}

impl SimError {
    /// True for the memory-fault classes the §7 error-level policy can
    /// silence or demote.
    pub fn is_memory_fault(&self) -> bool {
        matches!(
            self,
            SimError::ExecUndef(_)
                | SimError::ExecUninit(_)
                | SimError::ReadUndef(_)
                | SimError::ReadUninit(_)
                | SimError::WriteUndef(_)
                | SimError::WriteRom(_)
        )
    }

    pub fn is_uninit_read(&self) -> bool {
        matches!(self, SimError::ReadUninit(_))
    }

    pub fn address(&self) -> Option<u16> {
        match *self {
            SimError::ExecUndef(a)
            | SimError::ExecUninit(a)
            | SimError::ReadUndef(a)
            | SimError::ReadUninit(a)
            | SimError::WriteUndef(a)
            | SimError::WriteRom(a)
            | SimError::Break(a)
            | SimError::InvalidIns(_, a)
            | SimError::CycleLimit(a) => Some(a),
            _ => None,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
