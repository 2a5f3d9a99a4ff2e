use std::io;

/// Everything that can stop a cycle. None of these are retried; the caller
/// gets them straight back from `cycle()` / `execute_opcode()`.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("invalid register index {index}")]
    InvalidRegister { index: u8 },

    #[error("invalid key index {index}")]
    InvalidKey { index: u8 },

    #[error("invalid coordinate ({x}, {y})")]
    InvalidCoordinate { x: usize, y: usize },

    #[error("invalid pixel value {value}")]
    InvalidPixel { value: u8 },

    #[error("memory access out of bounds at {addr:#06x} (len {len})")]
    MemoryOutOfBounds { addr: u16, len: usize },

    #[error("index register overflow: {index:#06x} + {offset:#04x}")]
    IndexOverflow { index: u16, offset: u16 },

    #[error("unknown opcode {opcode:#06x}")]
    UnknownOpcode { opcode: u16 },

    #[error("stack overflow: call depth exceeds {depth}")]
    StackOverflow { depth: usize },

    #[error("stack underflow: return with empty call stack")]
    StackUnderflow,

    #[error("reading program: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VmError>;
