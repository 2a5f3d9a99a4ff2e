use crate::error::{Result, VmError};

pub const STACK_DEPTH: usize = 16;

/// Return addresses for CALL/RET. Overflow and underflow are errors rather
/// than wrapping into neighbouring slots.
#[derive(Debug, Default, Clone)]
pub struct CallStack {
    slots: [u16; STACK_DEPTH],
    pointer: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, addr: u16) -> Result<()> {
        let slot = self
            .slots
            .get_mut(self.pointer)
            .ok_or(VmError::StackOverflow { depth: STACK_DEPTH })?;
        *slot = addr;
        self.pointer += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16> {
        if self.pointer == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.pointer -= 1;
        Ok(self.slots[self.pointer])
    }

    pub fn depth(&self) -> usize {
        self.pointer
    }

    /// most recent return address, if any
    pub fn peek(&self) -> Option<u16> {
        self.pointer.checked_sub(1).map(|p| self.slots[p])
    }
}
