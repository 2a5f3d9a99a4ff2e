use crate::error::{Result, VmError};

pub const REGISTER_COUNT: usize = 16;

/// VF doubles as the carry/borrow/collision flag
pub const VF: u8 = 0xF;

/// V0-VF plus the 16-bit index register I
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    v: [u8; REGISTER_COUNT],
    pub i: u16,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u8) -> Result<u8> {
        self.v
            .get(index as usize)
            .copied()
            .ok_or(VmError::InvalidRegister { index })
    }

    pub fn set(&mut self, index: u8, value: u8) -> Result<()> {
        let slot = self
            .v
            .get_mut(index as usize)
            .ok_or(VmError::InvalidRegister { index })?;
        *slot = value;
        Ok(())
    }

    /// V0..=Vlast
    pub fn range(&self, last: u8) -> Result<&[u8]> {
        self.v
            .get(..=last as usize)
            .ok_or(VmError::InvalidRegister { index: last })
    }

    pub fn range_mut(&mut self, last: u8) -> Result<&mut [u8]> {
        self.v
            .get_mut(..=last as usize)
            .ok_or(VmError::InvalidRegister { index: last })
    }

    pub fn set_flag(&mut self, value: u8) {
        self.v[VF as usize] = value;
    }
}
