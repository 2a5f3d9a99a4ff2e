//! # instruction set
//!
//! A 16-bit word splits into four nibbles, e.g. 0x73EE:
//!
//!  var  bits  where                     meaning
//!  op   4     high byte, high nibble    opcode group
//!  x    4     high byte, low nibble     register Vx
//!  y    4     low byte, high nibble     register Vy
//!  n    4     low byte, low nibble      small constant / opcode subgroup
//!  nn   8     low byte                  immediate
//!  nnn  12    everything but `op`       address
//!
//! Decoding picks a mask from the `op` nibble and matches the masked word
//! against the table below; operands come from the unmasked fields.
use crate::error::{Result, VmError};

/// the fields of a raw instruction word; every u16 decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub word: u16,
    pub op: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nn: u8,
    pub nnn: u16,
}

impl Opcode {
    pub fn new(word: u16) -> Self {
        Opcode {
            word,
            op: ((word & 0xF000) >> 12) as u8,
            x: ((word & 0x0F00) >> 8) as u8,
            y: ((word & 0x00F0) >> 4) as u8,
            n: (word & 0x000F) as u8,
            nn: (word & 0x00FF) as u8,
            nnn: word & 0x0FFF,
        }
    }

    /// which bits of the word select the operation
    fn dispatch_mask(&self) -> u16 {
        match self.op {
            0x0 => 0x00FF,
            0x8 => 0xF00F,
            0xE | 0xF => 0xF0FF,
            _ => 0xF000,
        }
    }

    pub fn dispatch_key(&self) -> u16 {
        self.word & self.dispatch_mask()
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}", self.word)
    }
}

/// The 35 operations. Register operands are nibbles so always in 0..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    ClearScreen,
    /// 00EE
    Return,
    /// 1NNN
    Jump(u16),
    /// 2NNN
    Call(u16),
    /// 3XNN
    SkipIfEqualsConstant(u8, u8),
    /// 4XNN
    SkipIfNotEqualsConstant(u8, u8),
    /// 5XY0
    SkipIfEquals(u8, u8),
    /// 6XNN
    SetConstant(u8, u8),
    /// 7XNN
    AddConstant(u8, u8),
    /// 8XY0
    Set(u8, u8),
    /// 8XY1
    Or(u8, u8),
    /// 8XY2
    And(u8, u8),
    /// 8XY3
    Xor(u8, u8),
    /// 8XY4
    Add(u8, u8),
    /// 8XY5
    Sub(u8, u8),
    /// 8XY6; Y is carried but unused
    ShiftRight(u8, u8),
    /// 8XY7
    SubReverse(u8, u8),
    /// 8XYE; Y is carried but unused
    ShiftLeft(u8, u8),
    /// 9XY0
    SkipIfNotEquals(u8, u8),
    /// ANNN
    SetIndex(u16),
    /// BNNN
    JumpWithOffset(u16),
    /// CXNN
    Random(u8, u8),
    /// DXYN
    Draw(u8, u8, u8),
    /// EX9E
    SkipIfKeyDown(u8),
    /// EXA1
    SkipIfKeyUp(u8),
    /// FX07
    GetDelayTimer(u8),
    /// FX0A
    WaitForKey(u8),
    /// FX15
    SetDelayTimer(u8),
    /// FX18
    SetSoundTimer(u8),
    /// FX1E
    AddToIndex(u8),
    /// FX29
    SetIndexToGlyph(u8),
    /// FX33
    StoreBcd(u8),
    /// FX55
    Store(u8),
    /// FX65
    Load(u8),
}

impl Instruction {
    pub fn decode(word: u16) -> Result<Instruction> {
        Opcode::new(word).try_into()
    }
}

impl TryFrom<Opcode> for Instruction {
    type Error = VmError;

    fn try_from(opcode: Opcode) -> Result<Self> {
        use Instruction::*;
        let Opcode { x, y, n, nn, nnn, .. } = opcode;

        let instruction = match opcode.dispatch_key() {
            0x00E0 => ClearScreen,
            0x00EE => Return,
            0x1000 => Jump(nnn),
            0x2000 => Call(nnn),
            0x3000 => SkipIfEqualsConstant(x, nn),
            0x4000 => SkipIfNotEqualsConstant(x, nn),
            0x5000 => SkipIfEquals(x, y),
            0x6000 => SetConstant(x, nn),
            0x7000 => AddConstant(x, nn),
            0x8000 => Set(x, y),
            0x8001 => Or(x, y),
            0x8002 => And(x, y),
            0x8003 => Xor(x, y),
            0x8004 => Add(x, y),
            0x8005 => Sub(x, y),
            0x8006 => ShiftRight(x, y),
            0x8007 => SubReverse(x, y),
            0x800E => ShiftLeft(x, y),
            0x9000 => SkipIfNotEquals(x, y),
            0xA000 => SetIndex(nnn),
            0xB000 => JumpWithOffset(nnn),
            0xC000 => Random(x, nn),
            0xD000 => Draw(x, y, n),
            0xE09E => SkipIfKeyDown(x),
            0xE0A1 => SkipIfKeyUp(x),
            0xF007 => GetDelayTimer(x),
            0xF00A => WaitForKey(x),
            0xF015 => SetDelayTimer(x),
            0xF018 => SetSoundTimer(x),
            0xF01E => AddToIndex(x),
            0xF029 => SetIndexToGlyph(x),
            0xF033 => StoreBcd(x),
            0xF055 => Store(x),
            0xF065 => Load(x),
            _ => return Err(VmError::UnknownOpcode { opcode: opcode.word }),
        };
        Ok(instruction)
    }
}
