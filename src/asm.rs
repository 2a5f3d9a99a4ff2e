//! # assembly text
//!
//! One instruction per line: a mnemonic, then operands split by spaces (a
//! comma works too). Registers are `V0`..`VF`, numbers are hex with an
//! optional `0x`. Anything after `;` is a comment.
//!
//!  CLS           00E0       XOR Vx, Vy    8XY3       SKNP Vx       EXA1
//!  RET           00EE       ADD Vx, Vy    8XY4       LD Vx, DT     FX07
//!  JMP nnn       1NNN       SUB Vx, Vy    8XY5       LD Vx, K      FX0A
//!  CALL nnn      2NNN       SHR Vx, Vy    8XY6       LD DT, Vx     FX15
//!  SE Vx, nn     3XNN       SUBN Vx, Vy   8XY7       LD ST, Vx     FX18
//!  SNE Vx, nn    4XNN       SHL Vx, Vy    8XYE       ADD I, Vx     FX1E
//!  SE Vx, Vy     5XY0       SNE Vx, Vy    9XY0       LD F, Vx      FX29
//!  LD Vx, nn     6XNN       LD I, nnn     ANNN       LD B, Vx      FX33
//!  ADD Vx, nn    7XNN       JMP V0, nnn   BNNN       LD [I], Vx    FX55
//!  LD Vx, Vy     8XY0       RND Vx, nn    CXNN       LD Vx, [I]    FX65
//!  OR Vx, Vy     8XY1       DRW Vx, Vy, n DXYN       DW nnnn       raw word
//!  AND Vx, Vy    8XY2       SKP Vx        EX9E
//!
//! `DW` emits a word as-is, which is how a program spells the 0x0000 halt.
use crate::error::{self, VmError};
use crate::instruction::Instruction;
use std::fmt;
use std::str::FromStr;

use self::Arg::*;

#[derive(Debug, thiserror::Error)]
pub enum AsmError {
    #[error("empty line")]
    Empty,

    #[error("unknown mnemonic {0}")]
    UnknownMnemonic(String),

    #[error("{mnemonic} doesn't take `{operands}`")]
    BadOperands { mnemonic: String, operands: String },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<AsmError>,
    },

    #[error(transparent)]
    Decode(#[from] VmError),
}

pub type Result<T> = std::result::Result<T, AsmError>;

#[derive(Debug, Clone, Copy)]
enum Arg {
    Vx,
    Vy,
    N,
    Nn,
    Nnn,
    Word,
    Lit(&'static str),
}

struct Form {
    mnemonic: &'static str,
    base: u16,
    args: &'static [Arg],
}

/// tried in order; the first form whose operands all parse wins
const FORMS: &[Form] = &[
    Form { mnemonic: "CLS", base: 0x00E0, args: &[] },
    Form { mnemonic: "RET", base: 0x00EE, args: &[] },
    Form { mnemonic: "JMP", base: 0x1000, args: &[Nnn] },
    Form { mnemonic: "JMP", base: 0xB000, args: &[Lit("V0"), Nnn] },
    Form { mnemonic: "CALL", base: 0x2000, args: &[Nnn] },
    Form { mnemonic: "SE", base: 0x3000, args: &[Vx, Nn] },
    Form { mnemonic: "SE", base: 0x5000, args: &[Vx, Vy] },
    Form { mnemonic: "SNE", base: 0x4000, args: &[Vx, Nn] },
    Form { mnemonic: "SNE", base: 0x9000, args: &[Vx, Vy] },
    Form { mnemonic: "LD", base: 0x6000, args: &[Vx, Nn] },
    Form { mnemonic: "LD", base: 0x8000, args: &[Vx, Vy] },
    Form { mnemonic: "LD", base: 0xA000, args: &[Lit("I"), Nnn] },
    Form { mnemonic: "LD", base: 0xF007, args: &[Vx, Lit("DT")] },
    Form { mnemonic: "LD", base: 0xF00A, args: &[Vx, Lit("K")] },
    Form { mnemonic: "LD", base: 0xF015, args: &[Lit("DT"), Vx] },
    Form { mnemonic: "LD", base: 0xF018, args: &[Lit("ST"), Vx] },
    Form { mnemonic: "LD", base: 0xF029, args: &[Lit("F"), Vx] },
    Form { mnemonic: "LD", base: 0xF033, args: &[Lit("B"), Vx] },
    Form { mnemonic: "LD", base: 0xF055, args: &[Lit("[I]"), Vx] },
    Form { mnemonic: "LD", base: 0xF065, args: &[Vx, Lit("[I]")] },
    Form { mnemonic: "ADD", base: 0x7000, args: &[Vx, Nn] },
    Form { mnemonic: "ADD", base: 0x8004, args: &[Vx, Vy] },
    Form { mnemonic: "ADD", base: 0xF01E, args: &[Lit("I"), Vx] },
    Form { mnemonic: "OR", base: 0x8001, args: &[Vx, Vy] },
    Form { mnemonic: "AND", base: 0x8002, args: &[Vx, Vy] },
    Form { mnemonic: "XOR", base: 0x8003, args: &[Vx, Vy] },
    Form { mnemonic: "SUB", base: 0x8005, args: &[Vx, Vy] },
    Form { mnemonic: "SHR", base: 0x8006, args: &[Vx, Vy] },
    Form { mnemonic: "SHR", base: 0x8006, args: &[Vx] },
    Form { mnemonic: "SUBN", base: 0x8007, args: &[Vx, Vy] },
    Form { mnemonic: "SHL", base: 0x800E, args: &[Vx, Vy] },
    Form { mnemonic: "SHL", base: 0x800E, args: &[Vx] },
    Form { mnemonic: "RND", base: 0xC000, args: &[Vx, Nn] },
    Form { mnemonic: "DRW", base: 0xD000, args: &[Vx, Vy, N] },
    Form { mnemonic: "SKP", base: 0xE09E, args: &[Vx] },
    Form { mnemonic: "SKNP", base: 0xE0A1, args: &[Vx] },
    Form { mnemonic: "DW", base: 0x0000, args: &[Word] },
];

impl Form {
    fn fill(&self, operands: &[&str]) -> Option<u16> {
        if operands.len() != self.args.len() {
            return None;
        }
        self.args.iter().zip(operands).try_fold(self.base, |word, (arg, token)| {
            let bits = match *arg {
                Vx => register(token)? << 8,
                Vy => register(token)? << 4,
                N => number(token, 0xF)?,
                Nn => number(token, 0xFF)?,
                Nnn => number(token, 0xFFF)?,
                Word => number(token, 0xFFFF)?,
                Lit(text) if token.eq_ignore_ascii_case(text) => 0,
                Lit(_) => return None,
            };
            Some(word | bits)
        })
    }
}

fn register(token: &str) -> Option<u16> {
    let digit = token.strip_prefix('V').or_else(|| token.strip_prefix('v'))?;
    if digit.len() != 1 {
        return None;
    }
    u16::from_str_radix(digit, 16).ok()
}

fn number(token: &str, max: u16) -> Option<u16> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok().filter(|&n| n <= max)
}

/// assemble a single line to its opcode word
pub fn assemble_line(line: &str) -> Result<u16> {
    let code = line.split(';').next().unwrap_or_default();
    let mut tokens = code
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty());
    let mnemonic = tokens.next().ok_or(AsmError::Empty)?.to_ascii_uppercase();
    let operands: Vec<&str> = tokens.collect();

    let mut forms = FORMS.iter().filter(|f| f.mnemonic == mnemonic).peekable();
    if forms.peek().is_none() {
        return Err(AsmError::UnknownMnemonic(mnemonic));
    }
    forms
        .find_map(|f| f.fill(&operands))
        .ok_or_else(|| AsmError::BadOperands {
            mnemonic,
            operands: operands.join(" "),
        })
}

/// assemble a whole listing; blank and comment-only lines are skipped
pub fn assemble(program: &str) -> Result<Vec<u16>> {
    let mut words = Vec::new();
    for (n, line) in program.lines().enumerate() {
        match assemble_line(line) {
            Ok(word) => words.push(word),
            Err(AsmError::Empty) => {}
            Err(e) => {
                return Err(AsmError::Line {
                    line: n + 1,
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(words)
}

/// assemble straight to big-endian ROM bytes
pub fn assemble_rom(program: &str) -> Result<Vec<u8>> {
    Ok(assemble(program)?.iter().flat_map(|w| w.to_be_bytes()).collect())
}

/// the mnemonic line for one opcode word
pub fn disassemble(word: u16) -> error::Result<String> {
    Ok(Instruction::decode(word)?.to_string())
}

/// `addr  word  text` per word of a ROM loaded at `origin`; words that
/// don't decode come out as `DW`, so the text column assembles back to
/// the same bytes
pub fn listing(rom: &[u8], origin: u16) -> String {
    let mut out = String::new();
    for (n, chunk) in rom.chunks(2).enumerate() {
        let addr = origin as usize + n * 2;
        let word = match *chunk {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            [hi] => u16::from_be_bytes([hi, 0]),
            _ => continue,
        };
        let text = disassemble(word).unwrap_or_else(|_| format!("DW {:04X}", word));
        out.push_str(&format!("{:04X}  {:04X}  {}\n", addr, word, text));
    }
    out
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            ClearScreen => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Jump(addr) => write!(f, "JMP {:X}", addr),
            Call(addr) => write!(f, "CALL {:X}", addr),
            SkipIfEqualsConstant(x, nn) => write!(f, "SE V{:X} {:X}", x, nn),
            SkipIfNotEqualsConstant(x, nn) => write!(f, "SNE V{:X} {:X}", x, nn),
            SkipIfEquals(x, y) => write!(f, "SE V{:X} V{:X}", x, y),
            SetConstant(x, nn) => write!(f, "LD V{:X} {:X}", x, nn),
            AddConstant(x, nn) => write!(f, "ADD V{:X} {:X}", x, nn),
            Set(x, y) => write!(f, "LD V{:X} V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X} V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X} V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X} V{:X}", x, y),
            Add(x, y) => write!(f, "ADD V{:X} V{:X}", x, y),
            Sub(x, y) => write!(f, "SUB V{:X} V{:X}", x, y),
            ShiftRight(x, y) => write!(f, "SHR V{:X} V{:X}", x, y),
            SubReverse(x, y) => write!(f, "SUBN V{:X} V{:X}", x, y),
            ShiftLeft(x, y) => write!(f, "SHL V{:X} V{:X}", x, y),
            SkipIfNotEquals(x, y) => write!(f, "SNE V{:X} V{:X}", x, y),
            SetIndex(addr) => write!(f, "LD I {:X}", addr),
            JumpWithOffset(addr) => write!(f, "JMP V0 {:X}", addr),
            Random(x, nn) => write!(f, "RND V{:X} {:X}", x, nn),
            Draw(x, y, n) => write!(f, "DRW V{:X} V{:X} {:X}", x, y, n),
            SkipIfKeyDown(x) => write!(f, "SKP V{:X}", x),
            SkipIfKeyUp(x) => write!(f, "SKNP V{:X}", x),
            GetDelayTimer(x) => write!(f, "LD V{:X} DT", x),
            WaitForKey(x) => write!(f, "LD V{:X} K", x),
            SetDelayTimer(x) => write!(f, "LD DT V{:X}", x),
            SetSoundTimer(x) => write!(f, "LD ST V{:X}", x),
            AddToIndex(x) => write!(f, "ADD I V{:X}", x),
            SetIndexToGlyph(x) => write!(f, "LD F V{:X}", x),
            StoreBcd(x) => write!(f, "LD B V{:X}", x),
            Store(x) => write!(f, "LD [I] V{:X}", x),
            Load(x) => write!(f, "LD V{:X} [I]", x),
        }
    }
}

impl FromStr for Instruction {
    type Err = AsmError;

    fn from_str(line: &str) -> Result<Self> {
        Ok(Instruction::decode(assemble_line(line)?)?)
    }
}
