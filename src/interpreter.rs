//! # interpreter
//!
//! One `cycle()` is:
//!  1. fetch the big-endian word at PC, PC += 2
//!  2. 0x0000 halts the machine; nothing else happens that cycle
//!  3. decode to an `Instruction` and execute it
//!  4. tick the delay and sound timers; the buzzer is on while sound > 0
//!
//! FX0A doesn't block. With no key down it winds PC back by 2 so the next
//! cycle runs it again; the host changes the keypad between cycles.
use crate::config::{Quirks, VmConfig};
use crate::error::{Result, VmError};
use crate::framebuffer::Framebuffer;
use crate::instruction::{Instruction, Opcode};
use crate::keypad::Keypad;
use crate::memory::{self, Chip8Memory, MemoryMap, MAX_ADDR, PROGRAM_ADDR};
use crate::registers::Registers;
use crate::stack::CallStack;
use crate::timers::Timers;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;

/// end of program
pub const HALT_WORD: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// hit the 0x0000 sentinel after `cycles` executed instructions
    Halted { cycles: u64 },
    BudgetExhausted,
}

pub struct Interpreter {
    memory: Chip8Memory,
    registers: Registers,
    stack: CallStack,
    framebuffer: Framebuffer,
    timers: Timers,
    pub keypad: Keypad,
    program_counter: u16,
    state: State,
    waiting: bool,
    quirks: Quirks,
    rng: StdRng,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Interpreter {
            memory: Chip8Memory::new(),
            registers: Registers::new(),
            stack: CallStack::new(),
            framebuffer: Framebuffer::new(),
            timers: Timers::new(),
            keypad: Keypad::new(),
            program_counter: PROGRAM_ADDR,
            state: State::Running,
            waiting: false,
            quirks: config.quirks,
            rng,
        }
    }

    /// copy a ROM image in at 0x200
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        self.memory.load_rom(rom)?;
        debug!("loaded {} byte ROM at {:#05x}", rom.len(), PROGRAM_ADDR);
        Ok(())
    }

    /// load a chip8 program from any reader
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<()> {
        self.memory.load_program(reader)?;
        debug!("loaded program at {:#05x}", PROGRAM_ADDR);
        Ok(())
    }

    /// run one fetch/decode/execute/tick cycle
    pub fn cycle(&mut self) -> Result<State> {
        if self.state == State::Halted {
            return Ok(State::Halted);
        }

        let addr = self.program_counter;
        let word = self.memory.get_word(addr)?;
        self.program_counter = addr + 2;

        if word == HALT_WORD {
            debug!("halted at {:#05x}", addr);
            self.state = State::Halted;
            return Ok(State::Halted);
        }

        let result = Instruction::decode(word).and_then(|instruction| {
            trace!("{:#05x} {} {}", addr, Opcode::new(word), instruction);
            self.execute(instruction)
        });
        if let Err(e) = &result {
            warn!("cycle at {:#05x} ({:04X}) failed: {}", addr, word, e);
        }
        result?;

        if !self.waiting || self.quirks.tick_timers_while_waiting {
            let was_on = self.timers.buzzer_enabled();
            let on = self.timers.tick();
            if on != was_on {
                debug!("buzzer {}", if on { "on" } else { "off" });
            }
        }
        Ok(self.state)
    }

    /// cycle until the halt word; returns how many instructions ran
    pub fn run(&mut self) -> Result<u64> {
        let mut cycles = 0;
        while self.cycle()? == State::Running {
            cycles += 1;
        }
        Ok(cycles)
    }

    /// cycle at most `budget` times
    pub fn run_for(&mut self, budget: u64) -> Result<RunOutcome> {
        for cycles in 0..budget {
            if self.cycle()? == State::Halted {
                return Ok(RunOutcome::Halted { cycles });
            }
        }
        Ok(RunOutcome::BudgetExhausted)
    }

    /// decode and execute one word in place: no fetch, no timer tick
    pub fn execute_opcode(&mut self, word: u16) -> Result<()> {
        self.execute(Instruction::decode(word)?)
    }

    pub fn execute(&mut self, instruction: Instruction) -> Result<()> {
        use Instruction::*;

        self.waiting = false;
        match instruction {
            ClearScreen => self.framebuffer.clear(),

            Return => self.program_counter = self.stack.pop()?,

            Jump(addr) => self.program_counter = addr,

            Call(addr) => {
                self.stack.push(self.program_counter)?;
                self.program_counter = addr;
            }

            SkipIfEqualsConstant(x, nn) => {
                let vx = self.registers.get(x)?;
                self.skip_if(vx == nn);
            }

            SkipIfNotEqualsConstant(x, nn) => {
                let vx = self.registers.get(x)?;
                self.skip_if(vx != nn);
            }

            SkipIfEquals(x, y) => {
                let (vx, vy) = self.pair(x, y)?;
                self.skip_if(vx == vy);
            }

            SkipIfNotEquals(x, y) => {
                let (vx, vy) = self.pair(x, y)?;
                self.skip_if(vx != vy);
            }

            SetConstant(x, nn) => self.registers.set(x, nn)?,

            AddConstant(x, nn) => {
                let vx = self.registers.get(x)?;
                self.registers.set(x, vx.wrapping_add(nn))?;
            }

            Set(x, y) => {
                let vy = self.registers.get(y)?;
                self.registers.set(x, vy)?;
            }

            Or(x, y) => self.combine(x, y, |a, b| a | b)?,
            And(x, y) => self.combine(x, y, |a, b| a & b)?,
            Xor(x, y) => self.combine(x, y, |a, b| a ^ b)?,

            Add(x, y) => {
                let (vx, vy) = self.pair(x, y)?;
                let (sum, carry) = vx.overflowing_add(vy);
                self.registers.set(x, sum)?;
                if self.quirks.add_sets_carry {
                    self.registers.set_flag(carry as u8);
                }
            }

            // the flag ops write VF first and then compute from the
            // registers as they stand, so with X = F the flag feeds in
            Sub(x, y) => {
                let (vx, vy) = self.pair(x, y)?;
                self.registers.set_flag((vx > vy) as u8);
                let (vx, vy) = self.pair(x, y)?;
                self.registers.set(x, vx.wrapping_sub(vy))?;
            }

            SubReverse(x, y) => {
                let (vx, vy) = self.pair(x, y)?;
                self.registers.set_flag((vy > vx) as u8);
                let (vx, vy) = self.pair(x, y)?;
                self.registers.set(x, vy.wrapping_sub(vx))?;
            }

            ShiftRight(x, _) => {
                let vx = self.registers.get(x)?;
                self.registers.set_flag(vx & 0x01);
                let vx = self.registers.get(x)?;
                self.registers.set(x, vx >> 1)?;
            }

            ShiftLeft(x, _) => {
                let vx = self.registers.get(x)?;
                let high = vx & 0x80;
                let flag = if self.quirks.normalize_shift_flag {
                    high >> 7
                } else {
                    high
                };
                self.registers.set_flag(flag);
                let vx = self.registers.get(x)?;
                self.registers.set(x, vx << 1)?;
            }

            SetIndex(addr) => self.registers.i = addr,

            JumpWithOffset(addr) => {
                self.program_counter = addr + self.registers.get(0)? as u16;
            }

            Random(x, nn) => {
                let byte: u8 = self.rng.gen();
                self.registers.set(x, byte & nn)?;
            }

            Draw(x, y, n) => {
                let (vx, vy) = self.pair(x, y)?;
                let rows = self.memory.get_ro_slice(self.registers.i, n as usize)?;
                let collision = self.framebuffer.draw_sprite(vx as usize, vy as usize, rows)?;
                self.registers.set_flag(collision as u8);
            }

            SkipIfKeyDown(x) => {
                let down = self.keypad.is_down(self.registers.get(x)?)?;
                self.skip_if(down);
            }

            SkipIfKeyUp(x) => {
                let down = self.keypad.is_down(self.registers.get(x)?)?;
                self.skip_if(!down);
            }

            GetDelayTimer(x) => self.registers.set(x, self.timers.delay)?,

            WaitForKey(x) => match self.keypad.first_down() {
                Some(key) => self.registers.set(x, key)?,
                None => {
                    self.program_counter = self.program_counter.wrapping_sub(2);
                    self.waiting = true;
                }
            },

            SetDelayTimer(x) => self.timers.delay = self.registers.get(x)?,

            SetSoundTimer(x) => self.timers.sound = self.registers.get(x)?,

            AddToIndex(x) => {
                let index = self.registers.i;
                let offset = self.registers.get(x)? as u16;
                self.registers.i = checked_index(index, offset)?;
            }

            SetIndexToGlyph(x) => {
                self.registers.i = memory::glyph_addr(self.registers.get(x)?);
            }

            StoreBcd(x) => {
                let vx = self.registers.get(x)?;
                let digits = [vx / 100, vx / 10 % 10, vx % 10];
                self.memory.write(&digits, self.registers.i)?;
            }

            Store(x) => {
                let index = self.registers.i;
                checked_index(index, x as u16)?;
                self.memory.write(self.registers.range(x)?, index)?;
            }

            Load(x) => {
                let bytes = self.memory.get_ro_slice(self.registers.i, x as usize + 1)?;
                self.registers.range_mut(x)?.copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.program_counter = self.program_counter.wrapping_add(2);
        }
    }

    fn pair(&self, x: u8, y: u8) -> Result<(u8, u8)> {
        Ok((self.registers.get(x)?, self.registers.get(y)?))
    }

    fn combine(&mut self, x: u8, y: u8, op: impl Fn(u8, u8) -> u8) -> Result<()> {
        let (vx, vy) = self.pair(x, y)?;
        self.registers.set(x, op(vx, vy))
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.waiting
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn register(&self, index: u8) -> Result<u8> {
        self.registers.get(index)
    }

    pub fn set_register(&mut self, index: u8, value: u8) -> Result<()> {
        self.registers.set(index, value)
    }

    pub fn index(&self) -> u16 {
        self.registers.i
    }

    pub fn set_index(&mut self, addr: u16) {
        self.registers.i = addr;
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn memory(&self) -> &Chip8Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Chip8Memory {
        &mut self.memory
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.timers.delay = value;
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.timers.sound = value;
    }

    pub fn buzzer_enabled(&self) -> bool {
        self.timers.buzzer_enabled()
    }
}

/// `index + offset`, as long as it stays inside memory
fn checked_index(index: u16, offset: u16) -> Result<u16> {
    index
        .checked_add(offset)
        .filter(|&sum| sum <= MAX_ADDR)
        .ok_or(VmError::IndexOverflow { index, offset })
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{HEIGHT, WIDTH};
    use proptest::prelude::*;

    fn vm() -> Interpreter {
        Interpreter::with_config(VmConfig::default().with_seed(0x5eed))
    }

    #[test]
    fn test_program_load_ok() -> Result<()> {
        let mut i = vm();
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        i.load_program(&mut prog)?;
        assert_eq!(i.memory().get_word(0x200)?, 0x00e0);

        let mut too_big: &[u8] = &[0xAB; 0xE01];
        assert!(matches!(i.load_program(&mut too_big), Err(VmError::MemoryOutOfBounds { .. })));
        assert_eq!(i.memory().get_word(0x200)?, 0x00e0);
        Ok(())
    }

    #[test]
    fn test_initial_state() {
        let i = vm();
        assert_eq!(i.program_counter(), 0x200);
        assert_eq!(i.state(), State::Running);
        assert_eq!(i.stack_depth(), 0);
        assert_eq!(i.memory().get_ro_slice(0, 80).unwrap(), &memory::FONT);
    }

    #[test]
    fn test_clear_screen() -> Result<()> {
        let mut i = vm();
        for y in (0..HEIGHT).step_by(16) {
            for x in (0..WIDTH).step_by(8) {
                i.framebuffer.draw_sprite(x, y, &[0xFF; 16])?;
            }
        }
        assert_eq!(i.framebuffer().lit_count(), WIDTH * HEIGHT);
        i.execute_opcode(0x00E0)?;
        assert_eq!(i.framebuffer().lit_count(), 0);
        Ok(())
    }

    #[test]
    fn test_jump() -> Result<()> {
        let mut i = vm();
        i.execute_opcode(0x1FFF)?;
        assert_eq!(i.program_counter(), 0x0FFF);
        Ok(())
    }

    #[test]
    fn test_jump_with_offset() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x01)?;
        i.execute_opcode(0xBFFF)?;
        assert_eq!(i.program_counter(), 0x1000);
        Ok(())
    }

    #[test]
    fn test_call_and_return() -> Result<()> {
        let mut i = vm();
        i.execute_opcode(0x2FFF)?;
        assert_eq!(i.program_counter(), 0xFFF);
        assert_eq!(i.stack.peek(), Some(0x200));
        i.execute_opcode(0x00EE)?;
        assert_eq!(i.program_counter(), 0x200);
        assert_eq!(i.stack_depth(), 0);
        Ok(())
    }

    #[test]
    fn test_return_on_empty_stack() {
        let mut i = vm();
        assert!(matches!(i.execute_opcode(0x00EE), Err(VmError::StackUnderflow)));
    }

    #[test]
    fn test_call_too_deep() -> Result<()> {
        let mut i = vm();
        for _ in 0..16 {
            i.execute_opcode(0x2300)?;
        }
        assert!(matches!(i.execute_opcode(0x2300), Err(VmError::StackOverflow { .. })));
        Ok(())
    }

    #[test]
    fn test_skips() -> Result<()> {
        let cases: [(u16, bool); 8] = [
            (0x3001, true),  // V0 == 1
            (0x3002, false), // V0 != 2
            (0x4002, true),
            (0x4001, false),
            (0x5010, true), // V0 == V1
            (0x5020, false),
            (0x9020, true), // V0 != V2
            (0x9010, false),
        ];
        for (word, skips) in cases {
            let mut i = vm();
            i.set_register(0, 1)?;
            i.set_register(1, 1)?;
            i.set_register(2, 2)?;
            i.execute_opcode(word)?;
            let expected = if skips { 0x202 } else { 0x200 };
            assert_eq!(i.program_counter(), expected, "{:04X}", word);
        }
        Ok(())
    }

    #[test]
    fn test_key_skips() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x02)?;
        i.keypad.press(2)?;
        i.execute_opcode(0xE09E)?;
        assert_eq!(i.program_counter(), 0x202);
        i.execute_opcode(0xE0A1)?;
        assert_eq!(i.program_counter(), 0x202);

        i.keypad.release(2)?;
        i.execute_opcode(0xE09E)?;
        assert_eq!(i.program_counter(), 0x202);
        i.execute_opcode(0xE0A1)?;
        assert_eq!(i.program_counter(), 0x204);
        Ok(())
    }

    #[test]
    fn test_key_skip_bad_key() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x10)?;
        assert!(matches!(i.execute_opcode(0xE09E), Err(VmError::InvalidKey { index: 0x10 })));
        Ok(())
    }

    #[test]
    fn test_key_skip_cycle_from_fetch() -> Result<()> {
        for (down, pc) in [(true, 0x204), (false, 0x202)] {
            let mut i = vm();
            i.load_rom(&[0xE0, 0x9E])?;
            i.set_register(0, 0x02)?;
            i.keypad.set(2, down)?;
            i.cycle()?;
            assert_eq!(i.program_counter(), pc);
        }
        Ok(())
    }

    #[test]
    fn test_loads() -> Result<()> {
        let mut i = vm();
        i.execute_opcode(0x6A42)?;
        assert_eq!(i.register(0xA)?, 0x42);
        i.execute_opcode(0x80A0)?;
        assert_eq!(i.register(0)?, 0x42);
        i.execute_opcode(0xAFFF)?;
        assert_eq!(i.index(), 0xFFF);
        Ok(())
    }

    #[test]
    fn test_add_constant_wraps() -> Result<()> {
        let mut i = vm();
        i.set_register(3, 0xFF)?;
        i.execute_opcode(0x7302)?;
        assert_eq!(i.register(3)?, 0x01);
        assert_eq!(i.register(0xF)?, 0);
        Ok(())
    }

    #[test]
    fn test_bitwise() -> Result<()> {
        for (word, expected) in [(0x8011, 0xFF), (0x8012, 0x00), (0x8013, 0xFF)] {
            let mut i = vm();
            i.set_register(0, 0x0F)?;
            i.set_register(1, 0xF0)?;
            i.execute_opcode(word)?;
            assert_eq!(i.register(0)?, expected, "{:04X}", word);
        }
        Ok(())
    }

    #[test]
    fn test_add_leaves_flag_alone() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0xFF)?;
        i.set_register(1, 0x02)?;
        i.set_register(0xF, 0x07)?;
        i.execute_opcode(0x8014)?;
        assert_eq!(i.register(0)?, 0x01);
        assert_eq!(i.register(0xF)?, 0x07);
        Ok(())
    }

    #[test]
    fn test_add_sets_carry_when_asked() -> Result<()> {
        let quirks = Quirks {
            add_sets_carry: true,
            ..Quirks::default()
        };
        let mut i = Interpreter::with_config(VmConfig::default().with_quirks(quirks));
        i.set_register(0, 0xFF)?;
        i.set_register(1, 0x02)?;
        i.execute_opcode(0x8014)?;
        assert_eq!(i.register(0)?, 0x01);
        assert_eq!(i.register(0xF)?, 1);
        i.execute_opcode(0x8014)?;
        assert_eq!(i.register(0)?, 0x03);
        assert_eq!(i.register(0xF)?, 0);
        Ok(())
    }

    #[test]
    fn test_sub() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x02)?;
        i.set_register(1, 0x01)?;
        i.execute_opcode(0x8015)?;
        assert_eq!(i.register(0)?, 0x01);
        assert_eq!(i.register(0xF)?, 1);

        // equal operands: no flag
        i.execute_opcode(0x8015)?;
        assert_eq!(i.register(0)?, 0x00);
        assert_eq!(i.register(0xF)?, 0);

        // borrow wraps
        i.execute_opcode(0x8015)?;
        assert_eq!(i.register(0)?, 0xFF);
        assert_eq!(i.register(0xF)?, 0);
        Ok(())
    }

    #[test]
    fn test_sub_reverse() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x01)?;
        i.set_register(1, 0x02)?;
        i.execute_opcode(0x8017)?;
        assert_eq!(i.register(0)?, 0x01);
        assert_eq!(i.register(0xF)?, 1);

        i.set_register(0, 0x03)?;
        i.execute_opcode(0x8017)?;
        assert_eq!(i.register(0)?, 0xFF);
        assert_eq!(i.register(0xF)?, 0);
        Ok(())
    }

    #[test]
    fn test_shift_right() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x02)?;
        i.execute_opcode(0x8006)?;
        assert_eq!(i.register(0)?, 0x01);
        assert_eq!(i.register(0xF)?, 0);
        i.execute_opcode(0x8006)?;
        assert_eq!(i.register(0)?, 0x00);
        assert_eq!(i.register(0xF)?, 1);
        Ok(())
    }

    #[test]
    fn test_shift_left_raw_flag() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x42)?;
        i.execute_opcode(0x801E)?;
        assert_eq!(i.register(0)?, 0x84);
        assert_eq!(i.register(0xF)?, 0);
        i.execute_opcode(0x801E)?;
        assert_eq!(i.register(0)?, 0x08);
        assert_eq!(i.register(0xF)?, 0x80);
        Ok(())
    }

    #[test]
    fn test_shift_left_normalized_flag() -> Result<()> {
        let mut i = Interpreter::with_config(VmConfig::default().with_quirks(Quirks::conventional()));
        i.set_register(0, 0x84)?;
        i.execute_opcode(0x801E)?;
        assert_eq!(i.register(0)?, 0x08);
        assert_eq!(i.register(0xF)?, 1);
        Ok(())
    }

    #[test]
    fn test_random_masked() -> Result<()> {
        let mut i = vm();
        for _ in 0..64 {
            i.execute_opcode(0xC00F)?;
            assert_eq!(i.register(0)? & 0xF0, 0);
        }
        i.execute_opcode(0xC100)?;
        assert_eq!(i.register(1)?, 0);
        Ok(())
    }

    #[test]
    fn test_random_seeded() -> Result<()> {
        let mut a = vm();
        let mut b = vm();
        for _ in 0..8 {
            a.execute_opcode(0xC0FF)?;
            b.execute_opcode(0xC0FF)?;
            assert_eq!(a.register(0)?, b.register(0)?);
        }
        Ok(())
    }

    #[test]
    fn test_draw_two_rows() -> Result<()> {
        let mut i = vm();
        i.set_index(0x300);
        i.memory_mut().write(&[0b0101_0101, 0b0101_0101], 0x300)?;
        i.execute_opcode(0xD012)?;
        for y in 0..2 {
            for x in (1..8).step_by(2) {
                assert!(i.framebuffer().pixel(x, y)?);
                assert!(!i.framebuffer().pixel(x - 1, y)?);
            }
        }
        assert_eq!(i.register(0xF)?, 0);
        Ok(())
    }

    #[test]
    fn test_draw_collision() -> Result<()> {
        let mut i = vm();
        i.set_index(0x300);
        i.memory_mut().write(&[0b0101_0101], 0x300)?;
        i.execute_opcode(0xD011)?;
        i.execute_opcode(0xD011)?;
        assert_eq!(i.framebuffer().lit_count(), 0);
        assert_eq!(i.register(0xF)?, 1);
        Ok(())
    }

    #[test]
    fn test_draw_glyph() -> Result<()> {
        let mut i = vm();
        i.set_register(2, 0xF)?;
        i.set_register(0, 10)?;
        i.set_register(1, 3)?;
        i.execute_opcode(0xF229)?;
        assert_eq!(i.index(), 75);
        i.execute_opcode(0xD015)?;
        // F glyph: top row is four pixels
        assert!((10..14).all(|x| i.framebuffer().pixel(x, 3).unwrap()));
        assert!(!i.framebuffer().pixel(14, 3)?);
        assert_eq!(i.framebuffer().lit_count(), 4 + 1 + 4 + 1 + 1);
        Ok(())
    }

    #[test]
    fn test_draw_off_screen() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 64)?;
        i.set_index(0x300);
        i.memory_mut().write_byte(0x300, 0x80)?;
        assert!(matches!(i.execute_opcode(0xD011), Err(VmError::InvalidCoordinate { x: 64, y: 0 })));
        Ok(())
    }

    #[test]
    fn test_timers_load_and_read() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x01)?;
        i.execute_opcode(0xF015)?;
        assert_eq!(i.delay_timer(), 0x01);
        i.execute_opcode(0xF018)?;
        assert_eq!(i.sound_timer(), 0x01);
        i.set_delay_timer(0x33);
        i.execute_opcode(0xF507)?;
        assert_eq!(i.register(5)?, 0x33);
        Ok(())
    }

    #[test]
    fn test_wait_for_key() -> Result<()> {
        let mut i = vm();
        i.load_rom(&[0xF3, 0x0A])?;
        i.set_delay_timer(5);
        i.cycle()?;
        assert_eq!(i.program_counter(), 0x200);
        assert!(i.is_waiting_for_key());
        // baseline: timers keep running during the wait
        assert_eq!(i.delay_timer(), 4);

        i.keypad.press(0xB)?;
        i.keypad.press(0xE)?;
        i.cycle()?;
        assert_eq!(i.program_counter(), 0x202);
        assert!(!i.is_waiting_for_key());
        assert_eq!(i.register(3)?, 0xB);
        Ok(())
    }

    #[test]
    fn test_wait_for_key_holds_timers() -> Result<()> {
        let quirks = Quirks {
            tick_timers_while_waiting: false,
            ..Quirks::default()
        };
        let mut i = Interpreter::with_config(VmConfig::default().with_quirks(quirks));
        i.load_rom(&[0xF3, 0x0A])?;
        i.set_delay_timer(5);
        assert_eq!(i.run_for(10)?, RunOutcome::BudgetExhausted);
        assert_eq!(i.delay_timer(), 5);
        Ok(())
    }

    #[test]
    fn test_add_to_index() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x01)?;
        i.execute_opcode(0xF01E)?;
        assert_eq!(i.index(), 0x01);

        i.set_index(0xFFF);
        assert!(matches!(
            i.execute_opcode(0xF01E),
            Err(VmError::IndexOverflow { index: 0xFFF, offset: 1 })
        ));
        assert_eq!(i.index(), 0xFFF);
        Ok(())
    }

    #[test]
    fn test_add_to_index_high_i() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 1)?;
        i.set_index(0xFFFF);
        assert!(matches!(
            i.execute_opcode(0xF01E),
            Err(VmError::IndexOverflow { index: 0xFFFF, offset: 1 })
        ));
        assert_eq!(i.index(), 0xFFFF);

        i.set_index(0x1000);
        i.set_register(0, 0)?;
        assert!(matches!(i.execute_opcode(0xF01E), Err(VmError::IndexOverflow { .. })));
        Ok(())
    }

    #[test]
    fn test_bcd() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 123)?;
        i.set_index(0x300);
        i.execute_opcode(0xF033)?;
        assert_eq!(i.memory().get_ro_slice(0x300, 3)?, &[1, 2, 3]);
        i.set_register(0, 7)?;
        i.execute_opcode(0xF033)?;
        assert_eq!(i.memory().get_ro_slice(0x300, 3)?, &[0, 0, 7]);
        Ok(())
    }

    #[test]
    fn test_store_and_load() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0x01)?;
        i.set_register(1, 0x02)?;
        i.set_register(2, 0x03)?;
        i.set_register(3, 0x04)?;
        i.set_index(0x300);
        i.execute_opcode(0xF255)?;
        assert_eq!(i.memory().get_ro_slice(0x300, 4)?, &[0x01, 0x02, 0x03, 0x00]);
        assert_eq!(i.index(), 0x300);

        let mut j = vm();
        j.memory_mut().write(&[0x0A, 0x0B, 0x0C], 0x400)?;
        j.set_index(0x400);
        j.execute_opcode(0xF165)?;
        assert_eq!(j.register(0)?, 0x0A);
        assert_eq!(j.register(1)?, 0x0B);
        assert_eq!(j.register(2)?, 0x00);
        Ok(())
    }

    #[test]
    fn test_store_past_end() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0xAA)?;
        i.set_index(0xFFE);
        assert!(matches!(i.execute_opcode(0xF255), Err(VmError::IndexOverflow { .. })));
        assert_eq!(i.memory().read_byte(0xFFE)?, 0);
        assert!(matches!(i.execute_opcode(0xF265), Err(VmError::MemoryOutOfBounds { .. })));
        assert_eq!(i.register(0)?, 0xAA);
        Ok(())
    }

    #[test]
    fn test_store_high_i() -> Result<()> {
        let mut i = vm();
        i.set_register(0, 0xAA)?;
        i.set_index(0xFFFF);
        assert!(matches!(
            i.execute_opcode(0xF255),
            Err(VmError::IndexOverflow { index: 0xFFFF, offset: 2 })
        ));
        assert_eq!(i.index(), 0xFFFF);
        assert_eq!(i.register(0)?, 0xAA);
        Ok(())
    }

    #[test]
    fn test_unknown_opcode() {
        let mut i = vm();
        assert!(matches!(i.execute_opcode(0x0123), Err(VmError::UnknownOpcode { opcode: 0x0123 })));
        i.load_rom(&[0xFF, 0xFF]).unwrap();
        assert!(matches!(i.cycle(), Err(VmError::UnknownOpcode { opcode: 0xFFFF })));
    }

    #[test]
    fn test_execute_program() -> Result<()> {
        let mut i = vm();
        i.load_rom(&[0x60, 0x02])?;
        i.set_delay_timer(0x01);
        i.set_sound_timer(0x01);
        assert_eq!(i.run()?, 1);
        assert_eq!(i.state(), State::Halted);
        assert_eq!(i.register(0)?, 0x02);
        assert_eq!(i.delay_timer(), 0);
        assert_eq!(i.sound_timer(), 0);
        assert!(!i.buzzer_enabled());
        Ok(())
    }

    #[test]
    fn test_halted_stays_halted() -> Result<()> {
        let mut i = vm();
        assert_eq!(i.cycle()?, State::Halted);
        assert_eq!(i.program_counter(), 0x202);
        assert_eq!(i.cycle()?, State::Halted);
        assert_eq!(i.program_counter(), 0x202);
        Ok(())
    }

    #[test]
    fn test_buzzer() -> Result<()> {
        let mut i = vm();
        // LD V0, 3; LD ST, V0; then two no-op-ish loads before halting
        i.load_rom(&[0x60, 0x03, 0xF0, 0x18, 0x61, 0x00, 0x61, 0x00, 0x61, 0x00])?;
        i.cycle()?;
        assert!(!i.buzzer_enabled());
        i.cycle()?; // sound = 3 -> 2
        assert!(i.buzzer_enabled());
        i.cycle()?; // 2 -> 1
        assert!(i.buzzer_enabled());
        i.cycle()?; // 1 -> 0
        assert!(!i.buzzer_enabled());
        Ok(())
    }

    #[test]
    fn test_subroutine_program() -> Result<()> {
        let mut i = vm();
        // 0x200: CALL 0x300; CALL 0x300; halt
        i.load_rom(&[0x23, 0x00, 0x23, 0x00, 0x00, 0x00])?;
        // 0x300: ADD V0, V1 twice; RET
        i.memory_mut().write(&[0x80, 0x14, 0x80, 0x14, 0x00, 0xEE], 0x300)?;
        i.set_register(0, 5)?;
        i.set_register(1, 10)?;
        assert_eq!(i.run_for(100)?, RunOutcome::Halted { cycles: 8 });
        assert_eq!(i.register(0)?, 45);
        assert_eq!(i.stack_depth(), 0);
        Ok(())
    }

    #[test]
    fn test_countdown_loop() -> Result<()> {
        let mut i = vm();
        i.load_rom(&[
            0x60, 0x05, // 200: V0 = 5
            0x61, 0x00, // 202: V1 = 0
            0x71, 0x02, // 204: V1 += 2
            0x70, 0xFF, // 206: V0 -= 1
            0x30, 0x00, // 208: skip if V0 == 0
            0x12, 0x04, // 20A: jump 204
            0x00, 0x00, // 20C: halt
        ])?;
        i.run()?;
        assert_eq!(i.register(1)?, 10);
        assert_eq!(i.program_counter(), 0x20E);
        Ok(())
    }

    #[test]
    fn test_fetch_off_the_end() -> Result<()> {
        let mut i = vm();
        i.execute_opcode(0x1FFF)?;
        assert!(matches!(i.cycle(), Err(VmError::MemoryOutOfBounds { addr: 0xFFF, len: 2 })));
        assert_eq!(i.program_counter(), 0xFFF);
        Ok(())
    }

    proptest! {
        #[test]
        fn register_round_trip(index in 0u8..16, value in any::<u8>()) {
            let mut i = vm();
            i.set_register(index, value).unwrap();
            prop_assert_eq!(i.register(index).unwrap(), value);
        }

        #[test]
        fn sub_flag_tracks_comparison(a in any::<u8>(), b in any::<u8>()) {
            let mut i = vm();
            i.set_register(2, a).unwrap();
            i.set_register(3, b).unwrap();
            i.execute_opcode(0x8235).unwrap();
            prop_assert_eq!(i.register(0xF).unwrap(), (a > b) as u8);
            prop_assert_eq!(i.register(2).unwrap(), a.wrapping_sub(b));
        }

        #[test]
        fn add_constant_wraps(a in any::<u8>(), nn in any::<u8>()) {
            let mut i = vm();
            i.set_register(4, a).unwrap();
            i.execute_opcode(0x7400 | nn as u16).unwrap();
            prop_assert_eq!(i.register(4).unwrap(), a.wrapping_add(nn));
        }
    }
}
