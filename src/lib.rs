//! # chip8vm
//!
//! ## Design
//!
//! * the engine is a plain struct; no globals, no threads
//! * one call to `Interpreter::cycle()` is one whole instruction plus a timer
//!   tick, so the host decides how fast things go
//! * the host only touches the engine through the ROM bytes, the keypad, and
//!   what it reads back (framebuffer, buzzer, timers, registers)
//! * display, input and audio sit behind traits, so the interpreter doesn't
//!   need to know how any of them work
//! * where interpreters disagree about flags, `config::Quirks` picks
//!
//! Model
//!
//! ```text
//! Environment
//!  |-- display, input, sound
//!  |-- interpreter(config)
//!  |    |-- memory (font at 0x000, program at 0x200)
//!  |    |-- registers, call stack, framebuffer, timers, keypad
//!  |    `-- instruction set: Opcode -> Instruction -> execute
//!  |                         (asm: text <-> word)
//!  `-- main loop
//!       |-- keypad <- input
//!       |-- interpreter.cycle() x cycles_per_frame
//!       |-- display <- framebuffer; sound <- buzzer
//!       `-- sleep out the rest of the frame
//! ```
pub mod asm;
pub mod config;
pub mod display;
pub mod environment;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod keypad;
pub mod logger;
pub mod memory;
pub mod registers;
pub mod sound;
pub mod stack;
pub mod timers;

pub use config::{Quirks, VmConfig};
pub use error::VmError;
pub use instruction::{Instruction, Opcode};
pub use interpreter::{Interpreter, RunOutcome, State};
