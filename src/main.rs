use std::error::Error;
use std::fs::{self, File};
use std::path::PathBuf;

use chip8vm::asm;
use chip8vm::display::MonoTermDisplay;
use chip8vm::environment::{Environment, EnvironmentConfig};
use chip8vm::input::TermInput;
use chip8vm::logger;
use chip8vm::memory::PROGRAM_ADDR;
use chip8vm::sound::{Mute, SimpleBeep, Sound};
use chip8vm::{Interpreter, Quirks, VmConfig};
use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Run a CHIP-8 ROM in the terminal")]
struct Args {
    /// ROM image, loaded at 0x200
    rom: PathBuf,

    /// the ROM file is assembly text; assemble it before running
    #[arg(long)]
    source: bool,

    /// print a listing of the ROM and exit
    #[arg(long)]
    disassemble: bool,

    /// instructions per frame
    #[arg(long, default_value_t = 10)]
    cycles_per_frame: u32,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// seed for the random-number opcode
    #[arg(long)]
    seed: Option<u64>,

    /// set VF on 8XY4 overflow and write 8XYE's flag as 0/1
    #[arg(long)]
    conventional_flags: bool,

    /// freeze the timers while FX0A waits for a key
    #[arg(long)]
    hold_timers_on_wait: bool,

    #[arg(long)]
    mute: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

impl Args {
    fn vm_config(&self) -> VmConfig {
        let mut quirks = if self.conventional_flags {
            Quirks::conventional()
        } else {
            Quirks::default()
        };
        quirks.tick_timers_while_waiting = !self.hold_timers_on_wait;
        VmConfig {
            quirks,
            seed: self.seed,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        logger::init(path, args.log_level)?;
    }

    // load a program
    let mut interpreter = Interpreter::with_config(args.vm_config());
    if args.source || args.disassemble {
        let rom = if args.source {
            asm::assemble_rom(&fs::read_to_string(&args.rom)?)?
        } else {
            fs::read(&args.rom)?
        };
        if args.disassemble {
            print!("{}", asm::listing(&rom, PROGRAM_ADDR));
            return Ok(());
        }
        interpreter.load_rom(&rom)?;
    } else {
        let mut f = File::open(&args.rom)?;
        interpreter.load_program(&mut f)?;
    }

    // initialise
    let mut display = MonoTermDisplay::new()?;
    let mut input = TermInput::new()?;
    let mut sound: Box<dyn Sound> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let config = EnvironmentConfig {
        cycles_per_frame: args.cycles_per_frame,
        frames_per_second: Some(args.fps),
        max_frames: args.max_frames,
    };

    let result = Environment::new(interpreter, &mut display, &mut input, sound.as_mut(), config).main_loop();
    drop(input);

    // shove some junk on stdout to stop the shell messing up the last frame
    for _ in 0..4 {
        println!();
    }
    let exit = result?;
    log::info!("exit: {:?}", exit);
    Ok(())
}
