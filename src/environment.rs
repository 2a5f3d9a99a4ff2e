use crate::display::Display;
use crate::input::Input;
use crate::interpreter::{Interpreter, State};
use crate::sound::Sound;
use log::{debug, info};
use std::error::Error;
use std::time::{Duration, Instant};

/// How the host drives the interpreter: a fixed number of cycles per frame,
/// one redraw per frame.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub cycles_per_frame: u32,
    /// `None` runs frames back to back
    pub frames_per_second: Option<u32>,
    /// stop after this many frames
    pub max_frames: Option<u64>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            cycles_per_frame: 10,
            frames_per_second: Some(60),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Halted,
    Quit,
    FrameBudget,
}

/// Wires the interpreter to a screen, a keyboard and a speaker.
pub struct Environment<'a> {
    pub interpreter: Interpreter,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    config: EnvironmentConfig,
}

impl<'a> Environment<'a> {
    pub fn new(
        interpreter: Interpreter,
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        config: EnvironmentConfig,
    ) -> Self {
        Environment {
            interpreter,
            display,
            input,
            sound,
            config,
        }
    }

    /// copy whatever was pressed since the last frame onto the keypad; a
    /// terminal gives no key-up events, so a press lasts one frame
    fn sync_keys(&mut self) -> Result<(), Box<dyn Error>> {
        self.interpreter.keypad.release_all();
        for &key in self.input.peek_keys()? {
            self.interpreter.keypad.press(key)?;
        }
        self.input.flush_keys()?;
        Ok(())
    }

    fn sync_sound(&mut self) -> Result<(), Box<dyn Error>> {
        let buzzer = self.interpreter.buzzer_enabled();
        if buzzer && !self.sound.is_beeping() {
            self.sound.beep()?;
        } else if !buzzer && self.sound.is_beeping() {
            self.sound.stop()?;
        }
        Ok(())
    }

    /// one frame: keys in, cycles, picture and sound out
    pub fn frame(&mut self) -> Result<Option<Exit>, Box<dyn Error>> {
        self.sync_keys()?;
        if self.input.quit_requested() {
            return Ok(Some(Exit::Quit));
        }

        let mut halted = false;
        for _ in 0..self.config.cycles_per_frame {
            if self.interpreter.cycle()? == State::Halted {
                halted = true;
                break;
            }
        }

        self.display.draw(self.interpreter.framebuffer())?;
        self.sync_sound()?;
        Ok(halted.then_some(Exit::Halted))
    }

    pub fn main_loop(&mut self) -> Result<Exit, Box<dyn Error>> {
        let frame_time = self
            .config
            .frames_per_second
            .map(|fps| Duration::from_secs(1) / fps.max(1));
        let mut frames = 0u64;

        let exit = loop {
            let started = Instant::now();
            if let Some(exit) = self.frame()? {
                break exit;
            }
            frames += 1;
            if self.config.max_frames.map_or(false, |max| frames >= max) {
                break Exit::FrameBudget;
            }
            if let Some(frame_time) = frame_time {
                if let Some(left) = frame_time.checked_sub(started.elapsed()) {
                    spin_sleep::sleep(left);
                }
            }
            if frames % 600 == 0 {
                debug!("{} frames, pc {:#05x}", frames, self.interpreter.program_counter());
            }
        };

        if self.sound.is_beeping() {
            self.sound.stop()?;
        }
        info!("stopped after {} frames: {:?}", frames, exit);
        Ok(exit)
    }
}
