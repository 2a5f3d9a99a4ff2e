/// Delay and sound countdowns, ticked once per completed cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
    buzzer: bool,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count both timers down (floor 0) and return the buzzer state, which
    /// is on exactly while the sound timer is nonzero.
    pub fn tick(&mut self) -> bool {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
        self.buzzer = self.sound > 0;
        self.buzzer
    }

    pub fn buzzer_enabled(&self) -> bool {
        self.buzzer
    }
}
