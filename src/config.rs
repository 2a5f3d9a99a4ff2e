/// Behaviour switches for the places where interpreters disagree. The
/// defaults reproduce the baseline machine bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// 8XY4 writes VF = 1 on overflow, 0 otherwise. Off: VF is untouched.
    pub add_sets_carry: bool,
    /// 8XYE writes VF as 0/1. Off: VF gets the raw masked bit (0x00 or 0x80).
    pub normalize_shift_flag: bool,
    /// Timers keep counting while FX0A re-polls for a key.
    pub tick_timers_while_waiting: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            add_sets_carry: false,
            normalize_shift_flag: false,
            tick_timers_while_waiting: true,
        }
    }
}

impl Quirks {
    /// the conventional CHIP-8 flag behaviour
    pub fn conventional() -> Self {
        Quirks {
            add_sets_carry: true,
            normalize_shift_flag: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VmConfig {
    pub quirks: Quirks,
    /// fixed seed for CXNN; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl VmConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }
}
