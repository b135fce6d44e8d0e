//! PWM waveform engine.
//!
//! A prescale counter advances every system-clock tick and overflows at a
//! fixed divisor; each overflow steps a free-running 8-bit duty counter.
//! The output level is high while `duty_counter < duty_cycle`, giving 256
//! duty steps and a base frequency of
//! `clock / (PWM_PRESCALE * PWM_STEPS)` (about 3005 Hz at 10 MHz).
//!
//! There is exactly one engine in the core. Every primary-bus bit marked
//! PWM-driven broadcasts this engine's level, so all channels stay phase
//! aligned; there are no per-channel counters.
//!
//! The counters are free-running: register writes never touch them, only a
//! system reset clears them. `duty_cycle = 0xFF` is therefore high for 255
//! of every 256 steps, not a bit-exact constant high (the one-step dip is
//! invisible at normal measurement tolerances).

/// System-clock ticks per duty-counter step.
pub const PWM_PRESCALE: u32 = 13;
/// Duty counter modulus (8-bit resolution).
pub const PWM_STEPS: u32 = 256;

/// Shared free-running PWM counter pair.
pub struct PwmEngine {
    /// Prescale counter, 0..PWM_PRESCALE.
    prescale_count: u8,
    /// Duty counter, wraps mod 256.
    duty_count: u8,
}

impl PwmEngine {
    pub fn new() -> Self {
        PwmEngine { prescale_count: 0, duty_count: 0 }
    }

    pub fn reset(&mut self) {
        *self = PwmEngine::new();
    }

    /// Advance one system-clock tick.
    pub fn tick(&mut self) {
        self.prescale_count += 1;
        if self.prescale_count as u32 >= PWM_PRESCALE {
            self.prescale_count = 0;
            self.duty_count = self.duty_count.wrapping_add(1);
        }
    }

    /// Output level for the given duty-cycle setting.
    pub fn level(&self, duty_cycle: u8) -> bool {
        self.duty_count < duty_cycle
    }

    /// Current duty-counter value (debug/step surface).
    pub fn duty_count(&self) -> u8 {
        self.duty_count
    }

    /// Base PWM frequency in Hz for a given system clock.
    pub fn base_frequency(clock_hz: u32) -> f64 {
        clock_hz as f64 / (PWM_PRESCALE as f64 * PWM_STEPS as f64)
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> crate::savestate::PwmState {
        crate::savestate::PwmState {
            prescale_count: self.prescale_count,
            duty_count: self.duty_count,
        }
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, s: &crate::savestate::PwmState) {
        self.prescale_count = s.prescale_count;
        self.duty_count = s.duty_count;
    }
}
