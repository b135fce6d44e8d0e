//! Peripheral core blocks.
//!
//! The three blocks behind the chip's pins:
//!
//! - [`CommandDecoder`] — frames the SCLK/COPI/nCS bit stream into commands
//! - [`RegisterFile`] — addressable control state, mutated by write frames
//! - [`PwmEngine`] — shared free-running prescaler + duty counter
//!
//! The output mux that combines register state and the PWM level onto the
//! two physical buses lives in the top-level chip (`lib.rs`), next to the
//! pin latches it reads.

mod decoder;
mod regfile;
mod pwm;

pub use decoder::{CommandDecoder, CommandFrame, Direction, Framing};
pub use regfile::{
    RegisterFile, REG_AUX_OUTPUT, REG_DUTY_CYCLE, REG_OUTPUT_SELECT, REG_PWM_ENABLE,
};
pub use pwm::{PwmEngine, PWM_PRESCALE, PWM_STEPS};
