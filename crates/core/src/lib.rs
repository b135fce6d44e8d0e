//! # spipwm-core
//!
//! Cycle-accurate emulation core for a small SPI-controlled PWM peripheral.
//!
//! The modeled chip is a register-addressable peripheral on a bit-serial
//! command bus: a 16-bit write-only wire protocol (1 direction bit, 7
//! address bits, 8 data bits, MSB first, framed by an active-low chip
//! select) programs four control registers, and two 8-bit output buses
//! carry the result. The primary bus mixes static levels with a shared
//! ~3 kHz PWM waveform; the secondary bus is purely static. The system
//! clock is 10 MHz and every block is evaluated once per clock tick.
//!
//! ## Architecture
//!
//! - [`SpiPwm`] — Top-level chip that wires together decoder, registers,
//!   and waveform engine, and evaluates the output mux
//! - [`peripherals`] — Command decoder, register file, PWM engine
//! - [`driver`] — Controller-side transaction generator (the bench side
//!   of the bus)
//! - [`script`] — Text stimulus format for scripted bench sessions
//! - [`trace`] — Output edge recording and period/duty measurement
//! - [`snapshot`] — Chip state snapshots for rewind functionality
//! - [`savestate`] — Save/load chip state to compressed files
//!
//! ## Evaluation order
//!
//! Each [`SpiPwm::step`] runs one clock tick in a fixed sequence: bus-line
//! sampling, frame completion and register apply, PWM counter advance,
//! output mux. A write whose 16th bit lands on this tick is therefore
//! visible on the output bus in this same tick.

pub mod peripherals;
pub mod driver;
pub mod script;
pub mod trace;
pub mod snapshot;
pub mod savestate;

pub use driver::BusDriver;
pub use peripherals::{CommandDecoder, CommandFrame, Direction, PwmEngine, RegisterFile};
pub use trace::WaveTrace;

/// System clock frequency: 10 MHz
pub const CLOCK_HZ: u32 = 10_000_000;

/// Packed input-bus bit positions (the pinout the external bench drives).
pub const BUS_SCLK_BIT: u8 = 0;
pub const BUS_COPI_BIT: u8 = 1;
pub const BUS_NCS_BIT: u8 = 2;

/// Cap on the decoded-frame trace log.
const FRAME_TRACE_MAX: usize = 200;

/// The chip: command decoder + register file + PWM engine behind three
/// serial input lines and two 8-bit output buses.
pub struct SpiPwm {
    pub decoder: CommandDecoder,
    pub regs: RegisterFile,
    pub pwm: PwmEngine,
    /// Input pin latches, as last driven by the external bench.
    sclk: bool,
    copi: bool,
    ncs: bool,
    /// Module enable. While low the core holds all state and outputs.
    ena: bool,
    /// System ticks elapsed (monotonic, survives `reset`).
    tick: u64,
    /// Output bus latches.
    primary: u8,
    secondary: u8,
    /// Output edge recording for measurement and waveform display.
    pub trace: WaveTrace,
    /// Enable debug output (eprintln)
    pub debug: bool,
    /// Decoded-frame trace for diagnostics (first 200 entries when enabled)
    pub frame_trace: Vec<String>,
    pub frame_trace_enabled: bool,
    /// Debug counters: completed frames since reset
    pub dbg_frames_decoded: u64,
    /// Debug counters: writes that landed on a defined register
    pub dbg_writes_applied: u64,
    /// Debug counters: writes to reserved addresses, silently dropped
    pub dbg_writes_ignored: u64,
    /// Debug counters: read frames (inert on this bus)
    pub dbg_reads_seen: u64,
}

impl SpiPwm {
    /// Create a new chip with all blocks in power-on state: registers
    /// zeroed, decoder idle, counters cleared, both buses low, enabled.
    pub fn new() -> Self {
        SpiPwm {
            decoder: CommandDecoder::new(),
            regs: RegisterFile::new(),
            pwm: PwmEngine::new(),
            sclk: false,
            copi: false,
            ncs: true,
            ena: true,
            tick: 0,
            primary: 0,
            secondary: 0,
            trace: WaveTrace::new(),
            debug: false,
            frame_trace: Vec::new(),
            frame_trace_enabled: false,
            dbg_frames_decoded: 0,
            dbg_writes_applied: 0,
            dbg_writes_ignored: 0,
            dbg_reads_seen: 0,
        }
    }

    /// Assert system reset: every block returns to power-on values and both
    /// buses drop low. The tick counter and recorded trace are kept so sim
    /// time stays monotonic across the reset pulse.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.regs.reset();
        self.pwm.reset();
        self.primary = 0;
        self.secondary = 0;
        self.dbg_frames_decoded = 0;
        self.dbg_writes_applied = 0;
        self.dbg_writes_ignored = 0;
        self.dbg_reads_seen = 0;
        self.frame_trace.clear();
        if self.trace.enabled {
            self.trace.record_primary(self.tick, 0);
            self.trace.record_secondary(self.tick, 0);
        }
    }

    /// Drive the three serial bus lines for subsequent ticks.
    pub fn set_spi(&mut self, sclk: bool, copi: bool, ncs: bool) {
        self.sclk = sclk;
        self.copi = copi;
        self.ncs = ncs;
    }

    /// Drive the serial lines from the packed input bus
    /// (bit 0 = SCLK, bit 1 = COPI, bit 2 = nCS).
    pub fn set_bus(&mut self, value: u8) {
        self.set_spi(
            value & (1 << BUS_SCLK_BIT) != 0,
            value & (1 << BUS_COPI_BIT) != 0,
            value & (1 << BUS_NCS_BIT) != 0,
        );
    }

    /// Drive the module-enable line. While low the chip freezes: no
    /// decoding, no counter advance, outputs held.
    pub fn set_ena(&mut self, ena: bool) {
        self.ena = ena;
    }

    /// Primary output bus (static levels and/or the PWM waveform).
    pub fn primary_out(&self) -> u8 {
        self.primary
    }

    /// Secondary output bus (always the aux register, verbatim).
    pub fn secondary_out(&self) -> u8 {
        self.secondary
    }

    /// System ticks elapsed.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Run one system-clock tick.
    pub fn step(&mut self) {
        self.tick += 1;
        if !self.ena {
            return;
        }

        // Bus sampling and frame dispatch.
        let bits_before = self.decoder.bits_captured();
        let aborts_before = self.decoder.dbg_aborts;
        if let Some(frame) = self.decoder.sample(self.sclk, self.copi, self.ncs) {
            self.dbg_frames_decoded += 1;
            match frame.direction {
                Direction::Write => {
                    let applied = self.regs.apply(&frame);
                    if applied {
                        self.dbg_writes_applied += 1;
                    } else {
                        self.dbg_writes_ignored += 1;
                    }
                    self.log_frame(format!(
                        "WR addr=0x{:02X} data=0x{:02X} {}",
                        frame.address,
                        frame.data,
                        if applied { "applied" } else { "ignored" }
                    ));
                }
                Direction::Read => {
                    self.dbg_reads_seen += 1;
                    self.log_frame(format!(
                        "RD addr=0x{:02X} data=0x{:02X} (no return path)",
                        frame.address, frame.data
                    ));
                }
            }
        } else if self.decoder.dbg_aborts != aborts_before {
            self.log_frame(format!("ABORT after {} bits", bits_before));
        }

        // Waveform advance, then the output mux, so a write applied above
        // is reflected in this tick's bus values.
        self.pwm.tick();
        self.eval_outputs();
    }

    /// Run `ticks` system-clock ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Evaluate the output mux from current register and waveform state.
    ///
    /// Per primary bit: with PWM globally enabled, bits set in the select
    /// register follow the shared waveform and clear bits are driven low;
    /// with PWM disabled the select register is the bus value verbatim.
    /// The secondary bus is always the aux register.
    fn eval_outputs(&mut self) {
        let primary = if self.regs.pwm_enable {
            if self.pwm.level(self.regs.duty_cycle) {
                self.regs.output_select
            } else {
                0
            }
        } else {
            self.regs.output_select
        };
        let secondary = self.regs.aux_output;

        if self.trace.enabled {
            self.trace.record_primary(self.tick, primary);
            self.trace.record_secondary(self.tick, secondary);
        }
        self.primary = primary;
        self.secondary = secondary;
    }

    fn log_frame(&mut self, entry: String) {
        if self.debug {
            eprintln!("[frame t={}] {}", self.tick, entry);
        }
        if self.frame_trace_enabled && self.frame_trace.len() < FRAME_TRACE_MAX {
            self.frame_trace.push(entry);
        }
    }

    /// Format a register/state dump string.
    pub fn dump_regs(&self) -> String {
        format!(
            "OutputSelect=0x{:02X} AuxOutput=0x{:02X} PwmEnable={} DutyCycle=0x{:02X}\n\
             decoder={:?} bits={} duty_count={} level={}\n\
             tick={} ena={} primary=0x{:02X} secondary=0x{:02X}\n\
             frames={} applied={} ignored={} reads={} aborts={}",
            self.regs.output_select,
            self.regs.aux_output,
            self.regs.pwm_enable as u8,
            self.regs.duty_cycle,
            self.decoder.state,
            self.decoder.bits_captured(),
            self.pwm.duty_count(),
            self.pwm.level(self.regs.duty_cycle) as u8,
            self.tick,
            self.ena as u8,
            self.primary,
            self.secondary,
            self.dbg_frames_decoded,
            self.dbg_writes_applied,
            self.dbg_writes_ignored,
            self.dbg_reads_seen,
            self.decoder.dbg_aborts,
        )
    }

    /// Capture the full chip state.
    pub fn save_state(&self) -> savestate::SaveState {
        savestate::SaveState {
            tick: self.tick,
            ena: self.ena,
            primary: self.primary,
            secondary: self.secondary,
            sclk: self.sclk,
            copi: self.copi,
            ncs: self.ncs,
            decoder: self.decoder.save_state(),
            regs: self.regs.save_state(),
            pwm: self.pwm.save_state(),
            frames_decoded: self.dbg_frames_decoded,
            writes_applied: self.dbg_writes_applied,
            writes_ignored: self.dbg_writes_ignored,
            reads_seen: self.dbg_reads_seen,
        }
    }

    /// Restore the full chip state. The trace is not part of a save state;
    /// it keeps recording from the restored tick.
    pub fn load_state(&mut self, s: &savestate::SaveState) {
        self.tick = s.tick;
        self.ena = s.ena;
        self.primary = s.primary;
        self.secondary = s.secondary;
        self.sclk = s.sclk;
        self.copi = s.copi;
        self.ncs = s.ncs;
        self.decoder.load_state(&s.decoder);
        self.regs.load_state(&s.regs);
        self.pwm.load_state(&s.pwm);
        self.dbg_frames_decoded = s.frames_decoded;
        self.dbg_writes_applied = s.writes_applied;
        self.dbg_writes_ignored = s.writes_ignored;
        self.dbg_reads_seen = s.reads_seen;
    }

    /// Save current state as a snapshot (for rewind).
    pub fn save_snapshot(&self) -> snapshot::Snapshot {
        snapshot::Snapshot {
            state: self.save_state(),
            tick: self.tick,
        }
    }

    /// Restore state from a snapshot (rewind).
    pub fn restore_snapshot(&mut self, snap: &snapshot::Snapshot) {
        self.load_state(&snap.state);
    }
}

impl Default for SpiPwm {
    fn default() -> Self {
        Self::new()
    }
}
