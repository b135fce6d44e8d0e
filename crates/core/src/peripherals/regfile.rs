//! Register file.
//!
//! Holds the four architectural control registers. Values change only when
//! a completed write frame lands on a defined address; everything else on
//! the 7-bit bus is reserved and writes there vanish silently, which is the
//! observed hardware behavior rather than an error.

use super::decoder::{CommandFrame, Direction};

/// Static value / PWM channel select for the primary bus.
pub const REG_OUTPUT_SELECT: u8 = 0x00;
/// Static value driven on the secondary bus.
pub const REG_AUX_OUTPUT: u8 = 0x01;
/// Global PWM enable, bit 0 only.
pub const REG_PWM_ENABLE: u8 = 0x02;
/// Shared duty-cycle setting, 0..=255.
pub const REG_DUTY_CYCLE: u8 = 0x04;

/// The peripheral's addressable control state.
///
/// When PWM is globally disabled, `output_select` is the raw value on the
/// primary bus. When enabled, each set bit marks that primary-bus bit as
/// PWM-driven instead.
pub struct RegisterFile {
    pub output_select: u8,
    pub aux_output: u8,
    pub pwm_enable: bool,
    pub duty_cycle: u8,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            output_select: 0,
            aux_output: 0,
            pwm_enable: false,
            duty_cycle: 0,
        }
    }

    /// Power-on values: everything zero, all outputs static low.
    pub fn reset(&mut self) {
        *self = RegisterFile::new();
    }

    /// Apply a completed frame. Returns true if a register was written.
    ///
    /// Read frames and writes to reserved addresses fall through with no
    /// state change and no error; the bus is write-only on the observed
    /// interface.
    pub fn apply(&mut self, frame: &CommandFrame) -> bool {
        if frame.direction != Direction::Write {
            return false;
        }
        match frame.address {
            REG_OUTPUT_SELECT => { self.output_select = frame.data; true }
            REG_AUX_OUTPUT => { self.aux_output = frame.data; true }
            REG_PWM_ENABLE => { self.pwm_enable = frame.data & 0x01 != 0; true }
            REG_DUTY_CYCLE => { self.duty_cycle = frame.data; true }
            _ => false,
        }
    }

    /// Debug/step-mode register readback. Not a bus path: the wire protocol
    /// has no read-data return in this revision.
    pub fn read(&self, address: u8) -> Option<u8> {
        match address {
            REG_OUTPUT_SELECT => Some(self.output_select),
            REG_AUX_OUTPUT => Some(self.aux_output),
            REG_PWM_ENABLE => Some(self.pwm_enable as u8),
            REG_DUTY_CYCLE => Some(self.duty_cycle),
            _ => None,
        }
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> crate::savestate::RegFileState {
        crate::savestate::RegFileState {
            output_select: self.output_select,
            aux_output: self.aux_output,
            pwm_enable: self.pwm_enable,
            duty_cycle: self.duty_cycle,
        }
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, s: &crate::savestate::RegFileState) {
        self.output_select = s.output_select;
        self.aux_output = s.aux_output;
        self.pwm_enable = s.pwm_enable;
        self.duty_cycle = s.duty_cycle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(address: u8, data: u8) -> CommandFrame {
        CommandFrame { direction: Direction::Write, address, data }
    }

    #[test]
    fn test_defined_writes_land() {
        let mut regs = RegisterFile::new();
        assert!(regs.apply(&write(REG_OUTPUT_SELECT, 0xF0)));
        assert!(regs.apply(&write(REG_AUX_OUTPUT, 0xCC)));
        assert!(regs.apply(&write(REG_DUTY_CYCLE, 0x80)));
        assert_eq!(regs.output_select, 0xF0);
        assert_eq!(regs.aux_output, 0xCC);
        assert_eq!(regs.duty_cycle, 0x80);
    }

    #[test]
    fn test_pwm_enable_uses_bit0_only() {
        let mut regs = RegisterFile::new();
        assert!(regs.apply(&write(REG_PWM_ENABLE, 0xFE)));
        assert!(!regs.pwm_enable);
        assert!(regs.apply(&write(REG_PWM_ENABLE, 0xFF)));
        assert!(regs.pwm_enable);
        assert!(regs.apply(&write(REG_PWM_ENABLE, 0x00)));
        assert!(!regs.pwm_enable);
    }

    #[test]
    fn test_reserved_addresses_ignored() {
        let mut regs = RegisterFile::new();
        regs.apply(&write(REG_OUTPUT_SELECT, 0xAA));
        for addr in [0x03u8, 0x05, 0x30, 0x7F] {
            assert!(!regs.apply(&write(addr, 0xFF)));
        }
        // Nothing moved.
        assert_eq!(regs.output_select, 0xAA);
        assert_eq!(regs.aux_output, 0);
        assert!(!regs.pwm_enable);
        assert_eq!(regs.duty_cycle, 0);
    }

    #[test]
    fn test_read_frames_never_mutate() {
        let mut regs = RegisterFile::new();
        let frame = CommandFrame {
            direction: Direction::Read,
            address: REG_OUTPUT_SELECT,
            data: 0xBE,
        };
        assert!(!regs.apply(&frame));
        assert_eq!(regs.output_select, 0);
    }

    #[test]
    fn test_readback() {
        let mut regs = RegisterFile::new();
        regs.apply(&write(REG_DUTY_CYCLE, 0x40));
        assert_eq!(regs.read(REG_DUTY_CYCLE), Some(0x40));
        assert_eq!(regs.read(REG_PWM_ENABLE), Some(0));
        assert_eq!(regs.read(0x30), None);
    }
}
