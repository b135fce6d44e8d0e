//! Controller-side bus driver.
//!
//! Synthesizes bit-level transactions against the chip the way an external
//! bench would: set up COPI while SCLK is low, raise SCLK to latch, repeat
//! for 16 bits MSB first, then raise nCS and let the bus settle. The serial
//! clock runs two orders of magnitude slower than the system clock so the
//! synchronous decoder sees every transition (default: 50-tick half-period,
//! i.e. 100 kHz SCLK against a 10 MHz core).
//!
//! Also exposes deliberately truncated transactions (nCS raised after N of
//! the 16 bits) to exercise the abort path.

use crate::peripherals::Direction;
use crate::SpiPwm;

/// Transaction generator with configurable serial timing.
pub struct BusDriver {
    /// System ticks per SCLK half-period.
    pub half_period: u32,
    /// Ticks to run with nCS high after each transaction.
    pub settle_ticks: u32,
}

impl BusDriver {
    pub fn new() -> Self {
        BusDriver { half_period: 50, settle_ticks: 600 }
    }

    /// Issue a complete write transaction.
    pub fn write(&self, chip: &mut SpiPwm, address: u8, data: u8) -> Result<(), String> {
        self.send(chip, Direction::Write, address, data, 16)
    }

    /// Issue a complete read transaction. The bus has no read-data return
    /// path, so the data byte is clocked out but the chip stays untouched.
    pub fn read(&self, chip: &mut SpiPwm, address: u8, data: u8) -> Result<(), String> {
        self.send(chip, Direction::Read, address, data, 16)
    }

    /// Issue a write transaction aborted by raising nCS after `bits` of the
    /// 16 frame bits (0 < bits < 16).
    pub fn write_truncated(
        &self,
        chip: &mut SpiPwm,
        address: u8,
        data: u8,
        bits: u8,
    ) -> Result<(), String> {
        if bits == 0 || bits >= 16 {
            return Err(format!("truncation point out of range: {} (expected 1-15)", bits));
        }
        self.send(chip, Direction::Write, address, data, bits)
    }

    fn send(
        &self,
        chip: &mut SpiPwm,
        direction: Direction,
        address: u8,
        data: u8,
        bits: u8,
    ) -> Result<(), String> {
        if address > 0x7F {
            return Err(format!("address out of range: 0x{:02X} (7-bit bus)", address));
        }

        let dir_bit = (direction == Direction::Write) as u16;
        let word = (dir_bit << 15) | ((address as u16) << 8) | data as u16;

        // Select: nCS falls with SCLK low.
        chip.set_spi(false, false, false);
        chip.run(1);

        for i in 0..bits {
            let bit = word & (0x8000 >> i) != 0;
            // Data setup while SCLK is low, latch on the rising edge.
            chip.set_spi(false, bit, false);
            chip.run(self.half_period as u64);
            chip.set_spi(true, bit, false);
            chip.run(self.half_period as u64);
        }

        // Deselect and settle.
        chip.set_spi(false, false, true);
        chip.run(self.settle_ticks as u64);
        Ok(())
    }
}

impl Default for BusDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_reaches_register() {
        let mut chip = SpiPwm::new();
        let drv = BusDriver::new();
        drv.write(&mut chip, 0x00, 0xF0).unwrap();
        assert_eq!(chip.regs.output_select, 0xF0);
        assert_eq!(chip.dbg_frames_decoded, 1);
        assert_eq!(chip.dbg_writes_applied, 1);
    }

    #[test]
    fn test_address_validation() {
        let mut chip = SpiPwm::new();
        let drv = BusDriver::new();
        assert!(drv.write(&mut chip, 0x80, 0x00).is_err());
        assert_eq!(chip.dbg_frames_decoded, 0);
    }

    #[test]
    fn test_truncated_write_discarded() {
        let mut chip = SpiPwm::new();
        let drv = BusDriver::new();
        drv.write_truncated(&mut chip, 0x00, 0xFF, 7).unwrap();
        assert_eq!(chip.regs.output_select, 0);
        assert_eq!(chip.dbg_frames_decoded, 0);
        assert_eq!(chip.decoder.dbg_aborts, 1);
    }

    #[test]
    fn test_truncation_point_validated() {
        let mut chip = SpiPwm::new();
        let drv = BusDriver::new();
        assert!(drv.write_truncated(&mut chip, 0x00, 0xFF, 0).is_err());
        assert!(drv.write_truncated(&mut chip, 0x00, 0xFF, 16).is_err());
    }

    #[test]
    fn test_slow_serial_clock_tolerated() {
        // Ten times slower serial clock: the decoder just sees more samples
        // per level, the frame is identical.
        let mut chip = SpiPwm::new();
        let drv = BusDriver { half_period: 500, settle_ticks: 600 };
        drv.write(&mut chip, 0x01, 0xCC).unwrap();
        assert_eq!(chip.regs.aux_output, 0xCC);
    }
}
