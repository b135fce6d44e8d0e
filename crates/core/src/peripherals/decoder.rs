//! Serial command decoder.
//!
//! Frames the inbound bit-serial stream (SCLK / COPI / nCS) into 16-bit
//! commands. The three lines are externally driven and asynchronous to the
//! core, so they are sampled once per system-clock tick and edges are found
//! by comparing against the previous sample. This is valid as long as the
//! serial clock is much slower than the system clock (the stock driver runs
//! SCLK at 100 kHz against a 10 MHz core, so every serial transition is seen
//! by dozens of samples).
//!
//! Frame layout, MSB first:
//!
//! ```text
//! bit15      direction (1 = write, 0 = read)
//! bits14..8  register address (7 bits)
//! bits7..0   data (8 bits)
//! ```
//!
//! A frame completes the moment the 16th bit is latched; the decoder does
//! not wait for nCS to rise. Raising nCS before bit 16 discards the partial
//! frame with no effect. Extra SCLK edges after bit 16 while nCS stays low
//! are ignored.

/// Transfer direction, taken from bit 15 of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One complete decoded command. Transient: constructed by the decoder,
/// consumed once by the register file, then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub direction: Direction,
    /// 7-bit register address (0..=127).
    pub address: u8,
    pub data: u8,
}

impl CommandFrame {
    /// Split a raw 16-bit shift buffer into its fields.
    pub fn from_raw(raw: u16) -> Self {
        CommandFrame {
            direction: if raw & 0x8000 != 0 { Direction::Write } else { Direction::Read },
            address: ((raw >> 8) & 0x7F) as u8,
            data: (raw & 0xFF) as u8,
        }
    }

    pub fn is_write(&self) -> bool {
        self.direction == Direction::Write
    }
}

/// Framing state. Idle while nCS is high; Shifting for the whole CS-low
/// interval, including the slack after bit 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Idle,
    Shifting,
}

/// Bit-serial command decoder.
pub struct CommandDecoder {
    pub state: Framing,
    /// Shift buffer, filled MSB first.
    shift: u16,
    /// Bits captured in the current CS-low interval (0..=16).
    bit_count: u8,
    /// Previous tick's line samples, for edge detection.
    prev_sclk: bool,
    prev_ncs: bool,
    /// Partial frames discarded by an early nCS rise.
    pub dbg_aborts: u64,
}

impl CommandDecoder {
    pub fn new() -> Self {
        CommandDecoder {
            state: Framing::Idle,
            shift: 0,
            bit_count: 0,
            prev_sclk: false,
            prev_ncs: true, // bus idles deselected
            dbg_aborts: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = CommandDecoder::new();
    }

    /// Bits latched so far in the current frame.
    pub fn bits_captured(&self) -> u8 {
        self.bit_count
    }

    /// Sample the three bus lines for this system-clock tick.
    ///
    /// Returns a completed frame on the tick that latches the 16th bit,
    /// `None` otherwise. The caller applies the frame in the same tick.
    pub fn sample(&mut self, sclk: bool, copi: bool, ncs: bool) -> Option<CommandFrame> {
        let sclk_rising = sclk && !self.prev_sclk;
        let ncs_falling = !ncs && self.prev_ncs;
        let ncs_rising = ncs && !self.prev_ncs;
        self.prev_sclk = sclk;
        self.prev_ncs = ncs;

        if ncs_rising {
            // Deselect. A partial frame (fewer than 16 bits) is dropped
            // without touching any register.
            if self.state == Framing::Shifting && self.bit_count > 0 && self.bit_count < 16 {
                self.dbg_aborts += 1;
            }
            self.state = Framing::Idle;
            self.shift = 0;
            self.bit_count = 0;
            return None;
        }

        if ncs_falling {
            self.state = Framing::Shifting;
            self.shift = 0;
            self.bit_count = 0;
        }

        if self.state == Framing::Shifting && !ncs && sclk_rising && self.bit_count < 16 {
            self.shift = (self.shift << 1) | copi as u16;
            self.bit_count += 1;
            if self.bit_count == 16 {
                // Frame latched. Stay in Shifting so surplus clocks before
                // the nCS rise fall through the bit_count guard above.
                return Some(CommandFrame::from_raw(self.shift));
            }
        }

        None
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> crate::savestate::DecoderState {
        crate::savestate::DecoderState {
            shifting: self.state == Framing::Shifting,
            shift: self.shift,
            bit_count: self.bit_count,
            prev_sclk: self.prev_sclk,
            prev_ncs: self.prev_ncs,
        }
    }

    /// Restore state from save state. The abort counter is not persisted.
    pub fn load_state(&mut self, s: &crate::savestate::DecoderState) {
        self.state = if s.shifting { Framing::Shifting } else { Framing::Idle };
        self.shift = s.shift;
        self.bit_count = s.bit_count;
        self.prev_sclk = s.prev_sclk;
        self.prev_ncs = s.prev_ncs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock one full bit through the decoder: data setup while SCLK low,
    /// latched on the rising edge.
    fn clock_bit(dec: &mut CommandDecoder, bit: bool) -> Option<CommandFrame> {
        assert!(dec.sample(false, bit, false).is_none());
        dec.sample(true, bit, false)
    }

    fn shift_word(dec: &mut CommandDecoder, word: u16, bits: u8) -> Option<CommandFrame> {
        let mut out = None;
        for i in 0..bits {
            let bit = word & (0x8000 >> i) != 0;
            if let Some(f) = clock_bit(dec, bit) {
                out = Some(f);
            }
        }
        out
    }

    #[test]
    fn test_write_frame_fields() {
        let mut dec = CommandDecoder::new();
        assert!(dec.sample(false, false, false).is_none()); // CS falls
        let frame = shift_word(&mut dec, 0x80F0, 16).unwrap();
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.address, 0x00);
        assert_eq!(frame.data, 0xF0);
    }

    #[test]
    fn test_read_frame_fields() {
        let mut dec = CommandDecoder::new();
        dec.sample(false, false, false);
        let raw = (0x30u16 << 8) | 0xBE; // direction bit clear
        let frame = shift_word(&mut dec, raw, 16).unwrap();
        assert_eq!(frame.direction, Direction::Read);
        assert_eq!(frame.address, 0x30);
        assert_eq!(frame.data, 0xBE);
    }

    #[test]
    fn test_frame_completes_on_16th_bit() {
        let mut dec = CommandDecoder::new();
        dec.sample(false, false, false);
        assert!(shift_word(&mut dec, 0x8142, 15).is_none());
        assert_eq!(dec.bits_captured(), 15);
        let frame = clock_bit(&mut dec, false).unwrap();
        assert_eq!(frame.address, 0x01);
        // CS is still low at this point; the frame must not wait for it.
        assert_eq!(dec.state, Framing::Shifting);
    }

    #[test]
    fn test_surplus_clocks_ignored() {
        let mut dec = CommandDecoder::new();
        dec.sample(false, false, false);
        assert!(shift_word(&mut dec, 0x8411, 16).is_some());
        // Keep clocking past bit 16: no second frame, no state change.
        for _ in 0..8 {
            assert!(clock_bit(&mut dec, true).is_none());
        }
        assert_eq!(dec.bits_captured(), 16);
        assert_eq!(dec.state, Framing::Shifting);
    }

    #[test]
    fn test_truncated_frame_discarded() {
        let mut dec = CommandDecoder::new();
        dec.sample(false, false, false);
        assert!(shift_word(&mut dec, 0xFFFF, 7).is_none());
        assert!(dec.sample(false, false, true).is_none()); // CS rises early
        assert_eq!(dec.state, Framing::Idle);
        assert_eq!(dec.bits_captured(), 0);
        assert_eq!(dec.dbg_aborts, 1);

        // The next CS-low interval frames cleanly from bit 0.
        dec.sample(false, false, false);
        let frame = shift_word(&mut dec, 0x8255, 16).unwrap();
        assert_eq!(frame.address, 0x02);
        assert_eq!(frame.data, 0x55);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut dec = CommandDecoder::new();
        for (raw, addr) in [(0x80AAu16, 0x00u8), (0x81BB, 0x01)] {
            dec.sample(false, false, false);
            let frame = shift_word(&mut dec, raw, 16).unwrap();
            assert_eq!(frame.address, addr);
            dec.sample(false, false, true);
        }
        assert_eq!(dec.dbg_aborts, 0);
    }

    #[test]
    fn test_msb_first_order() {
        let mut dec = CommandDecoder::new();
        dec.sample(false, false, false);
        // Only bit 15 set: first bit on the wire must land in the direction slot.
        let frame = shift_word(&mut dec, 0x8000, 16).unwrap();
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.address, 0);
        assert_eq!(frame.data, 0);
    }
}
