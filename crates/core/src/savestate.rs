//! Save state (quick save / quick load) for the peripheral emulator.
//!
//! Captures the full chip state to a file using bincode serialization with
//! deflate compression, so a bench session (step mode, GUI) can be parked
//! and resumed later.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "SPWM"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Magic bytes identifying a spipwm-emu save state file.
const MAGIC: &[u8; 4] = b"SPWM";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;

// ─── Per-component state structs ────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct DecoderState {
    pub shifting: bool,
    pub shift: u16,
    pub bit_count: u8,
    pub prev_sclk: bool,
    pub prev_ncs: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RegFileState {
    pub output_select: u8,
    pub aux_output: u8,
    pub pwm_enable: bool,
    pub duty_cycle: u8,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PwmState {
    pub prescale_count: u8,
    pub duty_count: u8,
}

// ─── Top-level save state ───────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct SaveState {
    // Chip
    pub tick: u64,
    pub ena: bool,
    pub primary: u8,
    pub secondary: u8,

    // Input pin latches
    pub sclk: bool,
    pub copi: bool,
    pub ncs: bool,

    // Components
    pub decoder: DecoderState,
    pub regs: RegFileState,
    pub pwm: PwmState,

    // Frame statistics
    pub frames_decoded: u64,
    pub writes_applied: u64,
    pub writes_ignored: u64,
    pub reads_seen: u64,
}

// ─── File I/O ───────────────────────────────────────────────────────────────

/// Save state to file with header and deflate compression.
pub fn save_to_file(state: &SaveState, path: &Path) -> Result<(), String> {
    let payload = bincode::serialize(state)
        .map_err(|e| format!("Serialize error: {}", e))?;

    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);

    std::fs::write(path, &out)
        .map_err(|e| format!("Write error: {}", e))
}

/// Load state from file, verifying magic and version.
pub fn load_from_file(path: &Path) -> Result<SaveState, String> {
    let data = std::fs::read(path)
        .map_err(|e| format!("Read error: {}", e))?;

    if data.len() < 8 {
        return Err("File too small".into());
    }
    if &data[0..4] != MAGIC {
        return Err("Invalid save state file (bad magic)".into());
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(format!("Unsupported save state version {} (expected {})",
            version, FORMAT_VERSION));
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
        .map_err(|e| format!("Decompress error: {:?}", e))?;

    bincode::deserialize(&decompressed)
        .map_err(|e| format!("Deserialize error: {}", e))
}

/// Derive save state file path from a stimulus script path.
/// `bench.script` → `bench.state`
pub fn state_path(script_path: &str) -> String {
    let p = Path::new(script_path);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("bench");
    let dir = p.parent().unwrap_or(Path::new("."));
    dir.join(format!("{}.state", stem)).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SaveState {
        SaveState {
            tick: 123_456,
            ena: true,
            primary: 0xF0,
            secondary: 0xCC,
            sclk: false,
            copi: true,
            ncs: true,
            decoder: DecoderState {
                shifting: false, shift: 0, bit_count: 0,
                prev_sclk: false, prev_ncs: true,
            },
            regs: RegFileState {
                output_select: 0xF0, aux_output: 0xCC,
                pwm_enable: true, duty_cycle: 0x80,
            },
            pwm: PwmState { prescale_count: 7, duty_count: 42 },
            frames_decoded: 4,
            writes_applied: 3,
            writes_ignored: 1,
            reads_seen: 0,
        }
    }

    #[test]
    fn test_roundtrip_via_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("spipwm_savestate_test.state");
        let state = sample_state();
        save_to_file(&state, &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.tick, state.tick);
        assert_eq!(loaded.regs.duty_cycle, 0x80);
        assert_eq!(loaded.pwm.duty_count, 42);
        assert_eq!(loaded.frames_decoded, 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("spipwm_savestate_badmagic.state");
        std::fs::write(&path, b"XXXX\x01\x00\x00\x00garbage").unwrap();
        assert!(load_from_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_state_path_derivation() {
        assert_eq!(state_path("demo/bench.script"), "demo/bench.state");
        assert_eq!(state_path("bench.txt"), "bench.state");
    }
}
