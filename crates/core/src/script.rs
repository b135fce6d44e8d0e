//! Stimulus script parser.
//!
//! Parses a line-oriented text format describing a bus session, so the
//! headless frontend can replay bench sequences:
//!
//! ```text
//! # program the static outputs, then spin up PWM on bit 0
//! write 0x00 0x01
//! write 0x02 0x01
//! write 0x04 0x80
//! wait  30000
//! abort 0x01 0xFF 7    # truncated transaction, must change nothing
//! read  0x30 0xBE
//! reset
//! ```
//!
//! Numbers accept `0x` hex or decimal. `#` starts a comment, blank lines
//! are skipped, errors name the offending line.

/// One stimulus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOp {
    /// Complete write transaction.
    Write { address: u8, data: u8 },
    /// Complete read transaction (inert on this bus, still framed).
    Read { address: u8, data: u8 },
    /// Write transaction truncated after `bits` of 16.
    Abort { address: u8, data: u8, bits: u8 },
    /// Idle system ticks with the bus deselected.
    Wait { ticks: u64 },
    /// Assert system reset.
    Reset,
}

/// Parse a stimulus script into its operation list.
pub fn parse_script(text: &str) -> Result<Vec<ScriptOp>, String> {
    let mut ops = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let op = fields.next().unwrap_or("");
        let args: Vec<&str> = fields.collect();

        match op {
            "write" | "read" => {
                if args.len() != 2 {
                    return Err(format!("line {}: {} takes <address> <data>", lineno, op));
                }
                let address = parse_u8(args[0], lineno, "address")?;
                let data = parse_u8(args[1], lineno, "data")?;
                if address > 0x7F {
                    return Err(format!("line {}: address 0x{:02X} exceeds the 7-bit bus", lineno, address));
                }
                if op == "write" {
                    ops.push(ScriptOp::Write { address, data });
                } else {
                    ops.push(ScriptOp::Read { address, data });
                }
            }
            "abort" => {
                if args.len() != 3 {
                    return Err(format!("line {}: abort takes <address> <data> <bits>", lineno));
                }
                let address = parse_u8(args[0], lineno, "address")?;
                let data = parse_u8(args[1], lineno, "data")?;
                let bits = parse_u8(args[2], lineno, "bits")?;
                if address > 0x7F {
                    return Err(format!("line {}: address 0x{:02X} exceeds the 7-bit bus", lineno, address));
                }
                if bits == 0 || bits >= 16 {
                    return Err(format!("line {}: truncation point {} out of range 1-15", lineno, bits));
                }
                ops.push(ScriptOp::Abort { address, data, bits });
            }
            "wait" => {
                if args.len() != 1 {
                    return Err(format!("line {}: wait takes <ticks>", lineno));
                }
                let ticks = parse_num(args[0])
                    .map_err(|e| format!("line {}: {}", lineno, e))?;
                ops.push(ScriptOp::Wait { ticks });
            }
            "reset" => {
                if !args.is_empty() {
                    return Err(format!("line {}: reset takes no operands", lineno));
                }
                ops.push(ScriptOp::Reset);
            }
            other => {
                return Err(format!("line {}: unknown operation '{}'", lineno, other));
            }
        }
    }

    Ok(ops)
}

fn parse_u8(s: &str, lineno: usize, what: &str) -> Result<u8, String> {
    let v = parse_num(s).map_err(|e| format!("line {}: {}", lineno, e))?;
    if v > 0xFF {
        return Err(format!("line {}: {} {} does not fit in 8 bits", lineno, what, s));
    }
    Ok(v as u8)
}

/// Parse `0x`-prefixed hex or plain decimal.
fn parse_num(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|_| format!("invalid number '{}'", s))
}
