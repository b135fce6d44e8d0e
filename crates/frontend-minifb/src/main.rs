//! spipwm emulator frontend v0.3.0.
//!
//! Provides three execution modes:
//!
//! - **GUI mode** (default): Scrolling logic-analyzer window showing all 16
//!   output pins, with live keyboard-driven bus transactions (duty up/down,
//!   PWM toggle, select/aux presets).
//! - **Headless mode** (`--headless`): Replay a stimulus script, print the
//!   decoded-frame log, measured PWM frequency/duty, and an ASCII waveform
//!   snapshot.
//! - **Step mode** (`--step`): Interactive tick-level debugger with bus
//!   transactions, measurements, save states, and rewind.

use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use spipwm_core::peripherals::{PWM_PRESCALE, PWM_STEPS};
use spipwm_core::script::{parse_script, ScriptOp};
use spipwm_core::snapshot::RewindBuffer;
use spipwm_core::{savestate, BusDriver, SpiPwm, CLOCK_HZ};
use std::env;
use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

/// Waveform window: one column per sample, 16 pin rows.
const WAVE_WIDTH: usize = 640;
const ROW_HEIGHT: usize = 22;
const WAVE_HEIGHT: usize = ROW_HEIGHT * 16;
/// System ticks per waveform column.
const SAMPLE_DIV: u64 = 64;
/// Trace colors: primary bus, secondary bus, grid.
const COLOR_PRIMARY: u32 = 0x00E070;
const COLOR_SECONDARY: u32 = 0x30A0E0;
const COLOR_GRID: u32 = 0x202020;

/// System ticks per full PWM period.
const PERIOD_TICKS: u64 = (PWM_PRESCALE * PWM_STEPS) as u64;

// ─── Main ───────────────────────────────────────────────────────────────────

fn usage(prog: &str) {
    eprintln!("spipwm Emulator v0.3.0 - Rust");
    eprintln!("Usage: {} [bench.script] [options]", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --headless           Replay the script without GUI, print measurements");
    eprintln!("  --step               Interactive step debugger");
    eprintln!("  --ticks N            Extra ticks after the script (headless, default 30000)");
    eprintln!("  --trace              Print the decoded-frame log (headless)");
    eprintln!("  --speed N            GUI slowdown factor, 1=real time (default 10)");
    eprintln!("  --debug              Verbose frame diagnostics on stderr");
    eprintln!();
    eprintln!("GUI keys: D/A=duty +/-  P=PWM toggle  O=select preset  X=aux preset");
    eprintln!("          R=reset  T=reg dump  Space=pause  Esc=Quit");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(&args[0]);
        std::process::exit(0);
    }

    let headless = args.iter().any(|a| a == "--headless");
    let step_mode = args.iter().any(|a| a == "--step");
    let debug = args.iter().any(|a| a == "--debug");

    // First non-flag argument is the stimulus script.
    let script_path: Option<&String> = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with('-') && !a.chars().all(|c| c.is_ascii_digit()));

    let ops: Vec<ScriptOp> = match script_path {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Failed to read {}: {}", path, e);
                    std::process::exit(1);
                }
            };
            match parse_script(&text) {
                Ok(ops) => ops,
                Err(e) => {
                    eprintln!("{}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
        None => demo_ops(),
    };
    if debug {
        if let Some(path) = script_path {
            println!("Loaded {} ({} operations)", path, ops.len());
        } else {
            println!("No script given, using built-in demo sequence");
        }
    }

    let mut chip = SpiPwm::new();
    chip.debug = debug;
    let driver = BusDriver::new();

    if step_mode {
        run_step_mode(&mut chip, &driver);
    } else if headless {
        run_headless(&args, &mut chip, &driver, &ops, script_path);
    } else {
        run_gui(&args, &mut chip, &driver, &ops, debug);
    }
}

/// Built-in demo: program both buses, exercise reserved/read frames, then
/// spin up 50% PWM on bit 0.
fn demo_ops() -> Vec<ScriptOp> {
    vec![
        ScriptOp::Write { address: 0x00, data: 0xF0 },
        ScriptOp::Write { address: 0x01, data: 0xCC },
        ScriptOp::Write { address: 0x30, data: 0xAA },
        ScriptOp::Read { address: 0x30, data: 0xBE },
        ScriptOp::Write { address: 0x00, data: 0x01 },
        ScriptOp::Write { address: 0x02, data: 0x01 },
        ScriptOp::Write { address: 0x04, data: 0x80 },
        ScriptOp::Wait { ticks: 10 * PERIOD_TICKS },
    ]
}

/// Apply one stimulus operation through the bus driver.
fn apply_op(chip: &mut SpiPwm, drv: &BusDriver, op: &ScriptOp) -> Result<(), String> {
    match *op {
        ScriptOp::Write { address, data } => drv.write(chip, address, data),
        ScriptOp::Read { address, data } => drv.read(chip, address, data),
        ScriptOp::Abort { address, data, bits } => drv.write_truncated(chip, address, data, bits),
        ScriptOp::Wait { ticks } => {
            chip.run(ticks);
            Ok(())
        }
        ScriptOp::Reset => {
            chip.reset();
            Ok(())
        }
    }
}

fn arg_value<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse `0x` hex or decimal (step-mode command operands).
fn parse_num(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

fn run_gui(args: &[String], chip: &mut SpiPwm, drv: &BusDriver, ops: &[ScriptOp], debug: bool) {
    // Replay the stimulus first so the window opens on a programmed chip.
    for op in ops {
        if let Err(e) = apply_op(chip, drv, op) {
            eprintln!("Script error: {}", e);
        }
    }

    let slowdown: u64 = arg_value(args, "--speed", 10).max(1);

    let mut window = Window::new(
        "spipwm Emulator v0.3.0",
        WAVE_WIDTH,
        WAVE_HEIGHT,
        WindowOptions {
            scale: Scale::X1,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )
    .expect("Failed to create window");
    window.set_target_fps(60);

    // Scrolling sample ring: one (primary, secondary) pair per column.
    let mut samples: std::collections::VecDeque<(u8, u8)> =
        std::collections::VecDeque::with_capacity(WAVE_WIDTH);
    let mut framebuf = vec![0u32; WAVE_WIDTH * WAVE_HEIGHT];

    let mut paused = false;
    let mut prev_key = [false; 8]; // D, A, P, O, X, R, T, Space
    let mut select_preset = 0usize;
    let mut aux_preset = 0usize;
    const SELECT_PRESETS: [u8; 5] = [0x01, 0x03, 0x0F, 0xFF, 0x00];
    const AUX_PRESETS: [u8; 4] = [0x00, 0xCC, 0xAA, 0xFF];

    let mut last_title = Instant::now();
    let start_time = Instant::now();
    let ticks_per_frame = CLOCK_HZ as u64 / 60 / slowdown;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        // Edge-detected keys.
        let keys = [
            window.is_key_down(Key::D),
            window.is_key_down(Key::A),
            window.is_key_down(Key::P),
            window.is_key_down(Key::O),
            window.is_key_down(Key::X),
            window.is_key_down(Key::R),
            window.is_key_down(Key::T),
            window.is_key_down(Key::Space),
        ];
        let pressed = |i: usize| keys[i] && !prev_key[i];

        let mut bus_op: Option<(u8, u8)> = None;
        if pressed(0) {
            bus_op = Some((0x04, chip.regs.duty_cycle.saturating_add(0x10)));
        }
        if pressed(1) {
            bus_op = Some((0x04, chip.regs.duty_cycle.saturating_sub(0x10)));
        }
        if pressed(2) {
            bus_op = Some((0x02, (!chip.regs.pwm_enable) as u8));
        }
        if pressed(3) {
            select_preset = (select_preset + 1) % SELECT_PRESETS.len();
            bus_op = Some((0x00, SELECT_PRESETS[select_preset]));
        }
        if pressed(4) {
            aux_preset = (aux_preset + 1) % AUX_PRESETS.len();
            bus_op = Some((0x01, AUX_PRESETS[aux_preset]));
        }
        if pressed(5) {
            chip.reset();
            if debug {
                eprintln!("--- reset at tick {} ---", chip.tick_count());
            }
        }
        if pressed(6) {
            eprintln!("--- Regs (tick {}) ---\n{}\n---", chip.tick_count(), chip.dump_regs());
        }
        if pressed(7) {
            paused = !paused;
        }
        prev_key = keys;

        if let Some((addr, val)) = bus_op {
            // Runs the chip for a few thousand ticks; the waveform resumes
            // sampling on the next frame.
            if let Err(e) = drv.write(chip, addr, val) {
                eprintln!("Bus error: {}", e);
            }
        }

        if !paused {
            for _ in 0..ticks_per_frame / SAMPLE_DIV {
                chip.run(SAMPLE_DIV);
                if samples.len() == WAVE_WIDTH {
                    samples.pop_front();
                }
                samples.push_back((chip.primary_out(), chip.secondary_out()));
            }
        }

        render_waveform(&samples, &mut framebuf);
        window
            .update_with_buffer(&framebuf, WAVE_WIDTH, WAVE_HEIGHT)
            .expect("update");

        if last_title.elapsed() >= Duration::from_millis(500) {
            let freq = chip.trace.primary[0].frequency(CLOCK_HZ);
            let duty = chip.trace.primary[0].duty();
            let mut mi = String::new();
            if let Some(f) = freq {
                mi.push_str(&format!(" bit0:{:.0}Hz", f));
            }
            if let Some(d) = duty {
                mi.push_str(&format!(" {:.0}%", d * 100.0));
            }
            let ps = if paused { " [PAUSE]" } else { "" };
            window.set_title(&format!(
                "spipwm v0.3.0 - sel=0x{:02X} aux=0x{:02X} pwm={} duty=0x{:02X}{}{}",
                chip.regs.output_select,
                chip.regs.aux_output,
                chip.regs.pwm_enable as u8,
                chip.regs.duty_cycle,
                mi,
                ps
            ));
            // Bound the edge buffers; measurements only need recent history.
            chip.trace.clear();
            last_title = Instant::now();
        }
    }

    if debug {
        let e = start_time.elapsed().as_secs_f64();
        println!("{} ticks in {:.1}s", chip.tick_count(), e);
    }
}

/// Draw the sample ring as 16 stacked traces (primary on top).
fn render_waveform(samples: &std::collections::VecDeque<(u8, u8)>, buf: &mut [u32]) {
    buf.fill(0x000000);

    // Row separators.
    for row in 0..16 {
        let y = row * ROW_HEIGHT + ROW_HEIGHT - 1;
        for x in 0..WAVE_WIDTH {
            buf[y * WAVE_WIDTH + x] = COLOR_GRID;
        }
    }

    let mut prev: Option<(u8, u8)> = None;
    for (x, &(pri, sec)) in samples.iter().enumerate() {
        for row in 0..16 {
            let (value, color) = if row < 8 {
                (pri, COLOR_PRIMARY)
            } else {
                (sec, COLOR_SECONDARY)
            };
            let bit = row % 8;
            let high = value & (1 << bit) != 0;
            let y_high = row * ROW_HEIGHT + 3;
            let y_low = row * ROW_HEIGHT + ROW_HEIGHT - 5;
            let y = if high { y_high } else { y_low };
            buf[y * WAVE_WIDTH + x] = color;

            // Vertical stroke on transitions.
            if let Some((ppri, psec)) = prev {
                let pval = if row < 8 { ppri } else { psec };
                if (pval ^ value) & (1 << bit) != 0 {
                    for yy in y_high..=y_low {
                        buf[yy * WAVE_WIDTH + x] = color;
                    }
                }
            }
        }
        prev = Some((pri, sec));
    }
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(
    args: &[String],
    chip: &mut SpiPwm,
    drv: &BusDriver,
    ops: &[ScriptOp],
    script_path: Option<&String>,
) {
    let extra_ticks: u64 = arg_value(args, "--ticks", 30_000);
    let show_trace = args.iter().any(|a| a == "--trace");
    let debug = args.iter().any(|a| a == "--debug");

    chip.frame_trace_enabled = true;

    for (i, op) in ops.iter().enumerate() {
        if let Err(e) = apply_op(chip, drv, op) {
            eprintln!("op {}: {}", i + 1, e);
            std::process::exit(1);
        }
        if debug {
            println!("  op {:3}: {:?}  primary=0x{:02X} secondary=0x{:02X}",
                i + 1, op, chip.primary_out(), chip.secondary_out());
        }
    }
    chip.run(extra_ticks);

    println!("=== {} ===", script_path.map(String::as_str).unwrap_or("demo sequence"));
    println!("{}", chip.dump_regs());

    if show_trace {
        println!("\n--- Decoded frames ---");
        for entry in &chip.frame_trace {
            println!("  {}", entry);
        }
    }

    // Measurements for every primary bit that toggled.
    let mut measured = false;
    for bit in 0..8 {
        let pin = &chip.trace.primary[bit];
        if let (Some(f), Some(d)) = (pin.frequency(CLOCK_HZ), pin.duty()) {
            println!("  bit {}: {:.1} Hz, {:.1}% high", bit, f, d * 100.0);
            measured = true;
        }
    }
    if !measured {
        println!("  no periodic activity on the primary bus");
    }

    println!();
    print_waveform(chip);
}

/// ASCII waveform snapshot: the last two PWM periods of every active pin.
fn print_waveform(chip: &SpiPwm) {
    const COLS: usize = 64;
    let t_end = chip.tick_count();
    let window_ticks = 2 * PERIOD_TICKS;
    let step = (window_ticks / COLS as u64).max(1);
    let t_start = t_end.saturating_sub(window_ticks);

    for (label, pins) in [("primary", &chip.trace.primary), ("secondary", &chip.trace.secondary)] {
        for (bit, pin) in pins.iter().enumerate() {
            // Skip pins that never moved and sit low.
            if pin.is_empty() && !pin.level {
                continue;
            }
            let mut line = String::with_capacity(COLS + 16);
            for c in 0..COLS {
                let t = t_start + c as u64 * step;
                line.push(if pin.level_at(t) { '█' } else { '▁' });
            }
            println!("  {}[{}] |{}|", label, bit, line);
        }
    }
}

// ─── Step Mode ──────────────────────────────────────────────────────────────

fn run_step_mode(chip: &mut SpiPwm, drv: &BusDriver) {
    println!("Step mode: Enter=tick, N<enter>=run N ticks, w/r ADDR VAL, a ADDR VAL BITS,");
    println!("           m BIT=measure, wave=waveform, d=dump, t=frame log,");
    println!("           save [f]/load [f], rewind, q=quit");
    println!("{}", chip.dump_regs());

    chip.frame_trace_enabled = true;
    let mut rewind = RewindBuffer::new(300, 10_000);
    let default_state = "bench.state".to_string();

    let stdin = std::io::stdin();
    loop {
        let mut line = String::new();
        print!("step> ");
        let _ = std::io::stdout().flush();
        if stdin.read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let cmd = fields.first().copied().unwrap_or("");

        let tick_before = chip.tick_count();
        match cmd {
            "q" | "quit" => break,
            "d" | "dump" => {
                println!("{}", chip.dump_regs());
                continue;
            }
            "t" | "trace" => {
                for entry in &chip.frame_trace {
                    println!("  {}", entry);
                }
                continue;
            }
            "wave" => {
                print_waveform(chip);
                continue;
            }
            "m" => {
                let bit = fields.get(1).and_then(|s| parse_num(s)).unwrap_or(0) as usize;
                if bit >= 8 {
                    println!("bit out of range: {}", bit);
                    continue;
                }
                let pin = &chip.trace.primary[bit];
                match (pin.frequency(CLOCK_HZ), pin.duty()) {
                    (Some(f), Some(d)) => {
                        println!("bit {}: {:.1} Hz, {:.1}% high", bit, f, d * 100.0)
                    }
                    _ => println!("bit {}: no complete period recorded", bit),
                }
                continue;
            }
            "w" | "r" => {
                let addr = fields.get(1).and_then(|s| parse_num(s));
                let val = fields.get(2).and_then(|s| parse_num(s));
                match (addr, val) {
                    (Some(a), Some(v)) if a <= 0x7F && v <= 0xFF => {
                        let res = if cmd == "w" {
                            drv.write(chip, a as u8, v as u8)
                        } else {
                            drv.read(chip, a as u8, v as u8)
                        };
                        if let Err(e) = res {
                            println!("{}", e);
                        }
                    }
                    _ => println!("usage: {} ADDR VAL (addr 0-0x7F, val 0-0xFF)", cmd),
                }
            }
            "a" => {
                let addr = fields.get(1).and_then(|s| parse_num(s));
                let val = fields.get(2).and_then(|s| parse_num(s));
                let bits = fields.get(3).and_then(|s| parse_num(s));
                match (addr, val, bits) {
                    (Some(a), Some(v), Some(b)) if a <= 0x7F && v <= 0xFF => {
                        if let Err(e) = drv.write_truncated(chip, a as u8, v as u8, b as u8) {
                            println!("{}", e);
                        }
                    }
                    _ => println!("usage: a ADDR VAL BITS"),
                }
            }
            "save" => {
                let path = fields.get(1).copied().unwrap_or(default_state.as_str());
                match savestate::save_to_file(&chip.save_state(), std::path::Path::new(path)) {
                    Ok(()) => println!("Saved: {}", path),
                    Err(e) => println!("Save failed: {}", e),
                }
                continue;
            }
            "load" => {
                let path = fields.get(1).copied().unwrap_or(default_state.as_str());
                match savestate::load_from_file(std::path::Path::new(path)) {
                    Ok(state) => {
                        chip.load_state(&state);
                        println!("Loaded: {}", path);
                        println!("{}", chip.dump_regs());
                    }
                    Err(e) => println!("Load failed: {}", e),
                }
                continue;
            }
            "rewind" => {
                match rewind.pop() {
                    Some(snap) => {
                        chip.restore_snapshot(&snap);
                        println!("Rewound to tick {}", snap.tick);
                        println!("{}", chip.dump_regs());
                    }
                    None => println!("No snapshots left"),
                }
                continue;
            }
            "" => chip.run(1),
            _ => match parse_num(cmd) {
                Some(n) => chip.run(n),
                None => {
                    println!("Unknown command: {}", cmd);
                    continue;
                }
            },
        }

        let elapsed = chip.tick_count() - tick_before;
        if elapsed > 0 && rewind.tick_elapsed(elapsed) {
            rewind.push(chip.save_snapshot());
        }
        println!("{}", chip.dump_regs());
    }
    println!("Total: {} ticks", chip.tick_count());
}
