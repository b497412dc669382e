//! Build script for kinescope-firmware
//!
//! - Sets up linker search paths and scripts for memory.x
//! - Validates display.toml at compile time
//! - Generates the display constants the firmware is built with

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest panel side the RP2040 framebuffer budget allows
const MAX_PANEL_SIDE: i64 = 320;

fn main() {
    setup_linker();
    let config = load_config();
    validate_config(&config);
    generate_constants(&config);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Read and parse display.toml
fn load_config() -> toml::Value {
    println!("cargo:rerun-if-changed=display.toml");

    let config_path = Path::new("display.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: display.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a display.toml configuration file.        ║\n\
            ║  Please create one in the kinescope-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read display.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in display.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    }
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate display.toml contents, reporting every problem at once
fn validate_config(config: &toml::Value) {
    let mut errors = Vec::new();

    for section in ["panel", "render", "producer"] {
        if !matches!(config.get(section), Some(toml::Value::Table(_))) {
            errors.push(format!("Missing [{}] section", section));
        }
    }

    for key in ["width", "height"] {
        match int(config, "panel", key) {
            Some(v) if (1..=MAX_PANEL_SIDE).contains(&v) => {}
            Some(_) => errors.push(format!("[panel] {} must be 1-{}", key, MAX_PANEL_SIDE)),
            None => errors.push(format!("[panel] missing '{}'", key)),
        }
    }

    for key in ["col_offset", "row_offset"] {
        match int(config, "panel", key) {
            Some(v) if (0..=u16::MAX as i64).contains(&v) => {}
            Some(_) => errors.push(format!("[panel] {} must fit in 16 bits", key)),
            None => errors.push(format!("[panel] missing '{}'", key)),
        }
    }

    match int(config, "panel", "spi_frequency_hz") {
        Some(v) if (1..=62_500_000).contains(&v) => {}
        Some(_) => errors.push("[panel] spi_frequency_hz must be 1-62500000".into()),
        None => errors.push("[panel] missing 'spi_frequency_hz'".into()),
    }

    for key in ["completion_timeout_ms", "lock_timeout_ms"] {
        if let Some(v) = int(config, "render", key) {
            if !(1..=u32::MAX as i64).contains(&v) {
                errors.push(format!("[render] {} must be positive", key));
            }
        }
    }

    // Bring-up is never timed; a frame only needs its own transfer time
    if let (Some(timeout), Some(width), Some(height), Some(hz)) = (
        int(config, "render", "completion_timeout_ms"),
        int(config, "panel", "width"),
        int(config, "panel", "height"),
        int(config, "panel", "spi_frequency_hz"),
    ) {
        let transfer_ms = frame_transfer_ms(width, height, hz);
        if hz > 0 && timeout <= transfer_ms {
            errors.push(format!(
                "[render] completion_timeout_ms must exceed {} ms frame transfer",
                transfer_ms
            ));
        }
    }

    if let Some(policy) = config.get("render").and_then(|r| r.get("completion")) {
        if !matches!(policy.as_str(), Some("any_event") | Some("frame_completed")) {
            errors.push("[render] completion must be 'any_event' or 'frame_completed'".into());
        }
    }

    for (key, dim) in [("origin_x", "width"), ("origin_y", "height")] {
        let origin = int(config, "render", key).unwrap_or(0);
        let limit = int(config, "panel", dim).unwrap_or(0);
        if origin < 0 || (limit > 0 && origin >= limit) {
            errors.push(format!("[render] {} must be inside the panel {}", key, dim));
        }
    }

    match int(config, "producer", "frame_interval_ms") {
        Some(v) if v > 0 => {}
        Some(_) => errors.push("[producer] frame_interval_ms must be positive".into()),
        None => errors.push("[producer] missing 'frame_interval_ms'".into()),
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid display configuration                            ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=display.toml validated successfully");
}

/// Write display_config.rs into OUT_DIR
fn generate_constants(config: &toml::Value) {
    let mut render = String::from("RenderConfig::new()");
    if let Some(ms) = int(config, "render", "completion_timeout_ms") {
        render.push_str(&format!("\n    .with_completion_timeout_ms({})", ms));
    }
    if let Some(ms) = int(config, "render", "lock_timeout_ms") {
        render.push_str(&format!("\n    .with_lock_timeout_ms({})", ms));
    }
    let policy = match config
        .get("render")
        .and_then(|r| r.get("completion"))
        .and_then(|p| p.as_str())
    {
        Some("frame_completed") => "FrameCompleted",
        _ => "AnyEvent",
    };
    render.push_str(&format!(
        "\n    .with_completion_policy(CompletionPolicy::{})",
        policy
    ));
    render.push_str(&format!(
        "\n    .with_origin({}, {})",
        int(config, "render", "origin_x").unwrap_or(0),
        int(config, "render", "origin_y").unwrap_or(0)
    ));

    let generated = format!(
        "// Generated from display.toml by build.rs\n\
         \n\
         /// Panel width in pixels\n\
         pub const PANEL_WIDTH: usize = {width};\n\
         /// Panel height in pixels\n\
         pub const PANEL_HEIGHT: usize = {height};\n\
         /// First visible column in controller RAM\n\
         pub const PANEL_COL_OFFSET: u16 = {col};\n\
         /// First visible row in controller RAM\n\
         pub const PANEL_ROW_OFFSET: u16 = {row};\n\
         /// SPI clock\n\
         pub const SPI_FREQUENCY_HZ: u32 = {spi};\n\
         /// Demo scene period\n\
         pub const FRAME_INTERVAL_MS: u64 = {interval};\n\
         /// Render sequencer configuration\n\
         pub const RENDER_CONFIG: RenderConfig = {render};\n",
        width = int(config, "panel", "width").unwrap_or(0),
        height = int(config, "panel", "height").unwrap_or(0),
        col = int(config, "panel", "col_offset").unwrap_or(0),
        row = int(config, "panel", "row_offset").unwrap_or(0),
        spi = int(config, "panel", "spi_frequency_hz").unwrap_or(0),
        interval = int(config, "producer", "frame_interval_ms").unwrap_or(0),
        render = render,
    );

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("display_config.rs"), generated).unwrap();
}

/// Time to clock one full RGB565 frame out at `hz`, rounded up
fn frame_transfer_ms(width: i64, height: i64, hz: i64) -> i64 {
    if hz <= 0 {
        return 0;
    }
    let bits = width * height * 16;
    (bits * 1000 + hz - 1) / hz
}

/// Look up an integer in `[section] key`
fn int(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}
