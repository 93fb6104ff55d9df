//! Controller Simulator
//!
//! Emits a scripted composter controller session as newline-delimited lines
//! on stdout, paced like the real controller. Useful for testing the bridge
//! without hardware.
//!
//! Usage: cargo run --bin controller-sim [interval_ms] | cargo run -- --serial -
//!
//! Narration goes to stderr so stdout carries only protocol lines.

use std::env;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let interval_ms: u64 = env::args()
        .nth(1)
        .unwrap_or_else(|| "1000".to_string())
        .parse()?;
    let interval = Duration::from_millis(interval_ms);

    eprintln!("🌱 Composter Controller Simulator");
    eprintln!("  Interval: {:?}", interval);
    eprintln!();

    let scenarios: Vec<(&str, String)> = vec![
        ("Shorten capture delay to 3s", "Delay:3".to_string()),
        ("Periodic sensor reading", reading(0)),
        ("Door opened, material added", "Loaded".to_string()),
        ("Door bounced (should reset timer)", "Unloaded".to_string()),
        ("Blower cycle", "Blower:".to_string()),
        ("Malformed reading (7 fields)", "Data:20,55,21,54,19,56,18".to_string()),
        ("Boot banner noise", "GIGA R1 ready".to_string()),
        ("Pump cycle", "Pump:".to_string()),
        ("Periodic sensor reading", reading(1)),
    ];

    let mut stdout = tokio::io::stdout();

    for (desc, line) in &scenarios {
        eprintln!("📟 {}", desc);
        eprintln!("   → {}", line);

        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\r\n").await?;
        stdout.flush().await?;

        sleep(interval).await;
    }

    // Leave room for the debounced capture to fire before the pipe closes
    eprintln!("⏳ Holding link open for capture...");
    sleep(Duration::from_secs(5)).await;

    eprintln!("✨ Simulation complete!");
    Ok(())
}

/// Sensor reading, probes top to bottom, then O2 % and fill %
fn reading(step: u32) -> String {
    let t = 20.0 + step as f64 * 1.5;
    format!(
        "Data:{:.1},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1}",
        t,
        55.0,
        t + 1.0,
        54.0,
        t - 1.0,
        56.0,
        18.0 - step as f64 * 0.5,
        75.0 + step as f64 * 2.0
    )
}
