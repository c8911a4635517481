//! OS-level utilities: disk and thermal probes, throttle detection,
//! and general health checks for kiosk hardware.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{PlayerError, Result};

/// A point-in-time system health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub disk_used_pct: f64,
    pub disk_free_bytes: u64,
    pub cpu_temp_c: f64,
    pub throttled: bool,
    pub timestamp: DateTime<Utc>,
}

/// Read the thermal zone and return the CPU temperature in Celsius.
pub async fn cpu_temp() -> Result<f64> {
    let raw = tokio::fs::read_to_string("/sys/class/thermal/thermal_zone0/temp").await?;
    let milli: f64 = raw
        .trim()
        .parse()
        .map_err(|e| PlayerError::Health(format!("parse cpu temp: {e}")))?;
    Ok(milli / 1000.0)
}

/// Usage percentage and free bytes for the filesystem mounted at the
/// given path.
pub async fn disk_usage(path: &str) -> Result<(f64, u64)> {
    let path = if path.is_empty() { "/" } else { path };
    let out = Command::new("df")
        .args(["--output=pcent,avail", "-B1", path])
        .output()
        .await?;
    if !out.status.success() {
        return Err(PlayerError::Health(format!("df exited with {}", out.status)));
    }
    parse_df_output(&String::from_utf8_lossy(&out.stdout))
}

fn parse_df_output(text: &str) -> Result<(f64, u64)> {
    let line = text
        .lines()
        .nth(1)
        .ok_or_else(|| PlayerError::Health("unexpected df output".into()))?;
    let mut fields = line.split_whitespace();

    let pct = fields
        .next()
        .and_then(|f| f.trim_end_matches('%').parse::<f64>().ok())
        .ok_or_else(|| PlayerError::Health("parse disk pct".into()))?;
    let free = fields
        .next()
        .and_then(|f| f.parse::<u64>().ok())
        .ok_or_else(|| PlayerError::Health("parse disk free".into()))?;

    Ok((pct, free))
}

/// Check `vcgencmd` to see whether the CPU is being throttled for
/// thermal or power-supply reasons.
pub async fn is_throttled() -> Result<bool> {
    let out = Command::new("vcgencmd").arg("get_throttled").output().await?;
    if !out.status.success() {
        return Err(PlayerError::Health(format!(
            "vcgencmd exited with {}",
            out.status
        )));
    }
    parse_throttled(&String::from_utf8_lossy(&out.stdout))
}

fn parse_throttled(text: &str) -> Result<bool> {
    // Output format: throttled=0x0
    let value = text
        .trim()
        .split('=')
        .nth(1)
        .ok_or_else(|| PlayerError::Health("unexpected vcgencmd output".into()))?;
    let value = u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| PlayerError::Health(format!("parse throttle value: {e}")))?;
    Ok(value != 0)
}

/// Take a full health snapshot. Each probe fails soft: an error is
/// logged and the field keeps its default.
pub async fn run_health_check() -> HealthStatus {
    let mut status = HealthStatus {
        disk_used_pct: 0.0,
        disk_free_bytes: 0,
        cpu_temp_c: 0.0,
        throttled: false,
        timestamp: Utc::now(),
    };

    match cpu_temp().await {
        Ok(temp) => status.cpu_temp_c = temp,
        Err(e) => warn!("[system] health: temp read error: {e}"),
    }

    match disk_usage("/").await {
        Ok((pct, free)) => {
            status.disk_used_pct = pct;
            status.disk_free_bytes = free;
        }
        Err(e) => warn!("[system] health: disk read error: {e}"),
    }

    match is_throttled().await {
        Ok(throttled) => status.throttled = throttled,
        Err(e) => warn!("[system] health: throttle check error: {e}"),
    }

    info!(
        "[system] health: temp={:.1}°C disk={:.1}% throttled={}",
        status.cpu_temp_c, status.disk_used_pct, status.throttled
    );

    status
}

/// Create a directory and all parents if it does not exist.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_df_output() {
        let text = "Use% Avail\n 42% 123456789\n";
        let (pct, free) = parse_df_output(text).unwrap();
        assert_eq!(pct, 42.0);
        assert_eq!(free, 123456789);
    }

    #[test]
    fn rejects_short_df_output() {
        assert!(parse_df_output("Use% Avail\n").is_err());
    }

    #[test]
    fn parses_throttle_flags() {
        assert!(!parse_throttled("throttled=0x0\n").unwrap());
        assert!(parse_throttled("throttled=0x50005\n").unwrap());
        assert!(parse_throttled("garbage").is_err());
    }

    #[test]
    fn ensure_dir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Idempotent on an existing directory.
        ensure_dir(&nested).unwrap();
    }
}
