//! Remote telemetry: a periodic heartbeat POSTed to the fleet
//! management endpoint, identifying this player via a provisioned
//! config file. A missing config leaves the player in "unregistered"
//! mode; it keeps running and never sends.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

const DEFAULT_INTERVAL_SECS: u64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Player identity as provisioned by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub heartbeat_interval_sec: u64,
}

impl HeartbeatConfig {
    fn interval_secs(&self) -> u64 {
        if self.heartbeat_interval_sec == 0 {
            DEFAULT_INTERVAL_SECS
        } else {
            self.heartbeat_interval_sec
        }
    }
}

/// Payload sent to the remote server on each tick.
#[derive(Debug, Serialize)]
struct Heartbeat<'a> {
    id: &'a str,
    key: &'a str,
    timestamp: String,
    uptime_sec: f64,
    version: &'a str,
    arch: &'static str,
    os: &'static str,
}

pub struct HeartbeatClient {
    config: Option<HeartbeatConfig>,
    version: String,
    started_at: Instant,
    http: reqwest::Client,
    stop: CancellationToken,
}

impl HeartbeatClient {
    /// Create a client from the identity file at the given path. A
    /// missing or unparseable file logs a warning and produces an
    /// unregistered client.
    pub fn new(config_path: &Path, version: impl Into<String>) -> Self {
        let config = match load_config(config_path) {
            Ok(cfg) => {
                info!(
                    "[heartbeat] loaded config: id={} endpoint={} interval={}s",
                    cfg.id,
                    cfg.endpoint,
                    cfg.interval_secs()
                );
                Some(cfg)
            }
            Err(e) => {
                warn!("[heartbeat] config load warning: {e} (running unregistered)");
                None
            }
        };

        Self {
            config,
            version: version.into(),
            started_at: Instant::now(),
            http: reqwest::Client::new(),
            stop: CancellationToken::new(),
        }
    }

    /// Run the heartbeat loop until [`stop`](Self::stop) is called. The
    /// first heartbeat is sent immediately.
    pub async fn run(&self) {
        let interval_secs = self
            .config
            .as_ref()
            .map(HeartbeatConfig::interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        info!("[heartbeat] started (every {interval_secs}s)");

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    info!("[heartbeat] stopped");
                    return;
                }
                _ = ticker.tick() => self.send_heartbeat().await,
            }
        }
    }

    async fn send_heartbeat(&self) {
        let Some(cfg) = &self.config else {
            debug!("[heartbeat] skipped: not configured");
            return;
        };
        if cfg.endpoint.is_empty() || cfg.id.is_empty() {
            debug!("[heartbeat] skipped: missing endpoint or id");
            return;
        }

        let hb = Heartbeat {
            id: &cfg.id,
            key: &cfg.key,
            timestamp: Utc::now().to_rfc3339(),
            uptime_sec: self.started_at.elapsed().as_secs_f64(),
            version: &self.version,
            arch: std::env::consts::ARCH,
            os: std::env::consts::OS,
        };

        let url = format!("{}/heartbeat", cfg.endpoint);
        match self
            .http
            .post(&url)
            .json(&hb)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!("[heartbeat] sent OK ({})", resp.status());
            }
            Ok(resp) => warn!("[heartbeat] response: {}", resp.status()),
            Err(e) => warn!("[heartbeat] POST failed: {e}"),
        }
    }

    /// Halt the heartbeat loop. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn config(&self) -> Option<&HeartbeatConfig> {
        self.config.as_ref()
    }
}

fn load_config(path: &Path) -> Result<HeartbeatConfig> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
