//! The zone engine: one independent playback loop per zone, fed by
//! playlist updates and terminated by a permanent shutdown signal.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::template::{Template, Zone};

use super::{create_backend, PlaybackBackend};

/// How long a zone waits before re-checking an empty playlist.
const EMPTY_PLAYLIST_POLL: Duration = Duration::from_secs(2);

/// Backoff after the backend returns on its own, so a misconfigured
/// toolkit cannot crash-loop at full speed.
const SELF_EXIT_BACKOFF: Duration = Duration::from_millis(500);

/// Terminal result of one zone's playback loop.
#[derive(Debug)]
pub struct ZoneExit {
    pub zone_id: String,
    pub result: Result<()>,
}

/// Coordinates all zone players for a template.
pub struct Engine {
    zones: Vec<Arc<ZonePlayer>>,
}

impl Engine {
    /// Construct one zone player per template zone, initializing each
    /// backend with the zone's geometry. On any failure, every
    /// previously initialized backend is released before the error is
    /// returned.
    pub async fn new(template: &Template, screen_w: u32, screen_h: u32) -> Result<Self> {
        Self::with_backend_factory(template, screen_w, screen_h, |_| create_backend()).await
    }

    /// Like [`new`](Self::new) with an injectable backend factory.
    pub async fn with_backend_factory<F>(
        template: &Template,
        screen_w: u32,
        screen_h: u32,
        factory: F,
    ) -> Result<Self>
    where
        F: Fn(&Zone) -> Arc<dyn PlaybackBackend>,
    {
        let mut zones: Vec<Arc<ZonePlayer>> = Vec::with_capacity(template.zones.len());

        for zone in &template.zones {
            let backend = factory(zone);
            if let Err(e) = backend.init(zone, screen_w, screen_h).await {
                for zp in &zones {
                    zp.stop();
                    zp.backend.release();
                }
                return Err(e);
            }

            info!(
                "[engine] zone {:?} initialized ({}%x{}% at {}%,{}%)",
                zone.id, zone.width, zone.height, zone.x, zone.y
            );
            zones.push(Arc::new(ZonePlayer::new(zone.clone(), backend)));
        }

        info!("[engine] {} zone(s) ready", zones.len());
        Ok(Self { zones })
    }

    /// Route a new playlist snapshot to the matching zone.
    pub fn set_playlist(&self, zone_id: &str, files: Vec<PathBuf>) {
        match self.zones.iter().find(|zp| zp.zone.id == zone_id) {
            Some(zp) => zp.update_playlist(files),
            None => warn!("[engine] warning: zone {zone_id:?} not found"),
        }
    }

    /// Set the same playlist snapshot on every zone.
    pub fn set_playlist_all_zones(&self, files: Vec<PathBuf>) {
        for zp in &self.zones {
            zp.update_playlist(files.clone());
        }
    }

    /// Start every zone's loop concurrently. The returned receiver
    /// eventually yields one terminal [`ZoneExit`] per zone.
    pub fn play(&self) -> mpsc::Receiver<ZoneExit> {
        let (tx, rx) = mpsc::channel(self.zones.len().max(1));
        for zp in &self.zones {
            let zp = Arc::clone(zp);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = zp.run().await;
                let _ = tx
                    .send(ZoneExit {
                        zone_id: zp.zone.id.clone(),
                        result,
                    })
                    .await;
            });
        }
        rx
    }

    /// Signal permanent shutdown on every zone.
    pub fn stop(&self) {
        info!("[engine] stopping all zones...");
        for zp in &self.zones {
            zp.stop();
        }
    }

    /// Stop every zone and free all backend resources.
    pub fn release(&self) {
        for zp in &self.zones {
            zp.stop();
            zp.backend.release();
        }
        info!("[engine] all zones released");
    }

    /// Ordered list of zone identifiers.
    pub fn zones(&self) -> Vec<String> {
        self.zones.iter().map(|zp| zp.zone.id.clone()).collect()
    }
}

struct PlayerState {
    files: Vec<PathBuf>,
    running: bool,
}

/// A single zone's playback lifecycle: the current snapshot, a
/// permanent shutdown token, and an edge-triggered single-slot restart
/// signal. The lock is never held across a suspension point.
struct ZonePlayer {
    zone: Zone,
    backend: Arc<dyn PlaybackBackend>,
    state: Mutex<PlayerState>,
    shutdown: CancellationToken,
    restart_tx: mpsc::Sender<()>,
    restart_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl ZonePlayer {
    fn new(zone: Zone, backend: Arc<dyn PlaybackBackend>) -> Self {
        let (restart_tx, restart_rx) = mpsc::channel(1);
        Self {
            zone,
            backend,
            state: Mutex::new(PlayerState {
                files: Vec::new(),
                running: false,
            }),
            shutdown: CancellationToken::new(),
            restart_tx,
            restart_rx: Mutex::new(Some(restart_rx)),
        }
    }

    /// Replace the snapshot; if playback is in flight, unblock it and
    /// queue a restart. A restart already pending absorbs this one.
    fn update_playlist(&self, files: Vec<PathBuf>) {
        let count = files.len();
        let was_running = {
            let mut state = self.state.lock().unwrap();
            state.files = files;
            state.running
        };

        info!("[zone:{}] playlist updated: {count} files", self.zone.id);

        if was_running {
            self.backend.stop();
            let _ = self.restart_tx.try_send(());
        }
    }

    async fn run(&self) -> Result<()> {
        let Some(mut restart_rx) = self.restart_rx.lock().unwrap().take() else {
            warn!("[zone:{}] loop already started", self.zone.id);
            return Ok(());
        };

        loop {
            if self.shutdown.is_cancelled() {
                info!("[zone:{}] stopped", self.zone.id);
                return Ok(());
            }

            let files = self.state.lock().unwrap().files.clone();

            if files.is_empty() {
                info!("[zone:{}] no content, waiting...", self.zone.id);
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("[zone:{}] stopped", self.zone.id);
                        return Ok(());
                    }
                    _ = restart_rx.recv() => continue,
                    _ = tokio::time::sleep(EMPTY_PLAYLIST_POLL) => continue,
                }
            }

            self.state.lock().unwrap().running = true;
            info!(
                "[zone:{}] starting gapless playback ({} files)",
                self.zone.id,
                files.len()
            );

            // The single blocking point of the loop. The backend returns
            // when stopped (shutdown or restart) or when the toolkit
            // exits on its own.
            let result = self.backend.play_all(&files, self.shutdown.clone()).await;

            self.state.lock().unwrap().running = false;

            if let Err(e) = result {
                warn!("[zone:{}] playback error: {e}", self.zone.id);
            }

            // Was this a permanent stop or a playlist restart?
            if self.shutdown.is_cancelled() {
                info!("[zone:{}] stopped", self.zone.id);
                return Ok(());
            }
            if restart_rx.try_recv().is_ok() {
                info!("[zone:{}] restarting with updated playlist", self.zone.id);
                continue;
            }

            // Backend returned on its own (exit or error). Restart
            // after a short pause.
            tokio::time::sleep(SELF_EXIT_BACKOFF).await;
        }
    }

    /// Permanent stop. The shutdown token is cancelled before the
    /// backend is told to stop, so the loop classifies the wake as
    /// terminal rather than as a restart.
    fn stop(&self) {
        self.shutdown.cancel();
        self.backend.stop();
        self.state.lock().unwrap().running = false;
    }
}
