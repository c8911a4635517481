//! Embedded backend linking libmpv directly, for kiosk targets where
//! playback renders straight to the display without a player process
//! per zone. Each zone owns a persistent player handle configured with
//! its pixel geometry at init; `play_all` replaces the loaded playlist
//! and blocks on the stop signals.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use libmpv::Mpv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{PlayerError, Result};
use crate::media::DEFAULT_IMAGE_DURATION_SECS;
use crate::template::Zone;

use super::PlaybackBackend;

/// Process-wide toolkit probe. The first failure is held here and
/// returned to every subsequent caller.
static TOOLKIT_PROBE: OnceLock<std::result::Result<(), String>> = OnceLock::new();

fn probe_toolkit() -> Result<()> {
    let probe = TOOLKIT_PROBE.get_or_init(|| match Mpv::new() {
        Ok(_) => Ok(()),
        Err(e) => Err(e.to_string()),
    });
    probe
        .clone()
        .map_err(PlayerError::ToolkitUnavailable)
}

pub struct EmbeddedBackend {
    inner: Mutex<Inner>,
}

struct Inner {
    handle: Option<Arc<Mpv>>,
    zone_id: String,
    // Per-play_all stop signal; replaced on each playback start.
    stop: CancellationToken,
}

impl EmbeddedBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                handle: None,
                zone_id: String::new(),
                stop: CancellationToken::new(),
            }),
        }
    }
}

impl Default for EmbeddedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackBackend for EmbeddedBackend {
    async fn init(&self, zone: &Zone, screen_w: u32, screen_h: u32) -> Result<()> {
        probe_toolkit()?;

        let mpv = Mpv::new().map_err(|e| PlayerError::ToolkitUnavailable(e.to_string()))?;

        let setup: Result<()> = (|| {
            set(&mpv, "loop-playlist", "inf")?;
            set(&mpv, "image-display-duration", DEFAULT_IMAGE_DURATION_SECS as i64)?;
            set(&mpv, "prefetch-playlist", true)?;
            set(&mpv, "gapless-audio", true)?;
            set(&mpv, "keep-open", "no")?;
            set(&mpv, "osc", false)?;
            set(&mpv, "osd-level", 0i64)?;
            set(&mpv, "border", false)?;
            set(&mpv, "input-default-bindings", false)?;
            set(&mpv, "input-vo-keyboard", false)?;
            set(&mpv, "cursor-autohide", "always")?;
            set(&mpv, "hwdec", "auto")?;

            if zone.is_full_screen() {
                set(&mpv, "fullscreen", true)?;
            } else {
                let (x, y, w, h) = zone.pixel_rect(screen_w, screen_h);
                set(&mpv, "geometry", format!("{w}x{h}+{x}+{y}").as_str())?;
                set(&mpv, "ontop", true)?;
            }
            Ok(())
        })();
        setup?;

        let mut inner = self.inner.lock().unwrap();
        inner.handle = Some(Arc::new(mpv));
        inner.zone_id = zone.id.clone();
        info!("[libmpv:{}] initialized (kiosk mode, HW decode)", zone.id);
        Ok(())
    }

    async fn play_all(&self, files: &[PathBuf], shutdown: CancellationToken) -> Result<()> {
        if files.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }

        let (mpv, zone_id, local_stop) = {
            let mut inner = self.inner.lock().unwrap();
            let mpv = inner
                .handle
                .clone()
                .ok_or(PlayerError::BackendNotInitialized)?;
            inner.stop = CancellationToken::new();
            (mpv, inner.zone_id.clone(), inner.stop.clone())
        };

        // Replace the loaded playlist. A file that fails to load is
        // skipped; the rest of the playlist proceeds.
        let mut loaded = 0usize;
        for file in files {
            let path = file.to_string_lossy();
            let mode = if loaded == 0 { "replace" } else { "append" };
            match mpv.command("loadfile", &[path.as_ref(), mode]) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("[libmpv:{zone_id}] skip {path}: {e}"),
            }
        }
        if loaded == 0 {
            return Err(PlayerError::Playback("no playable media in playlist".into()));
        }

        mpv.set_property("pause", false)
            .map_err(|e| PlayerError::Playback(format!("play failed: {e}")))?;

        info!("[libmpv:{zone_id}] starting gapless playback ({loaded} items)");

        // Block with no lock held until a stop signal arrives. The
        // handle keeps looping the list on its own.
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = mpv.command("stop", &[]);
                Ok(())
            }
            _ = local_stop.cancelled() => {
                let _ = mpv.command("stop", &[]);
                Ok(())
            }
        }
    }

    fn stop(&self) {
        let stop = self.inner.lock().unwrap().stop.clone();
        stop.cancel();
    }

    fn release(&self) {
        self.stop();
        let mut inner = self.inner.lock().unwrap();
        // Dropping the handle tears down the player once the loop's
        // clone is gone.
        inner.handle.take();
        info!("[libmpv:{}] released", inner.zone_id);
    }
}

fn set<T: libmpv::SetData>(mpv: &Mpv, name: &str, value: T) -> Result<()> {
    mpv.set_property(name, value)
        .map_err(|e| PlayerError::ToolkitUnavailable(format!("set {name} failed: {e}")))
}
