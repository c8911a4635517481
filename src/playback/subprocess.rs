//! Portable backend driving the mpv binary as a child process. mpv's
//! built-in playlist gives gapless transitions between videos and
//! images, and its geometry flags place the window without a window
//! manager tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::media::{self, MediaKind, DEFAULT_IMAGE_DURATION_SECS};
use crate::template::Zone;

use super::PlaybackBackend;

#[cfg(windows)]
const PLAYER_BINARY: &str = "mpv.exe";
#[cfg(not(windows))]
const PLAYER_BINARY: &str = "mpv";

pub struct SubprocessBackend {
    inner: Mutex<Inner>,
}

struct Inner {
    player_path: Option<PathBuf>,
    zone: Option<Zone>,
    screen_w: u32,
    screen_h: u32,
    // Per-play_all stop signal; replaced on each playback start.
    stop: CancellationToken,
}

impl SubprocessBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                player_path: None,
                zone: None,
                screen_w: 0,
                screen_h: 0,
                stop: CancellationToken::new(),
            }),
        }
    }
}

impl Default for SubprocessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackBackend for SubprocessBackend {
    async fn init(&self, zone: &Zone, screen_w: u32, screen_h: u32) -> Result<()> {
        let path = find_player()?;
        info!(
            "[mpv:{}] using {} (screen {}x{}, fullzone={})",
            zone.id,
            path.display(),
            screen_w,
            screen_h,
            zone.is_full_screen()
        );

        let mut inner = self.inner.lock().unwrap();
        inner.player_path = Some(path);
        inner.zone = Some(zone.clone());
        inner.screen_w = screen_w;
        inner.screen_h = screen_h;
        Ok(())
    }

    async fn play_all(&self, files: &[PathBuf], shutdown: CancellationToken) -> Result<()> {
        if files.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }

        let (player_path, args, zone_id, local_stop) = {
            let mut inner = self.inner.lock().unwrap();
            let player_path = inner
                .player_path
                .clone()
                .ok_or(PlayerError::BackendNotInitialized)?;
            let zone = inner.zone.clone().ok_or(PlayerError::BackendNotInitialized)?;
            inner.stop = CancellationToken::new();
            let args = build_args(&zone, inner.screen_w, inner.screen_h, files);
            (player_path, args, zone.id, inner.stop.clone())
        };

        let (videos, images) = count_media(files);
        info!("[mpv:{zone_id}] playing {videos} videos + {images} images (looped)");

        let mut child = Command::new(&player_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::Playback(format!("mpv start failed: {e}")))?;

        // Race the child's exit against both stop signals. The borrow
        // of the child ends with the select expression, so the
        // cancellation path can kill and drain it afterwards.
        let exit = tokio::select! {
            _ = shutdown.cancelled() => None,
            _ = local_stop.cancelled() => None,
            status = child.wait() => Some(status),
        };

        match exit {
            None => {
                debug!("[mpv:{zone_id}] stop signal, terminating player");
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(())
            }
            Some(Ok(status)) => {
                if !status.success() {
                    warn!("[mpv:{zone_id}] player exited with {status}");
                }
                Ok(())
            }
            Some(Err(e)) => Err(PlayerError::Playback(format!("wait on mpv failed: {e}"))),
        }
    }

    fn stop(&self) {
        let stop = self.inner.lock().unwrap().stop.clone();
        stop.cancel();
    }

    fn release(&self) {
        self.stop();
        let zone_id = self
            .inner
            .lock()
            .unwrap()
            .zone
            .as_ref()
            .map(|z| z.id.clone())
            .unwrap_or_default();
        info!("[mpv:{zone_id}] released");
    }
}

/// Build the mpv argument list: kiosk presentation, looped playlist,
/// image durations, and either fullscreen or a pixel-placed window.
fn build_args(zone: &Zone, screen_w: u32, screen_h: u32, files: &[PathBuf]) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--loop-playlist=inf".into(),
        format!("--image-display-duration={DEFAULT_IMAGE_DURATION_SECS}"),
        // Gapless transitions: open the next entry before the current one ends.
        "--prefetch-playlist=yes".into(),
        "--gapless-audio=yes".into(),
        "--keep-open=no".into(),
        // No UI chrome, no input handling.
        "--no-osc".into(),
        "--no-osd-bar".into(),
        "--osd-level=0".into(),
        "--no-border".into(),
        "--cursor-autohide=always".into(),
        "--no-input-default-bindings".into(),
        "--no-input-terminal".into(),
        "--hwdec=auto".into(),
        "--really-quiet".into(),
    ];

    if zone.is_full_screen() {
        args.push("--fullscreen".into());
    } else {
        let (x, y, w, h) = zone.pixel_rect(screen_w, screen_h);
        args.push(format!("--geometry={w}x{h}+{x}+{y}"));
        args.push("--ontop".into());
    }

    args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
    args
}

fn count_media(files: &[PathBuf]) -> (usize, usize) {
    let mut videos = 0;
    let mut images = 0;
    for f in files {
        match media::classify(f) {
            MediaKind::Video => videos += 1,
            MediaKind::Image => images += 1,
            MediaKind::Unsupported => {}
        }
    }
    (videos, images)
}

/// Locate the mpv executable: PATH first, then per-OS install locations.
fn find_player() -> Result<PathBuf> {
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(PLAYER_BINARY);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    let candidates: &[&str] = if cfg!(windows) {
        &[
            r"C:\Program Files\mpv\mpv.exe",
            r"C:\Program Files (x86)\mpv\mpv.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/opt/homebrew/bin/mpv", "/usr/local/bin/mpv"]
    } else {
        &["/usr/bin/mpv", "/usr/local/bin/mpv", "/snap/bin/mpv"]
    };

    for candidate in candidates {
        if Path::new(candidate).is_file() {
            return Ok(PathBuf::from(candidate));
        }
    }

    Err(PlayerError::ToolkitUnavailable(
        "mpv not found: install from https://mpv.io".into(),
    ))
}
