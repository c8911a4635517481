//! Zone-aware playback. Each zone runs an independent gapless playback
//! loop driven by a [`PlaybackBackend`]: either the mpv binary as a
//! subprocess (portable default) or an embedded libmpv handle (feature
//! `embedded`, for hardware-accelerated kiosk targets).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::template::Zone;

pub mod engine;
pub mod subprocess;

#[cfg(feature = "embedded")]
pub mod embedded;

pub use engine::{Engine, ZoneExit};

/// Platform-specific playback implementation for a single zone. Each
/// zone gets its own backend instance.
///
/// `play_all` must respond to `stop()` without deadlocking: backends
/// must not hold a lock while blocked.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// One-time preparation for this zone. Pixel geometry is derived
    /// from the zone's percent rectangle and the screen size. Fails if
    /// the media toolkit is not available.
    async fn init(&self, zone: &Zone, screen_w: u32, screen_h: u32) -> Result<()>;

    /// Play the given ordered list, looping indefinitely with gapless
    /// transitions, until `stop()` is called, `shutdown` becomes
    /// observable, or the toolkit fails unrecoverably. Only the last
    /// case returns an error.
    async fn play_all(&self, files: &[PathBuf], shutdown: CancellationToken) -> Result<()>;

    /// Signal the current `play_all` to return. Idempotent,
    /// non-blocking, safe to call from any task and when not playing.
    fn stop(&self);

    /// Free all backend resources. Implies `stop()`. Idempotent.
    fn release(&self);
}

/// Create the backend implementation for this build.
pub fn create_backend() -> Arc<dyn PlaybackBackend> {
    #[cfg(feature = "embedded")]
    {
        Arc::new(embedded::EmbeddedBackend::new())
    }

    #[cfg(not(feature = "embedded"))]
    {
        Arc::new(subprocess::SubprocessBackend::new())
    }
}
