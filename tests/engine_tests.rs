//! Zone engine tests against a mock backend: playback exclusivity,
//! restart routing, shutdown ordering, and release behavior.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use zonecast::error::{PlayerError, Result};
use zonecast::playback::{Engine, PlaybackBackend};
use zonecast::template::{Template, Zone};

/// Backend that records playback calls and blocks until stopped, the
/// way a looping player would.
#[derive(Default)]
struct MockBackend {
    plays: Mutex<Vec<Vec<PathBuf>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stop_token: Mutex<CancellationToken>,
    released: AtomicBool,
}

impl MockBackend {
    fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    fn play(&self, index: usize) -> Vec<PathBuf> {
        self.plays.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl PlaybackBackend for MockBackend {
    async fn init(&self, _zone: &Zone, _screen_w: u32, _screen_h: u32) -> Result<()> {
        Ok(())
    }

    async fn play_all(&self, files: &[PathBuf], shutdown: CancellationToken) -> Result<()> {
        let local = {
            let mut guard = self.stop_token.lock().unwrap();
            *guard = CancellationToken::new();
            guard.clone()
        };
        self.plays.lock().unwrap().push(files.to_vec());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = local.cancelled() => {}
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_token.lock().unwrap().clone().cancel();
    }

    fn release(&self) {
        self.stop();
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Backend whose init always fails, for construction-rollback tests.
struct BrokenBackend;

#[async_trait]
impl PlaybackBackend for BrokenBackend {
    async fn init(&self, _zone: &Zone, _screen_w: u32, _screen_h: u32) -> Result<()> {
        Err(PlayerError::ToolkitUnavailable("no player on this host".into()))
    }

    async fn play_all(&self, _files: &[PathBuf], _shutdown: CancellationToken) -> Result<()> {
        Err(PlayerError::BackendNotInitialized)
    }

    fn stop(&self) {}

    fn release(&self) {}
}

async fn wait_until(what: &str, deadline: Duration, mut cond: impl FnMut() -> bool) {
    let waited = timeout(deadline, async {
        loop {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

/// One mock per zone, keyed by zone id.
async fn engine_with_mocks(template: &Template) -> (Engine, HashMap<String, Arc<MockBackend>>) {
    let mocks: HashMap<String, Arc<MockBackend>> = template
        .zones
        .iter()
        .map(|z| (z.id.clone(), Arc::new(MockBackend::default())))
        .collect();

    let factory_mocks = mocks.clone();
    let engine = Engine::with_backend_factory(template, 1920, 1080, move |zone| {
        Arc::clone(&factory_mocks[&zone.id]) as Arc<dyn PlaybackBackend>
    })
    .await
    .unwrap();

    (engine, mocks)
}

#[tokio::test]
async fn zones_are_listed_in_template_order() {
    let template = Template::l_shape("/playlists/m", "/playlists/f", "/playlists/s");
    let (engine, _mocks) = engine_with_mocks(&template).await;

    assert_eq!(engine.zones(), vec!["main", "sidebar", "footer"]);
    engine.release();
}

#[tokio::test]
async fn unknown_zone_routing_is_a_noop() {
    let template = Template::fullscreen("/playlists/main");
    let (engine, mocks) = engine_with_mocks(&template).await;

    engine.set_playlist("ghost", paths(&["a.mp4"]));
    assert_eq!(mocks["main"].play_count(), 0);
    engine.release();
}

#[tokio::test]
async fn playlist_update_restarts_with_new_snapshot() {
    let template = Template::fullscreen("/playlists/main");
    let (engine, mocks) = engine_with_mocks(&template).await;
    let mock = Arc::clone(&mocks["main"]);

    engine.set_playlist("main", paths(&["/media/a.mp4"]));
    let mut exits = engine.play();

    wait_until("first playback", Duration::from_secs(2), || {
        mock.play_count() == 1
    })
    .await;

    engine.set_playlist("main", paths(&["/media/a.mp4", "/media/b.png"]));

    wait_until("restarted playback", Duration::from_secs(2), || {
        mock.play_count() == 2
    })
    .await;

    assert_eq!(mock.play(0), paths(&["/media/a.mp4"]));
    assert_eq!(mock.play(1), paths(&["/media/a.mp4", "/media/b.png"]));
    assert_eq!(
        mock.max_active.load(Ordering::SeqCst),
        1,
        "zone ran two playbacks at once"
    );

    engine.stop();
    let exit = timeout(Duration::from_secs(2), exits.recv())
        .await
        .expect("zone did not terminate after stop")
        .expect("exit channel closed");
    assert_eq!(exit.zone_id, "main");
    assert!(exit.result.is_ok());

    engine.release();
    assert!(mock.released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stop_terminates_all_zones_promptly() {
    let template = Template::main_with_footer("/playlists/m", "/playlists/f");
    let (engine, _mocks) = engine_with_mocks(&template).await;

    engine.set_playlist_all_zones(paths(&["/media/loop.mp4"]));
    let mut exits = engine.play();

    engine.stop();
    // Idempotent: a second stop changes nothing.
    engine.stop();

    let mut exited = Vec::new();
    for _ in 0..2 {
        let exit = timeout(Duration::from_secs(2), exits.recv())
            .await
            .expect("zone did not terminate after stop")
            .expect("exit channel closed");
        assert!(exit.result.is_ok());
        exited.push(exit.zone_id);
    }
    exited.sort();
    assert_eq!(exited, vec!["footer", "main"]);

    engine.release();
}

#[tokio::test]
async fn empty_playlist_waits_without_playing() {
    let template = Template::fullscreen("/playlists/main");
    let (engine, mocks) = engine_with_mocks(&template).await;
    let mock = Arc::clone(&mocks["main"]);

    let mut exits = engine.play();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.play_count(), 0, "zone played an empty playlist");

    // Content appearing while idle is picked up by the waiting loop.
    engine.set_playlist("main", paths(&["/media/late.mp4"]));
    wait_until("playback after content appeared", Duration::from_secs(4), || {
        mock.play_count() == 1
    })
    .await;

    engine.stop();
    let exit = timeout(Duration::from_secs(2), exits.recv())
        .await
        .expect("zone did not terminate after stop")
        .expect("exit channel closed");
    assert!(exit.result.is_ok());
    engine.release();
}

#[tokio::test]
async fn update_on_one_zone_leaves_siblings_playing() {
    let template = Template::main_with_footer("/playlists/m", "/playlists/f");
    let (engine, mocks) = engine_with_mocks(&template).await;
    let main = Arc::clone(&mocks["main"]);
    let footer = Arc::clone(&mocks["footer"]);

    engine.set_playlist("main", paths(&["/media/m.mp4"]));
    engine.set_playlist("footer", paths(&["/media/f.mp4"]));
    let _exits = engine.play();

    wait_until("both zones playing", Duration::from_secs(2), || {
        main.play_count() == 1 && footer.play_count() == 1
    })
    .await;

    engine.set_playlist("footer", paths(&["/media/f.mp4", "/media/g.png"]));

    wait_until("footer restart", Duration::from_secs(2), || {
        footer.play_count() == 2
    })
    .await;
    assert_eq!(main.play_count(), 1, "sibling zone was disturbed");

    engine.stop();
    engine.release();
}

#[tokio::test]
async fn failed_construction_releases_earlier_backends() {
    let template = Template::main_with_footer("/playlists/m", "/playlists/f");
    let first = Arc::new(MockBackend::default());

    let first_for_factory = Arc::clone(&first);
    let result = Engine::with_backend_factory(&template, 1920, 1080, move |zone| {
        if zone.id == "main" {
            Arc::clone(&first_for_factory) as Arc<dyn PlaybackBackend>
        } else {
            Arc::new(BrokenBackend) as Arc<dyn PlaybackBackend>
        }
    })
    .await;

    assert!(result.is_err());
    assert!(
        first.released.load(Ordering::SeqCst),
        "previously initialized backend was not released"
    );
}
