use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use zonecast::heartbeat::HeartbeatClient;
use zonecast::playback::Engine;
use zonecast::playlist::PlaylistWatcher;
use zonecast::system;
use zonecast::template::Template;

#[derive(Parser)]
#[command(
    name = "zonecast",
    version,
    about = "Multi-zone digital signage playback controller"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the playback engine
    Run {
        /// Path to the media playlist directory
        #[arg(short, long)]
        playlist: Option<PathBuf>,

        /// Path to the identity config file for heartbeats
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to a template JSON file (default: fullscreen)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Screen width in pixels (for zone positioning)
        #[arg(long, default_value_t = 1920)]
        screen_width: u32,

        /// Screen height in pixels (for zone positioning)
        #[arg(long, default_value_t = 1080)]
        screen_height: u32,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },
    /// Run a system health check
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            playlist,
            config,
            template,
            screen_width,
            screen_height,
            debug,
        } => {
            run(
                playlist.unwrap_or_else(default_playlist_dir),
                config.unwrap_or_else(default_config_path),
                template,
                screen_width,
                screen_height,
                debug,
            )
            .await
        }
        Commands::Check => check().await,
    }
}

async fn run(
    playlist_dir: PathBuf,
    config_path: PathBuf,
    template_path: Option<PathBuf>,
    screen_w: u32,
    screen_h: u32,
    debug: bool,
) -> anyhow::Result<()> {
    zonecast::logging::init(debug)?;
    info!("zonecast {}", env!("CARGO_PKG_VERSION"));

    let template = match &template_path {
        Some(path) => {
            let template = Template::load_from_file(path).context("template load")?;
            info!(
                "[main] loaded template {:?} with {} zone(s)",
                template.name,
                template.zones.len()
            );
            template
        }
        None => {
            info!("[main] using default fullscreen template");
            Template::fullscreen(&playlist_dir)
        }
    };

    for zone in &template.zones {
        system::ensure_dir(&zone.playlist_dir)
            .with_context(|| format!("playlist dir {}", zone.playlist_dir.display()))?;
    }

    let engine = Arc::new(
        Engine::new(&template, screen_w, screen_h)
            .await
            .context("engine init")?,
    );

    // One playlist watcher per zone; changes are routed straight into
    // the engine.
    let mut watchers = Vec::with_capacity(template.zones.len());
    for zone in &template.zones {
        let zone_id = zone.id.clone();
        let engine_cb = Arc::clone(&engine);
        let watcher = PlaylistWatcher::new(
            &zone.playlist_dir,
            Some(Box::new(move |files| {
                info!(
                    "[main] zone {zone_id:?} playlist changed: {} files",
                    files.len()
                );
                engine_cb.set_playlist(&zone_id, files);
            })),
        )
        .with_context(|| format!("watcher init for zone {}", zone.id))?;

        engine.set_playlist(&zone.id, watcher.files());
        watcher.start()?;
        watchers.push(watcher);
    }

    let heartbeat = Arc::new(HeartbeatClient::new(
        &config_path,
        env!("CARGO_PKG_VERSION"),
    ));
    {
        let heartbeat = Arc::clone(&heartbeat);
        tokio::spawn(async move { heartbeat.run().await });
    }

    let mut exits = engine.play();

    tokio::select! {
        _ = shutdown_signal() => {
            info!("[main] received shutdown signal, shutting down");
            engine.stop();
        }
        exit = exits.recv() => {
            if let Some(exit) = exit {
                match exit.result {
                    Ok(()) => info!("[main] zone {} exited", exit.zone_id),
                    Err(e) => error!("[main] zone {} error: {e}", exit.zone_id),
                }
            }
        }
    }

    for watcher in &watchers {
        watcher.stop();
    }
    heartbeat.stop();
    engine.release();

    info!("[main] shutdown complete");
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    zonecast::logging::init(false)?;
    let status = system::run_health_check().await;

    println!("CPU Temperature : {:.1}°C", status.cpu_temp_c);
    println!("Disk Usage      : {:.1}%", status.disk_used_pct);
    println!("Disk Free       : {} MB", status.disk_free_bytes / 1024 / 1024);
    println!("Throttled       : {}", status.throttled);
    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("[main] failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn default_playlist_dir() -> PathBuf {
    if cfg!(windows) {
        exe_relative("playlist")
    } else {
        PathBuf::from("/playlist")
    }
}

fn default_config_path() -> PathBuf {
    if cfg!(windows) {
        exe_relative("config.json")
    } else {
        PathBuf::from("/etc/zonecast/config.json")
    }
}

fn exe_relative(name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)))
        .unwrap_or_else(|| PathBuf::from(name))
}
