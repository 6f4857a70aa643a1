/*
 *  main.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use clap::{Parser, ValueHint};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

mod badge;
mod cards;
mod clocks;
mod config;
mod scores;
mod scroll;
mod surface;
mod text;
mod ticker;

use surface::{FbdevSurface, NullSurface};
use ticker::{Engine, RefreshWorker, SCREEN_HEIGHT, SCREEN_WIDTH};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[derive(Debug, Parser)]
#[command(name = "scorescroll", about = "Scrolling live sports score ticker", version)]
struct Cli {
    /// Path to config.json (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Directory for cached team badges
    #[arg(long, default_value = "logos")]
    cache_dir: PathBuf,

    /// Framebuffer device to paint
    #[arg(long, default_value = "/dev/fb0")]
    fb: PathBuf,

    /// Run without a display (frames are composed and dropped)
    #[arg(long)]
    headless: bool,
}

/// Wait for SIGINT, SIGTERM or SIGHUP.
async fn wait_for_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = sighup.recv() => info!("SIGHUP received"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!(
        "ScoreScroll v{} (built {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_DATE
    );

    let worker = RefreshWorker::new(cli.config.clone(), cli.cache_dir.clone())?;
    let (worker_handle, worker_stop, snapshot_rx) = worker.start();

    let (engine_stop_tx, engine_stop_rx) = mpsc::channel(1);

    // One signal watcher stops both halves; the frame loop finishes
    // its current frame before exiting.
    {
        let engine_stop = engine_stop_tx.clone();
        let worker_stop = worker_stop.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(()) => {
                    let _ = engine_stop.send(()).await;
                    let _ = worker_stop.send(()).await;
                }
                Err(e) => error!("Signal handler setup failed: {}", e),
            }
        });
    }

    let result = if cli.headless {
        info!("Running headless");
        let mut engine = Engine::new(
            NullSurface::default(),
            snapshot_rx,
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
        );
        engine.run(engine_stop_rx).await
    } else {
        // An unusable display surface is the one fatal startup error.
        let fb = FbdevSurface::open(&cli.fb)?;
        let mut engine = Engine::new(fb, snapshot_rx, SCREEN_WIDTH, SCREEN_HEIGHT);
        engine.run(engine_stop_rx).await
    };

    let _ = worker_stop.send(()).await;
    if let Err(e) = worker_handle.await {
        error!("Refresh worker failed to join: {}", e);
    }

    result?;
    info!("ScoreScroll stopped");
    Ok(())
}
