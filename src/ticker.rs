/*
 *  ticker.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  The two halves of the engine: a background refresh worker that
 *  turns config + scoreboards + badges into published card snapshots,
 *  and the frame loop that paints whatever snapshot is current. The
 *  frame loop never waits on the network.
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
use chrono::Utc;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tiny_skia::{Color, Pixmap, PixmapPaint, Transform};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::badge::{AssetError, BadgeCache};
use crate::cards::{self, Card, CARD_GAP};
use crate::clocks::format_clocks;
use crate::config::{self, TickerConfig};
use crate::scores::{FetchError, GameResult, ScoreClient};
use crate::scroll::{FramePacer, ScrollState};
use crate::surface::{Surface, SurfaceError};
use crate::text::TextRasterizer;

/// Reference strip geometry.
pub const SCREEN_WIDTH: u32 = 1920;
pub const SCREEN_HEIGHT: u32 = 360;

const TARGET_FPS: u32 = 60;
/// Clock row position and fixed size, independent of the score font.
const CLOCK_X: i32 = 20;
const CLOCK_Y: i32 = 20;
const CLOCK_FONT_PX: u32 = 40;
/// Card row vertical position.
const CARD_ROW_Y: i32 = 160;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("display surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("asset cache error: {0}")]
    Asset(#[from] AssetError),
    #[error("score client error: {0}")]
    Fetch(#[from] FetchError),
    #[error("scene allocation failed")]
    Alloc,
}

/// One refresh cycle's output. Immutable once published; the frame
/// loop holds it until the next publish.
pub struct Snapshot {
    pub games: Vec<GameResult>,
    pub cards: Vec<Card>,
    pub config: TickerConfig,
}

impl Snapshot {
    /// Pre-first-fetch state: no cards yet, defaults for pacing.
    pub fn initial() -> Self {
        Self {
            games: Vec::new(),
            cards: Vec::new(),
            config: TickerConfig::default(),
        }
    }
}

/// Total width of the composed card row including inter-card gaps.
pub fn row_width(cards: &[Card]) -> u32 {
    if cards.is_empty() {
        return 0;
    }
    let widths: u32 = cards.iter().map(Card::width).sum();
    widths + CARD_GAP * (cards.len() as u32 - 1)
}

/// Background refresh worker: reload config, fetch scoreboards,
/// resolve badges, compose cards, publish. One iteration per
/// `refresh_interval`.
pub struct RefreshWorker {
    config_path: Option<PathBuf>,
    scores: ScoreClient,
    badges: BadgeCache,
    ras: TextRasterizer,
    last_config: TickerConfig,
}

impl RefreshWorker {
    pub fn new(config_path: Option<PathBuf>, cache_dir: PathBuf) -> Result<Self, EngineError> {
        Ok(Self {
            config_path,
            scores: ScoreClient::new()?,
            badges: BadgeCache::new(cache_dir)?,
            ras: TextRasterizer::new(),
            last_config: TickerConfig::default(),
        })
    }

    /// Spawn the polling task. Returns the join handle, a stop sender,
    /// and the snapshot receiver for the frame loop.
    pub fn start(
        mut self,
    ) -> (
        JoinHandle<()>,
        mpsc::Sender<()>,
        watch::Receiver<Arc<Snapshot>>,
    ) {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::initial()));
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            loop {
                let snapshot = self.run_cycle().await;
                let interval = snapshot.config.refresh_interval;
                let _ = tx.send(Arc::new(snapshot));
                tokio::select! {
                    _ = sleep(Duration::from_secs(interval)) => {}
                    _ = stop_rx.recv() => {
                        info!("Refresh worker received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        (handle, stop_tx, rx)
    }

    /// One full refresh cycle. Infallible by policy: config errors keep
    /// the previous config, fetch errors are isolated per league, and
    /// an empty result set becomes the placeholder card.
    async fn run_cycle(&mut self) -> Snapshot {
        match config::load(self.config_path.as_deref()) {
            Ok(cfg) => self.last_config = cfg,
            Err(e) => error!("Config reload failed, keeping previous: {}", e),
        }
        let cfg = self.last_config.clone();

        let games = self.scores.fetch_scores(&cfg.sports, &self.badges).await;
        let cards = cards::build_cards(&games, &self.ras, &cfg);
        info!(
            "Refresh cycle complete: {} leagues, {} rows, {} cards",
            cfg.sports.len(),
            games.len(),
            cards.len()
        );

        Snapshot {
            games,
            cards,
            config: cfg,
        }
    }
}

/// The frame loop. Owns the scene pixmap, the scroll state and the
/// output surface; reads published snapshots without ever blocking on
/// the worker.
pub struct Engine<S: Surface> {
    pub surface: S,
    rx: watch::Receiver<Arc<Snapshot>>,
    ras: TextRasterizer,
    width: u32,
    height: u32,
}

impl<S: Surface> Engine<S> {
    pub fn new(surface: S, rx: watch::Receiver<Arc<Snapshot>>, width: u32, height: u32) -> Self {
        Self {
            surface,
            rx,
            ras: TextRasterizer::new(),
            width,
            height,
        }
    }

    /// Run until a stop is received. Only surface failures escape;
    /// everything upstream has already been degraded to drawable data.
    pub async fn run(&mut self, mut stop_rx: mpsc::Receiver<()>) -> Result<(), EngineError> {
        let mut scene = Pixmap::new(self.width, self.height).ok_or(EngineError::Alloc)?;
        let mut snapshot = self.rx.borrow().clone();
        let mut placeholder = cards::placeholder_card(&self.ras, &snapshot.config);
        let mut scroll = ScrollState::new(self.width);
        let mut pacer = FramePacer::new(TARGET_FPS);
        // clock text changes once a second; cache the raster
        let mut clock_cache: Option<(String, Option<Pixmap>)> = None;

        info!("Entering frame loop at {} fps", TARGET_FPS);
        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    info!("Frame loop received stop signal. Exiting.");
                    break;
                }
                _ = pacer.tick() => {}
            }

            if self.rx.has_changed().unwrap_or(false) {
                snapshot = self.rx.borrow_and_update().clone();
                placeholder = cards::placeholder_card(&self.ras, &snapshot.config);
                scroll.reset(self.width);
            }

            let row: &[Card] = if snapshot.cards.is_empty() {
                std::slice::from_ref(&placeholder)
            } else {
                &snapshot.cards
            };

            self.paint(&mut scene, &snapshot.config, row, scroll.offset_px, &mut clock_cache);
            self.surface.present(&scene)?;

            scroll.advance(snapshot.config.scroll_speed, row_width(row), self.width);
        }
        Ok(())
    }

    fn paint(
        &self,
        scene: &mut Pixmap,
        cfg: &TickerConfig,
        row: &[Card],
        offset: i32,
        clock_cache: &mut Option<(String, Option<Pixmap>)>,
    ) {
        let (r, g, b) = cfg.background_rgb();
        scene.fill(Color::from_rgba8(r, g, b, 255));

        // clock row
        let clock_text = format_clocks(&cfg.time_zones, Utc::now());
        if !clock_text.is_empty() {
            let stale = clock_cache
                .as_ref()
                .map(|(s, _)| s != &clock_text)
                .unwrap_or(true);
            if stale {
                let rendered = self.ras.render(&clock_text, CLOCK_FONT_PX, cfg.text_rgb());
                *clock_cache = Some((clock_text, rendered));
            }
            if let Some((_, Some(pm))) = clock_cache.as_ref() {
                scene.draw_pixmap(
                    CLOCK_X,
                    CLOCK_Y,
                    pm.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }

        // scrolling card row
        let mut x = offset;
        for card in row {
            scene.draw_pixmap(
                x,
                CARD_ROW_Y,
                card.surface.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
            x += (card.width() + CARD_GAP) as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NullSurface;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::timeout;

    fn test_dir(tag: &str) -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let d = std::env::temp_dir().join(format!(
            "scorescroll-test-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&d).unwrap();
        d
    }

    fn dummy_card(w: u32) -> Card {
        Card {
            surface: Pixmap::new(w, 80).unwrap(),
        }
    }

    #[test]
    fn test_row_width() {
        assert_eq!(row_width(&[]), 0);
        assert_eq!(row_width(&[dummy_card(100)]), 100);
        assert_eq!(row_width(&[dummy_card(100), dummy_card(60)]), 200);
        assert_eq!(
            row_width(&[dummy_card(10), dummy_card(10), dummy_card(10)]),
            110
        );
    }

    #[tokio::test]
    async fn test_worker_republishes_each_interval_and_keeps_last_good_config() {
        let dir = test_dir("worker");
        let cfg_path = dir.join("config.json");
        // empty league list: whole cycles run without any requests
        fs::write(
            &cfg_path,
            r#"{"sports": [], "scroll_speed": 7, "font_size": 20, "refresh_interval": 1}"#,
        )
        .unwrap();

        let worker = RefreshWorker::new(Some(cfg_path.clone()), dir.join("logos")).unwrap();
        let (handle, stop_tx, mut rx) = worker.start();

        timeout(Duration::from_millis(2500), rx.changed())
            .await
            .expect("no publish within one interval")
            .unwrap();
        {
            let snap = rx.borrow_and_update().clone();
            assert_eq!(snap.config.scroll_speed, 7);
            assert!(snap.games.is_empty());
            // no games still yields the placeholder card
            assert_eq!(snap.cards.len(), 1);
        }

        // a malformed rewrite must not disturb the running config
        fs::write(&cfg_path, "{not json").unwrap();
        timeout(Duration::from_millis(2500), rx.changed())
            .await
            .expect("no re-publish within one interval")
            .unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.config.scroll_speed, 7);
        assert_eq!(snap.config.refresh_interval, 1);

        stop_tx.send(()).await.unwrap();
        handle.await.unwrap();
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_engine_paints_and_stops_cleanly() {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::initial()));
        let mut engine = Engine::new(NullSurface::default(), rx, 320, 100);
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            engine.run(stop_rx).await.unwrap();
            engine
        });

        sleep(Duration::from_millis(80)).await;

        // publish a new snapshot mid-run; the loop should keep going
        let snapshot = Snapshot {
            games: Vec::new(),
            cards: vec![dummy_card(120), dummy_card(90)],
            config: TickerConfig::default(),
        };
        tx.send(Arc::new(snapshot)).unwrap();
        sleep(Duration::from_millis(80)).await;

        stop_tx.send(()).await.unwrap();
        let engine = handle.await.unwrap();
        // ~160ms at 60fps; anything moving proves the loop ran and the
        // stop landed between frames
        assert!(engine.surface.frames >= 4, "frames: {}", engine.surface.frames);
    }
}
