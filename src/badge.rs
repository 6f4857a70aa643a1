/*
 *  badge.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Team logo acquisition and the badge transform: download once per
 *  team, clip to a disc, ring it, persist both size variants, and
 *  serve cached paths forever after.
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
use log::{debug, info, warn};
use mini_moka::sync::Cache;
use reqwest::{header, Client, StatusCode};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Transform,
};
use tokio::sync::Mutex as TokMutex;
use usvg::{Options as UsvgOptions, Tree};

/// Logo interior diameter inside either ring.
const LOGO_SIZE: u32 = 80;
/// Thin-ring badge edge length.
pub const BADGE_SMALL: u32 = 90;
/// Thick-ring badge edge length.
pub const BADGE_LARGE: u32 = 100;
/// Ring thickness on the large badge.
const LARGE_RING: f32 = 6.0;

/// Resolved badge files for one team. Paths are absent when the logo
/// could not be fetched or transformed; the renderer substitutes a
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoAsset {
    pub team_id: String,
    pub small_path: Option<PathBuf>,
    pub large_path: Option<PathBuf>,
}

impl LogoAsset {
    pub fn missing(team_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            small_path: None,
            large_path: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.small_path.is_some() && self.large_path.is_some()
    }
}

/// Error type for logo download/transform. Contained inside the cache;
/// callers only ever see a `LogoAsset` with absent paths.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    #[error("not an image: content-type {0:?}")]
    NotAnImage(String),
    #[error("image decode error: {0}")]
    Decode(String),
    #[error("image encode error: {0}")]
    Encode(String),
    #[error("pixmap allocation failed")]
    Alloc,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk badge cache with an in-memory memo in front of it.
///
/// Keyed by team id; append-only. Steady state is zero network: both
/// size variants on disk is the hit condition.
pub struct BadgeCache {
    dir: PathBuf,
    client: Client,
    memo: Cache<String, LogoAsset>,
    // One guard per team id so concurrent league fetches never race
    // the same download.
    inflight: TokMutex<HashMap<String, Arc<TokMutex<()>>>>,
}

impl BadgeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AssetError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(2000))
            .timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            dir,
            client,
            memo: Cache::builder().max_capacity(2048).build(),
            inflight: TokMutex::new(HashMap::new()),
        })
    }

    fn small_path(&self, team_id: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.png", team_id, BADGE_SMALL))
    }

    fn large_path(&self, team_id: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.png", team_id, BADGE_LARGE))
    }

    /// Resolve the badge pair for a team. Never fails past this
    /// boundary: any error degrades to absent paths and a log line.
    pub async fn get_badge(&self, team_id: &str, url: Option<&str>) -> LogoAsset {
        if let Some(hit) = self.memo.get(&team_id.to_string()) {
            return hit;
        }

        let guard = {
            let mut map = self.inflight.lock().await;
            map.entry(team_id.to_string())
                .or_insert_with(|| Arc::new(TokMutex::new(())))
                .clone()
        };
        let _held = guard.lock().await;

        // Cache-hit condition: both variants already on disk.
        let small = self.small_path(team_id);
        let large = self.large_path(team_id);
        if small.exists() && large.exists() {
            let asset = LogoAsset {
                team_id: team_id.to_string(),
                small_path: Some(small),
                large_path: Some(large),
            };
            self.memo.insert(team_id.to_string(), asset.clone());
            return asset;
        }

        let Some(url) = url else {
            return LogoAsset::missing(team_id);
        };

        match self.download_and_store(team_id, url).await {
            Ok(asset) => {
                self.memo.insert(team_id.to_string(), asset.clone());
                asset
            }
            Err(e) => {
                warn!("Logo for team {} unavailable: {}", team_id, e);
                LogoAsset::missing(team_id)
            }
        }
    }

    async fn download_and_store(&self, team_id: &str, url: &str) -> Result<LogoAsset, AssetError> {
        debug!("Downloading logo for team {} from {}", team_id, url);
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AssetError::Status(resp.status()));
        }
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("image") {
            return Err(AssetError::NotAnImage(content_type));
        }
        let bytes = resp.bytes().await?;

        let source = decode_image(&bytes, &content_type)?;
        let (small, large) = compose_badges(&source)?;

        write_png_atomic(&self.small_path(team_id), &small)?;
        write_png_atomic(&self.large_path(team_id), &large)?;
        info!("Cached badges for team {}", team_id);

        Ok(LogoAsset {
            team_id: team_id.to_string(),
            small_path: Some(self.small_path(team_id)),
            large_path: Some(self.large_path(team_id)),
        })
    }
}

/// Decode a downloaded logo. PNG is the common case; a few feeds serve
/// SVG, which goes through the usvg pipeline instead.
fn decode_image(bytes: &[u8], content_type: &str) -> Result<Pixmap, AssetError> {
    let looks_svg = content_type.contains("svg")
        || bytes.starts_with(b"<svg")
        || bytes.starts_with(b"<?xml");
    if looks_svg {
        let text =
            std::str::from_utf8(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
        let tree = Tree::from_str(text, &UsvgOptions::default())
            .map_err(|e| AssetError::Decode(e.to_string()))?;
        let size = tree.size();
        let mut pixmap =
            Pixmap::new(size.width().ceil() as u32, size.height().ceil() as u32)
                .ok_or(AssetError::Alloc)?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        return Ok(pixmap);
    }
    Pixmap::decode_png(bytes).map_err(|e| AssetError::Decode(e.to_string()))
}

/// Scale the source onto the 80x80 interior and clip it to a disc.
/// Aspect is deliberately not preserved, matching the badge contract.
fn circular_logo(src: &Pixmap) -> Result<Pixmap, AssetError> {
    let mut out = Pixmap::new(LOGO_SIZE, LOGO_SIZE).ok_or(AssetError::Alloc)?;

    let mut mask = Mask::new(LOGO_SIZE, LOGO_SIZE).ok_or(AssetError::Alloc)?;
    let disc = circle(LOGO_SIZE as f32 / 2.0, LOGO_SIZE as f32 / 2.0, LOGO_SIZE as f32 / 2.0)?;
    mask.fill_path(&disc, FillRule::Winding, true, Transform::identity());

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    let sx = LOGO_SIZE as f32 / src.width() as f32;
    let sy = LOGO_SIZE as f32 / src.height() as f32;
    out.draw_pixmap(
        0,
        0,
        src.as_ref(),
        &paint,
        Transform::from_scale(sx, sy),
        Some(&mask),
    );
    Ok(out)
}

/// Build both badge variants from a decoded source image.
///
/// Small (90x90): masked logo over an opaque white disc, leaving a thin
/// white ring around it. Large (100x100): a 6 px white ring with a
/// transparent interior under the logo. Corners stay fully transparent
/// on both.
pub fn compose_badges(source: &Pixmap) -> Result<(Pixmap, Pixmap), AssetError> {
    let logo = circular_logo(source)?;

    let mut white = Paint::default();
    white.set_color_rgba8(255, 255, 255, 255);
    white.anti_alias = true;

    // 90x90, disc radius 44, logo centered at (5,5)
    let mut small = Pixmap::new(BADGE_SMALL, BADGE_SMALL).ok_or(AssetError::Alloc)?;
    let c = BADGE_SMALL as f32 / 2.0;
    small.fill_path(
        &circle(c, c, c - 1.0)?,
        &white,
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let inset = ((BADGE_SMALL - LOGO_SIZE) / 2) as i32;
    small.draw_pixmap(
        inset,
        inset,
        logo.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    // 100x100, full-radius disc with the interior punched back out so
    // only the 6 px ring survives, logo centered at (10,10)
    let mut large = Pixmap::new(BADGE_LARGE, BADGE_LARGE).ok_or(AssetError::Alloc)?;
    let c = BADGE_LARGE as f32 / 2.0;
    large.fill_path(
        &circle(c, c, c)?,
        &white,
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let mut clear = Paint::default();
    clear.blend_mode = BlendMode::Clear;
    clear.anti_alias = true;
    large.fill_path(
        &circle(c, c, c - LARGE_RING)?,
        &clear,
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    let inset = ((BADGE_LARGE - LOGO_SIZE) / 2) as i32;
    large.draw_pixmap(
        inset,
        inset,
        logo.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    Ok((small, large))
}

fn circle(cx: f32, cy: f32, r: f32) -> Result<tiny_skia::Path, AssetError> {
    let mut pb = PathBuilder::new();
    pb.push_circle(cx, cy, r);
    pb.finish().ok_or(AssetError::Alloc)
}

/// Write-then-rename so a concurrent reader never sees a torn file and
/// racing writers converge on identical bytes.
fn write_png_atomic(path: &Path, pixmap: &Pixmap) -> Result<(), AssetError> {
    let data = pixmap
        .encode_png()
        .map_err(|e| AssetError::Encode(e.to_string()))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

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

    fn red_source(w: u32, h: u32) -> Pixmap {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(tiny_skia::Color::from_rgba8(200, 20, 20, 255));
        p
    }

    #[test]
    fn test_badge_dimensions() {
        let (small, large) = compose_badges(&red_source(64, 32)).unwrap();
        assert_eq!((small.width(), small.height()), (BADGE_SMALL, BADGE_SMALL));
        assert_eq!((large.width(), large.height()), (BADGE_LARGE, BADGE_LARGE));
    }

    #[test]
    fn test_corners_transparent_regardless_of_aspect() {
        for (w, h) in [(80, 80), (64, 32), (33, 97)] {
            let (small, large) = compose_badges(&red_source(w, h)).unwrap();
            for p in [(0, 0), (89, 0), (0, 89), (89, 89)] {
                assert_eq!(small.pixel(p.0, p.1).unwrap().alpha(), 0, "small corner {:?}", p);
            }
            for p in [(0, 0), (99, 0), (0, 99), (99, 99)] {
                assert_eq!(large.pixel(p.0, p.1).unwrap().alpha(), 0, "large corner {:?}", p);
            }
        }
    }

    #[test]
    fn test_large_badge_ring_is_white_and_interior_holds_logo() {
        let (_, large) = compose_badges(&red_source(80, 80)).unwrap();
        // (50, 2): 48 px from center, inside the 44..50 ring
        let ring = large.pixel(50, 2).unwrap();
        assert_eq!(ring.alpha(), 255);
        assert_eq!(ring.red(), 255);
        // center carries the logo fill
        let center = large.pixel(50, 50).unwrap();
        assert_eq!(center.alpha(), 255);
        assert!(center.red() > center.green());
        // the gap between logo disc (r 40) and ring interior (r 44) is
        // transparent: (50, 7) is ~43 px out
        assert_eq!(large.pixel(50, 7).unwrap().alpha(), 0);
    }

    #[test]
    fn test_small_badge_ring_backs_the_logo() {
        let (small, _) = compose_badges(&red_source(80, 80)).unwrap();
        // (45, 3): ~42 px from center, between logo edge (40) and disc
        // edge (44) - the visible white ring
        let ring = small.pixel(45, 3).unwrap();
        assert_eq!(ring.alpha(), 255);
        assert_eq!(ring.red(), 255);
        assert_eq!(ring.green(), 255);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let src = red_source(120, 90);
        let (a_s, a_l) = compose_badges(&src).unwrap();
        let (b_s, b_l) = compose_badges(&src).unwrap();
        assert_eq!(a_s.encode_png().unwrap(), b_s.encode_png().unwrap());
        assert_eq!(a_l.encode_png().unwrap(), b_l.encode_png().unwrap());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image", "image/png").is_err());
    }

    #[test]
    fn test_decode_svg_source() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40"><rect width="40" height="40" fill="blue"/></svg>"#;
        let p = decode_image(svg.as_bytes(), "image/svg+xml").unwrap();
        assert_eq!((p.width(), p.height()), (40, 40));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network_and_is_stable() {
        let dir = test_dir("hit");
        let cache = BadgeCache::new(&dir).unwrap();

        // Pre-populate the disk cache; the URL below is unroutable, so
        // any network attempt would fail the test with missing paths.
        let (small, large) = compose_badges(&red_source(80, 80)).unwrap();
        write_png_atomic(&cache.small_path("42"), &small).unwrap();
        write_png_atomic(&cache.large_path("42"), &large).unwrap();

        let first = cache.get_badge("42", Some("http://127.0.0.1:1/nope.png")).await;
        assert!(first.is_resolved());

        let second = cache.get_badge("42", Some("http://127.0.0.1:1/nope.png")).await;
        assert_eq!(first, second);

        let bytes_a = fs::read(first.small_path.as_ref().unwrap()).unwrap();
        let bytes_b = fs::read(second.small_path.as_ref().unwrap()).unwrap();
        assert_eq!(bytes_a, bytes_b);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unreachable_source_degrades_to_missing() {
        let dir = test_dir("miss");
        let cache = BadgeCache::new(&dir).unwrap();
        let asset = cache.get_badge("7", Some("http://127.0.0.1:1/nope.png")).await;
        assert!(!asset.is_resolved());
        assert_eq!(asset.team_id, "7");

        // no URL at all short-circuits the same way
        let asset = cache.get_badge("8", None).await;
        assert!(!asset.is_resolved());

        fs::remove_dir_all(&dir).ok();
    }
}
