/*
 *  cards.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Game card compositing: two badges flanking the score text, one
 *  immutable pixmap per game, rebuilt once per refresh cycle.
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
use log::warn;
use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::badge::BADGE_LARGE;
use crate::config::TickerConfig;
use crate::scores::GameResult;
use crate::text::TextRasterizer;

/// Badge draw size on a card; the large cached variant scales down.
pub const LOGO_DRAW: u32 = 80;
/// Gap between a badge and the score text.
const TEXT_GAP: u32 = 40;
/// Gap between adjacent cards in the scrolling row.
pub const CARD_GAP: u32 = 40;

const PLACEHOLDER_TEXT: &str = "No games available";

/// One composited card surface.
pub struct Card {
    pub surface: Pixmap,
}

impl Card {
    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }
}

/// Card width for a given rendered text width.
pub fn card_width(text_w: u32) -> u32 {
    LOGO_DRAW + TEXT_GAP + text_w + TEXT_GAP + LOGO_DRAW
}

/// Build the card row for one refresh cycle. An empty result set
/// becomes the single placeholder card so the scene is never blank.
pub fn build_cards(games: &[GameResult], ras: &TextRasterizer, cfg: &TickerConfig) -> Vec<Card> {
    if games.is_empty() {
        return vec![placeholder_card(ras, cfg)];
    }
    games.iter().map(|g| build_card(g, ras, cfg)).collect()
}

/// The "nothing to show" card.
pub fn placeholder_card(ras: &TextRasterizer, cfg: &TickerConfig) -> Card {
    let text = ras.render(PLACEHOLDER_TEXT, cfg.font_size, cfg.text_rgb());
    let (w, h) = match &text {
        Some(t) => (t.width().max(1), t.height().max(LOGO_DRAW)),
        None => (card_width(0), LOGO_DRAW),
    };
    let mut surface = Pixmap::new(w, h).unwrap_or_else(|| Pixmap::new(1, 1).unwrap());
    if let Some(t) = text {
        let y = (h.saturating_sub(t.height())) / 2;
        surface.draw_pixmap(
            0,
            y as i32,
            t.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    Card { surface }
}

fn build_card(game: &GameResult, ras: &TextRasterizer, cfg: &TickerConfig) -> Card {
    // Error rows carry no scores; show the row's label text instead of
    // a bare " - ".
    let line = if game.score1.is_empty() && game.score2.is_empty() {
        game.team1.clone()
    } else {
        format!("{} - {}", game.score1, game.score2)
    };
    let text = ras.render(&line, cfg.font_size, cfg.text_rgb());
    let (text_w, text_h) = text
        .as_ref()
        .map(|t| (t.width(), t.height()))
        .unwrap_or((0, 0));

    let w = card_width(text_w);
    let h = LOGO_DRAW.max(text_h);
    let mut surface = match Pixmap::new(w, h) {
        Some(p) => p,
        None => {
            warn!("Card surface allocation failed ({}x{})", w, h);
            return Card {
                surface: Pixmap::new(1, 1).unwrap(),
            };
        }
    };

    let logo_y = ((h - LOGO_DRAW) / 2) as i32;
    draw_badge(&mut surface, game, true, 0, logo_y);

    if let Some(t) = &text {
        let y = ((h - text_h) / 2) as i32;
        surface.draw_pixmap(
            (LOGO_DRAW + TEXT_GAP) as i32,
            y,
            t.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    let x2 = (LOGO_DRAW + TEXT_GAP + text_w + TEXT_GAP) as i32;
    draw_badge(&mut surface, game, false, x2, logo_y);

    Card { surface }
}

/// Draw one side's badge at LOGO_DRAW size, falling back to the flat
/// gray placeholder when the asset never resolved.
fn draw_badge(surface: &mut Pixmap, game: &GameResult, first: bool, x: i32, y: i32) {
    let asset = if first { &game.logo1 } else { &game.logo2 };
    let badge = asset
        .as_ref()
        .and_then(|a| a.large_path.as_ref())
        .and_then(|p| match Pixmap::load_png(p) {
            Ok(pm) => Some(pm),
            Err(e) => {
                warn!("Failed to load cached badge {}: {}", p.display(), e);
                None
            }
        });

    match badge {
        Some(pm) => {
            let scale = LOGO_DRAW as f32 / BADGE_LARGE as f32;
            let paint = PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            surface.draw_pixmap(
                0,
                0,
                pm.as_ref(),
                &paint,
                Transform::from_scale(scale, scale).post_translate(x as f32, y as f32),
                None,
            );
        }
        None => {
            if let Some(mut ph) = Pixmap::new(LOGO_DRAW, LOGO_DRAW) {
                ph.fill(Color::from_rgba8(50, 50, 50, 255));
                surface.draw_pixmap(
                    x,
                    y,
                    ph.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }
    }
}
