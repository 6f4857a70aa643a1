/*
 *  config.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Ticker configuration, written by the external admin form and
 *  re-read at the top of every refresh cycle.
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
use dirs_next::home_dir;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// One scoreboard source: ESPN addresses leagues as sport/league pairs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeagueRef {
    pub sport: String,
    pub league: String,
}

/// The whole display configuration. Replaced wholesale each refresh
/// cycle; the engine never patches individual fields.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// Active scoreboard sources, in display order.
    pub sports: Vec<LeagueRef>,
    /// Horizontal advance per frame, in pixels.
    pub scroll_speed: u32,
    /// Score text size, in pixels.
    pub font_size: u32,
    /// Seconds between fetch cycles.
    pub refresh_interval: u64,
    /// IANA zone names for the clock row. Missing means no clocks.
    #[serde(default)]
    pub time_zones: Vec<String>,
    /// Scene colors as `#RRGGBB`. The admin form does not write these
    /// yet, so both default.
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default = "default_text")]
    pub text_color: String,
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_text() -> String {
    "#FFFFFF".to_string()
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            sports: Vec::new(),
            scroll_speed: 5,
            font_size: 30,
            refresh_interval: 30,
            time_zones: Vec::new(),
            background_color: default_background(),
            text_color: default_text(),
        }
    }
}

impl TickerConfig {
    pub fn background_rgb(&self) -> (u8, u8, u8) {
        parse_hex_rgb(&self.background_color).unwrap_or((0, 0, 0))
    }

    pub fn text_rgb(&self) -> (u8, u8, u8) {
        parse_hex_rgb(&self.text_color).unwrap_or((255, 255, 255))
    }
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_rgb(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Public entry point: read the JSON file (explicit path or search),
/// validate, return the snapshot.
pub fn load(explicit: Option<&Path>) -> Result<TickerConfig, ConfigError> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::Validation(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => find_config_file().ok_or_else(|| {
            ConfigError::Validation(
                "no config.json found (searched cwd and ~/.config/scorescroll)".into(),
            )
        })?,
    };
    let cfg = read_json(&path)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // project local, where the admin form writes it
    let p = PathBuf::from("config.json");
    if p.exists() {
        return Some(p);
    }
    // XDG-style: ~/.config/scorescroll/config.json
    if let Some(home) = home_dir() {
        let p = home.join(".config/scorescroll/config.json");
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_json(path: &Path) -> Result<TickerConfig, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: TickerConfig = serde_json::from_str(&s)?;
    Ok(cfg)
}

/// Field invariants. A config that fails here is rejected whole; the
/// caller keeps running on the previous snapshot.
fn validate(cfg: &TickerConfig) -> Result<(), ConfigError> {
    if cfg.scroll_speed == 0 {
        return Err(ConfigError::Validation("scroll_speed must be > 0".into()));
    }
    if cfg.font_size == 0 {
        return Err(ConfigError::Validation("font_size must be > 0".into()));
    }
    if cfg.refresh_interval == 0 {
        return Err(ConfigError::Validation(
            "refresh_interval must be > 0".into(),
        ));
    }
    Ok(())
}
