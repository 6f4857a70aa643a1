/*
 *  scores.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-league scoreboard fetch. One slow or broken league costs that
 *  league a synthetic "Error" row and nothing else.
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
use futures::future::join_all;
use log::{debug, error, warn};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::badge::{BadgeCache, LogoAsset};
use crate::config::LeagueRef;

const SCOREBOARD_BASE: &str = "https://site.api.espn.com/apis/site/v2/sports";

/// Error type for one league's fetch. Always contained: the caller
/// folds it into a synthetic error row for that league.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    #[error("malformed payload: {0}")]
    Payload(String),
}

/// One game, ready to become a card. Scores stay display strings so
/// states like "Final" pass straight through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub league_label: String,
    pub team1: String,
    pub team2: String,
    pub score1: String,
    pub score2: String,
    pub logo1: Option<LogoAsset>,
    pub logo2: Option<LogoAsset>,
}

/// The synthetic row shown when a league's fetch fails outright.
pub fn error_entry(league: &str) -> GameResult {
    GameResult {
        league_label: league.to_uppercase(),
        team1: "Error".to_string(),
        team2: String::new(),
        score1: String::new(),
        score2: String::new(),
        logo1: None,
        logo2: None,
    }
}

/// A parsed event before badge resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawGame {
    league_label: String,
    team1: String,
    team2: String,
    score1: String,
    score2: String,
    id1: String,
    id2: String,
    logo_url1: Option<String>,
    logo_url2: Option<String>,
}

/// Scoreboard HTTP client.
pub struct ScoreClient {
    client: Client,
    base_url: String,
}

impl ScoreClient {
    pub fn new() -> Result<Self, FetchError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(2000))
            .timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: SCOREBOARD_BASE.to_string(),
        })
    }

    /// Fetch every configured league concurrently. Output order is the
    /// config order; within a league, the source's event order.
    pub async fn fetch_scores(&self, leagues: &[LeagueRef], badges: &BadgeCache) -> Vec<GameResult> {
        let fetches = leagues.iter().map(|entry| self.fetch_league(entry, badges));
        let results = join_all(fetches).await;
        flatten_results(leagues, results)
    }

    async fn fetch_league(
        &self,
        entry: &LeagueRef,
        badges: &BadgeCache,
    ) -> Result<Vec<GameResult>, FetchError> {
        let url = format!("{}/{}/{}/scoreboard", self.base_url, entry.sport, entry.league);
        debug!("Fetching scoreboard {}", url);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        let body: Value = resp.json().await?;

        let raw = parse_events(&entry.league, &body)?;
        let mut games = Vec::with_capacity(raw.len());
        for rg in raw {
            let logo1 = badges.get_badge(&rg.id1, rg.logo_url1.as_deref()).await;
            let logo2 = badges.get_badge(&rg.id2, rg.logo_url2.as_deref()).await;
            games.push(GameResult {
                league_label: rg.league_label,
                team1: rg.team1,
                team2: rg.team2,
                score1: rg.score1,
                score2: rg.score2,
                logo1: Some(logo1),
                logo2: Some(logo2),
            });
        }
        Ok(games)
    }
}

/// Fold per-league outcomes into one ordered row set: parsed games for
/// the leagues that answered, exactly one error row for each that
/// did not.
fn flatten_results(
    leagues: &[LeagueRef],
    results: Vec<Result<Vec<GameResult>, FetchError>>,
) -> Vec<GameResult> {
    let mut all = Vec::new();
    for (entry, result) in leagues.iter().zip(results) {
        match result {
            Ok(games) => all.extend(games),
            Err(e) => {
                error!("Error loading {} scores: {}", entry.league.to_uppercase(), e);
                all.push(error_entry(&entry.league));
            }
        }
    }
    all
}

/// Parse the scoreboard body into raw games. The `events` array is the
/// contract; a body without one is malformed. Individual events that
/// do not match the expected shape are skipped with a warning.
fn parse_events(league: &str, body: &Value) -> Result<Vec<RawGame>, FetchError> {
    let events = body
        .get("events")
        .and_then(|e| e.as_array())
        .ok_or_else(|| FetchError::Payload("missing events array".into()))?;

    let label = league.to_uppercase();
    let mut games = Vec::with_capacity(events.len());
    for event in events {
        match parse_event(&label, event) {
            Some(g) => games.push(g),
            None => warn!("Skipping malformed {} event", label),
        }
    }
    Ok(games)
}

fn parse_event(league_label: &str, event: &Value) -> Option<RawGame> {
    let competitors = event
        .get("competitions")?
        .get(0)?
        .get("competitors")?
        .as_array()?;
    let c1 = competitors.first()?;
    let c2 = competitors.get(1)?;

    let team1 = c1.get("team")?;
    let team2 = c2.get("team")?;

    Some(RawGame {
        league_label: league_label.to_string(),
        team1: team1.get("shortDisplayName")?.as_str()?.to_string(),
        team2: team2.get("shortDisplayName")?.as_str()?.to_string(),
        score1: score_of(c1),
        score2: score_of(c2),
        id1: team_id(team1)?,
        id2: team_id(team2)?,
        logo_url1: extract_logo_url(team1),
        logo_url2: extract_logo_url(team2),
    })
}

/// Competitor score as a display string, defaulting like the source
/// feed does for games that have not started.
fn score_of(competitor: &Value) -> String {
    match competitor.get("score") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    }
}

/// Team ids arrive as strings but have been seen as bare numbers.
fn team_id(team: &Value) -> Option<String> {
    match team.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Logo reference: `team.logo`, falling back to `team.logos[0].href`.
fn extract_logo_url(team: &Value) -> Option<String> {
    if let Some(url) = team.get("logo").and_then(|v| v.as_str()) {
        return Some(url.to_string());
    }
    team.get("logos")?
        .as_array()?
        .first()?
        .get("href")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nfl_body() -> Value {
        serde_json::json!({
            "events": [{
                "competitions": [{
                    "competitors": [
                        {
                            "team": {"id": "20", "shortDisplayName": "NYJ",
                                     "logo": "https://cdn.example/nyj.png"},
                            "score": "7"
                        },
                        {
                            "team": {"id": "2", "shortDisplayName": "BUF",
                                     "logos": [{"href": "https://cdn.example/buf.png"}]},
                            "score": "3"
                        }
                    ]
                }]
            }]
        })
    }

    #[test]
    fn test_parse_single_event() {
        let games = parse_events("nfl", &nfl_body()).unwrap();
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.league_label, "NFL");
        assert_eq!(g.team1, "NYJ");
        assert_eq!(g.score1, "7");
        assert_eq!(g.team2, "BUF");
        assert_eq!(g.score2, "3");
        assert_eq!(g.id1, "20");
        assert_eq!(g.logo_url1.as_deref(), Some("https://cdn.example/nyj.png"));
        assert_eq!(g.logo_url2.as_deref(), Some("https://cdn.example/buf.png"));
    }

    #[test]
    fn test_missing_score_defaults_to_zero() {
        let mut body = nfl_body();
        body["events"][0]["competitions"][0]["competitors"][0]
            .as_object_mut()
            .unwrap()
            .remove("score");
        let games = parse_events("nfl", &body).unwrap();
        assert_eq!(games[0].score1, "0");
    }

    #[test]
    fn test_zero_events_is_ok_and_empty() {
        let games = parse_events("mlb", &serde_json::json!({"events": []})).unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn test_missing_events_is_malformed() {
        let err = parse_events("nhl", &serde_json::json!({"status": "down"})).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[test]
    fn test_malformed_event_is_skipped_not_fatal() {
        let mut body = nfl_body();
        body["events"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"competitions": []}));
        let games = parse_events("nfl", &body).unwrap();
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn test_error_entry_shape() {
        let e = error_entry("nhl");
        assert_eq!(e.league_label, "NHL");
        assert_eq!(e.team1, "Error");
        assert_eq!(e.team2, "");
        assert_eq!(e.score1, "");
        assert_eq!(e.score2, "");
        assert!(e.logo1.is_none() && e.logo2.is_none());
    }

    #[test]
    fn test_failed_league_isolated_in_flatten() {
        let leagues = vec![
            LeagueRef { sport: "football".into(), league: "nfl".into() },
            LeagueRef { sport: "hockey".into(), league: "nhl".into() },
            LeagueRef { sport: "baseball".into(), league: "mlb".into() },
        ];
        let ok_game = |label: &str| GameResult {
            league_label: label.to_string(),
            team1: "A".into(),
            team2: "B".into(),
            score1: "1".into(),
            score2: "2".into(),
            logo1: None,
            logo2: None,
        };
        let results = vec![
            Ok(vec![ok_game("NFL"), ok_game("NFL")]),
            Err(FetchError::Payload("timeout stand-in".into())),
            Ok(vec![ok_game("MLB")]),
        ];
        let all = flatten_results(&leagues, results);
        // two parsed + one synthetic + one parsed, in config order
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].league_label, "NFL");
        assert_eq!(all[2].team1, "Error");
        assert_eq!(all[2].league_label, "NHL");
        assert_eq!(all[3].league_label, "MLB");
        // exactly one NHL entry
        assert_eq!(all.iter().filter(|g| g.league_label == "NHL").count(), 1);
    }

    #[test]
    fn test_extract_logo_url_precedence() {
        let both = serde_json::json!({
            "logo": "https://cdn.example/direct.png",
            "logos": [{"href": "https://cdn.example/listed.png"}]
        });
        assert_eq!(
            extract_logo_url(&both).as_deref(),
            Some("https://cdn.example/direct.png")
        );
        let neither = serde_json::json!({"id": "1"});
        assert_eq!(extract_logo_url(&neither), None);
    }

    #[test]
    fn test_numeric_team_id_tolerated() {
        let team = serde_json::json!({"id": 42});
        assert_eq!(team_id(&team).as_deref(), Some("42"));
    }
}
