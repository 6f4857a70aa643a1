/*
 *  clocks.rs
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
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Separator between per-zone clock strings.
const CLOCK_SEPARATOR: &str = "   |   ";

/// Render the clock row for the given zones at the given instant.
///
/// Each zone becomes `"Label: HH:MM:SS"` where the label is the last
/// path segment of the IANA name with underscores replaced by spaces
/// ("America/New_York" shows as "New York"). Zones that do not resolve
/// are skipped; input order is preserved. Runs every frame, so this
/// stays pure string work.
pub fn format_clocks(zones: &[String], now: DateTime<Utc>) -> String {
    let mut clocks = Vec::with_capacity(zones.len());
    for zone in zones {
        let tz: Tz = match zone.parse() {
            Ok(tz) => tz,
            Err(_) => continue,
        };
        let local = now.with_timezone(&tz).format("%H:%M:%S");
        let label = zone
            .rsplit('/')
            .next()
            .unwrap_or(zone)
            .replace('_', " ");
        clocks.push(format!("{}: {}", label, local));
    }
    clocks.join(CLOCK_SEPARATOR)
}
