/*
 *  text.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Text rasterization through the SVG pipeline: build a one-line
 *  <text> document, let usvg resolve system fonts, render with resvg
 *  into a tightly cropped RGBA pixmap.
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
use log::{debug, warn};
use resvg::render;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options as UsvgOptions, Tree};

/// Renders single lines of text to RGBA pixmaps.
///
/// Owns the parsed system font database; construct once per task and
/// reuse, loading fonts is the expensive part.
pub struct TextRasterizer {
    opt: UsvgOptions<'static>,
}

impl TextRasterizer {
    pub fn new() -> Self {
        let mut opt = UsvgOptions::default();
        opt.fontdb_mut().load_system_fonts();
        let faces = opt.fontdb.len();
        if faces == 0 {
            warn!("No system fonts found; text will not render");
        } else {
            debug!("Font database loaded with {} faces", faces);
        }
        Self { opt }
    }

    /// Rasterize `text` at `px` pixels in the given color.
    ///
    /// Returns `None` for empty input or when no glyph produces ink
    /// (e.g. a fontless system); callers lay out without the text in
    /// that case rather than failing the frame.
    pub fn render(&self, text: &str, px: u32, rgb: (u8, u8, u8)) -> Option<Pixmap> {
        if text.trim().is_empty() || px == 0 {
            return None;
        }

        // Oversized canvas; the parsed bounding box crops it below.
        let canvas_w = (text.chars().count() as u32 + 2) * px;
        let canvas_h = px * 2;
        let (r, g, b) = rgb;
        let svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" "#,
                r#"viewBox="0 0 {w} {h}">"#,
                r#"<text x="0" y="{base}" font-family="sans-serif" font-size="{px}" "#,
                r#"fill="rgb({r},{g},{b})">{body}</text></svg>"#
            ),
            w = canvas_w,
            h = canvas_h,
            base = px,
            px = px,
            r = r,
            g = g,
            b = b,
            body = escape_xml(text),
        );

        let tree = match Tree::from_str(&svg, &self.opt) {
            Ok(t) => t,
            Err(e) => {
                warn!("Text SVG failed to parse: {:?}", e);
                return None;
            }
        };

        let bbox = tree.root().abs_bounding_box();
        let w = bbox.width().ceil() as u32;
        let h = bbox.height().ceil() as u32;
        if w == 0 || h == 0 {
            return None;
        }

        let mut pixmap = Pixmap::new(w, h)?;
        // Shift the glyph run to the pixmap origin.
        let shift = Transform::from_translate(-bbox.x(), -bbox.y());
        render(&tree, shift, &mut pixmap.as_mut());
        Some(pixmap)
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("7 - 3"), "7 - 3");
        assert_eq!(escape_xml("A&M <3 \"q\""), "A&amp;M &lt;3 &quot;q&quot;");
    }

    #[test]
    fn test_empty_input_yields_none() {
        let ras = TextRasterizer::new();
        assert!(ras.render("", 30, (255, 255, 255)).is_none());
        assert!(ras.render("   ", 30, (255, 255, 255)).is_none());
        assert!(ras.render("x", 0, (255, 255, 255)).is_none());
    }
}
