/*
 *  surface.rs
 *
 *  ScoreScroll - always on the ball
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display output seam. The engine composes into an RGBA pixmap and
 *  hands it here; the only fatal error in the whole system is a
 *  surface that cannot take the frame.
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
use log::info;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, OpenOptions};
use std::path::Path;
use thiserror::Error;
use tiny_skia::Pixmap;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization failed: {0}")]
    Init(String),
    #[error("unsupported framebuffer format: {0}")]
    Unsupported(String),
}

/// Something that can take a finished frame.
pub trait Surface {
    fn present(&mut self, frame: &Pixmap) -> Result<(), SurfaceError>;
}

/// Headless sink for `--headless` runs and tests.
#[derive(Debug, Default)]
pub struct NullSurface {
    pub frames: u64,
}

impl Surface for NullSurface {
    fn present(&mut self, _frame: &Pixmap) -> Result<(), SurfaceError> {
        self.frames += 1;
        Ok(())
    }
}

/// Linux framebuffer output: `/dev/fbN` mapped read-write, geometry
/// read from the matching sysfs node. 32 bpp only, which is what the
/// Pi's HDMI framebuffer hands out.
pub struct FbdevSurface {
    map: MmapMut,
    width: u32,
    height: u32,
    stride: usize,
}

impl FbdevSurface {
    pub fn open(dev: &Path) -> Result<Self, SurfaceError> {
        let name = dev
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SurfaceError::Init(format!("bad device path {}", dev.display())))?;
        let sys = format!("/sys/class/graphics/{}", name);

        let (width, height) = parse_virtual_size(&read_sys(&sys, "virtual_size")?)
            .ok_or_else(|| SurfaceError::Init("unreadable virtual_size".into()))?;
        let bpp: u32 = read_sys(&sys, "bits_per_pixel")?
            .trim()
            .parse()
            .map_err(|_| SurfaceError::Init("unreadable bits_per_pixel".into()))?;
        if bpp != 32 {
            return Err(SurfaceError::Unsupported(format!("{} bpp", bpp)));
        }
        let stride: usize = read_sys(&sys, "stride")?
            .trim()
            .parse()
            .map_err(|_| SurfaceError::Init("unreadable stride".into()))?;

        let file = OpenOptions::new().read(true).write(true).open(dev)?;
        let map = unsafe {
            MmapOptions::new()
                .len(stride * height as usize)
                .map_mut(&file)?
        };

        info!("Framebuffer {}: {}x{} @ {} bpp", name, width, height, bpp);
        Ok(Self {
            map,
            width,
            height,
            stride,
        })
    }
}

impl Surface for FbdevSurface {
    fn present(&mut self, frame: &Pixmap) -> Result<(), SurfaceError> {
        let rows = frame.height().min(self.height) as usize;
        let cols = frame.width().min(self.width) as usize;
        let src = frame.data();
        let src_stride = frame.width() as usize * 4;

        for y in 0..rows {
            let src_row = &src[y * src_stride..y * src_stride + cols * 4];
            let dst_row = &mut self.map[y * self.stride..y * self.stride + cols * 4];
            // RGBA -> BGRX; the scene is opaque so premultiplication
            // is a no-op here
            for (s, d) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
                d[3] = 255;
            }
        }
        Ok(())
    }
}

fn read_sys(base: &str, leaf: &str) -> Result<String, SurfaceError> {
    Ok(fs::read_to_string(format!("{}/{}", base, leaf))?)
}

/// sysfs `virtual_size` is "width,height".
fn parse_virtual_size(s: &str) -> Option<(u32, u32)> {
    let mut it = s.trim().split(',');
    let w = it.next()?.trim().parse().ok()?;
    let h = it.next()?.trim().parse().ok()?;
    Some((w, h))
}
