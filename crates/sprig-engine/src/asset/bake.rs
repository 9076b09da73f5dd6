//! Offline glyph atlas baking.
//!
//! Rasterizes a character set with `fontdue` and shelf-packs the coverage
//! bitmaps into an RGBA atlas (white, alpha = coverage). The result plugs
//! straight into a [`FontSpec`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{FontMetrics, FontSpec, GlyphMetrics};

#[derive(Debug, thiserror::Error)]
pub enum FontBakeError {
    #[error("invalid font data: {0}")]
    InvalidFont(String),

    #[error("glyph {ch:?} does not fit in a {}x{} atlas", size[0], size[1])]
    AtlasFull { ch: char, size: [u32; 2] },
}

#[derive(Debug, Clone)]
pub struct FontBakeSettings {
    /// Rasterization size in pixels per em.
    pub px: f32,
    pub atlas_size: [u32; 2],
    /// Empty pixels between glyphs.
    pub padding: u32,
    pub charset: Vec<char>,
}

impl Default for FontBakeSettings {
    fn default() -> Self {
        Self {
            px: 32.0,
            atlas_size: [512, 512],
            padding: 1,
            charset: (' '..='~').collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BakedFont {
    /// Atlas image, rows top-down as written to disk.
    pub atlas: image::RgbaImage,
    pub metrics: FontMetrics,
}

impl BakedFont {
    pub fn atlas_size(&self) -> [u32; 2] {
        [self.atlas.width(), self.atlas.height()]
    }

    /// Font spec for this atlas once it is saved at `atlas_path`.
    pub fn to_spec(&self, name: impl Into<String>, atlas_path: impl Into<PathBuf>) -> FontSpec {
        FontSpec::new(name, atlas_path, self.atlas_size(), self.metrics.clone())
    }
}

/// Shelf packer over a top-down image.
struct Shelf {
    size: [u32; 2],
    padding: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl Shelf {
    fn new(size: [u32; 2], padding: u32) -> Self {
        Self {
            size,
            padding,
            cursor_x: padding,
            cursor_y: padding,
            row_height: 0,
        }
    }

    /// Top-left corner for a `w`×`h` glyph, or `None` when the atlas is full.
    fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if self.cursor_x + w + self.padding > self.size[0] {
            self.cursor_y += self.row_height + self.padding;
            self.cursor_x = self.padding;
            self.row_height = 0;
        }
        if self.cursor_x + w + self.padding > self.size[0]
            || self.cursor_y + h + self.padding > self.size[1]
        {
            return None;
        }

        let at = (self.cursor_x, self.cursor_y);
        self.cursor_x += w + self.padding;
        self.row_height = self.row_height.max(h);
        Some(at)
    }
}

pub fn bake_font(ttf: &[u8], settings: &FontBakeSettings) -> Result<BakedFont, FontBakeError> {
    let px = settings.px.max(1.0);
    let font = fontdue::Font::from_bytes(
        ttf,
        fontdue::FontSettings {
            scale: px,
            ..fontdue::FontSettings::default()
        },
    )
    .map_err(|e| FontBakeError::InvalidFont(e.to_string()))?;

    let [aw, ah] = settings.atlas_size;
    let mut atlas = image::RgbaImage::new(aw, ah);
    let mut shelf = Shelf::new(settings.atlas_size, settings.padding);
    let mut glyphs = BTreeMap::new();

    for &ch in &settings.charset {
        if font.lookup_glyph_index(ch) == 0 && ch != ' ' {
            log::debug!("font has no glyph for {ch:?}; skipped");
            continue;
        }

        let (m, bitmap) = font.rasterize(ch, px);
        let (w, h) = (m.width as u32, m.height as u32);
        let mut glyph = GlyphMetrics {
            advance: m.advance_width / px,
            ..GlyphMetrics::default()
        };

        // Fonts without a space glyph rasterize `.notdef` for it.
        if w > 0 && h > 0 && !ch.is_whitespace() {
            let (gx, gy) = shelf.place(w, h).ok_or(FontBakeError::AtlasFull {
                ch,
                size: settings.atlas_size,
            })?;

            for (row, line) in bitmap.chunks(m.width).enumerate() {
                for (col, &coverage) in line.iter().enumerate() {
                    atlas.put_pixel(
                        gx + col as u32,
                        gy + row as u32,
                        image::Rgba([255, 255, 255, coverage]),
                    );
                }
            }

            let (left, bottom) = (m.xmin as f32, m.ymin as f32);
            glyph.plane_bounds = [
                left / px,
                bottom / px,
                (left + w as f32) / px,
                (bottom + h as f32) / px,
            ];
            // Bottom-left origin, matching the flipped upload.
            let top = ah - gy;
            glyph.atlas_bounds = [gx as f32, (top - h) as f32, (gx + w) as f32, top as f32];
        }

        glyphs.insert(ch as u32, glyph);
    }

    let (ascender, descender, line_height) = match font.horizontal_line_metrics(px) {
        Some(lm) => (lm.ascent / px, lm.descent / px, lm.new_line_size / px),
        None => (0.8, -0.2, 1.2),
    };

    log::debug!(
        "baked {} glyphs at {px}px into a {aw}x{ah} atlas",
        glyphs.len()
    );

    Ok(BakedFont {
        atlas,
        metrics: FontMetrics {
            em_size: px,
            line_height,
            ascender,
            descender,
            glyphs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps only `A` (advance 540, 1000 units per em).
    const DEMO_TTF: &[u8] = include_bytes!("../../testdata/demo.ttf");

    fn settings(charset: &str) -> FontBakeSettings {
        FontBakeSettings {
            charset: charset.chars().collect(),
            ..FontBakeSettings::default()
        }
    }

    #[test]
    fn shelf_wraps_rows_and_reports_full() {
        let mut shelf = Shelf::new([12, 12], 1);
        assert_eq!(shelf.place(4, 3), Some((1, 1)));
        assert_eq!(shelf.place(4, 2), Some((6, 1)));
        // Next glyph does not fit horizontally: new row below the tallest.
        assert_eq!(shelf.place(4, 4), Some((1, 5)));
        assert_eq!(shelf.place(4, 4), Some((6, 5)));
        assert_eq!(shelf.place(4, 4), None);
    }

    #[test]
    fn oversized_glyph_never_fits() {
        let mut shelf = Shelf::new([8, 8], 1);
        assert_eq!(shelf.place(9, 1), None);
    }

    #[test]
    fn garbage_bytes_are_invalid_font() {
        let err = bake_font(b"not a font", &FontBakeSettings::default()).unwrap_err();
        assert!(matches!(err, FontBakeError::InvalidFont(_)));
    }

    #[test]
    fn bakes_mapped_glyphs_and_skips_the_rest() {
        let baked = bake_font(DEMO_TTF, &settings("AB ")).unwrap();
        let metrics = &baked.metrics;

        let a = metrics.glyph('A').unwrap();
        assert!(a.is_visible());
        assert!((a.advance - 0.54).abs() < 1e-3);
        let [l, b, r, t] = a.atlas_bounds;
        assert!(r > l && t > b && t <= 512.0);

        assert!(metrics.glyph('B').is_none());
        let space = metrics.glyph(' ').unwrap();
        assert!(!space.is_visible());

        assert!((metrics.ascender - 1.024).abs() < 1e-3);
        assert!((metrics.line_height - 1.424).abs() < 1e-3);
        assert_eq!(metrics.em_size, 32.0);
    }

    #[test]
    fn glyph_coverage_lands_inside_its_bounds() {
        let baked = bake_font(DEMO_TTF, &settings("A")).unwrap();
        let [l, b, r, t] = baked.metrics.glyph('A').unwrap().atlas_bounds;
        let ah = baked.atlas.height();

        // Bounds count rows from the bottom; the image is stored top-down.
        let (x0, x1) = (l as u32, r as u32);
        let (y0, y1) = (ah - t as u32, ah - b as u32);
        let inside = (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .map(|(x, y)| baked.atlas.get_pixel(x, y)[3])
            .max()
            .unwrap();
        assert!(inside > 0);

        let total: u64 = baked.atlas.pixels().map(|p| p[3] as u64).sum();
        let within: u64 = (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .map(|(x, y)| baked.atlas.get_pixel(x, y)[3] as u64)
            .sum();
        assert_eq!(total, within);

        let spec = baked.to_spec("demo", "demo.png");
        assert_eq!(spec.atlas_size, [512, 512]);
    }

    #[test]
    fn tiny_atlas_overflows() {
        let settings = FontBakeSettings {
            atlas_size: [16, 16],
            ..settings("A")
        };
        assert!(matches!(
            bake_font(DEMO_TTF, &settings),
            Err(FontBakeError::AtlasFull { ch: 'A', size: [16, 16] })
        ));
    }
}
