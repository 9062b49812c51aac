use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use ttf_parser::{Face, GlyphId};

use super::standard::standard_width;
use super::{FontFormat, FontHandle};

/// Horizontal advance of `text` at `size`, in page units.
pub trait Measure {
    fn text_width(&self, text: &str, font: &FontHandle, size: f32) -> f32;
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    format: FontFormat,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    bbox: [i16; 4],
    italic_angle: f32,
}

impl FontMetrics {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        Self::from_data(data)
            .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
    }

    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        let format =
            FontFormat::detect(&data).ok_or_else(|| anyhow!("unsupported font signature"))?;
        let face = Face::parse(&data, 0).map_err(|err| anyhow!("{}", err))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 4);
        let rect = face.global_bounding_box();
        let ascender = face.ascender();
        let descender = face.descender();
        let italic_angle = face.italic_angle();
        Ok(Self {
            format,
            units_per_em,
            space_advance,
            ascender,
            descender,
            bbox: [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
            italic_angle,
            data: Arc::new(data),
        })
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn format(&self) -> FontFormat {
        self.format
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    pub fn descender(&self) -> i16 {
        self.descender
    }

    pub fn bbox(&self) -> [i16; 4] {
        self.bbox
    }

    pub fn italic_angle(&self) -> f32 {
        self.italic_angle
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        let face = Face::parse(&self.data, 0).ok()?;
        face.glyph_index(ch).map(|id| id.0)
    }

    pub fn glyph_advance(&self, glyph: u16) -> u16 {
        Face::parse(&self.data, 0)
            .ok()
            .and_then(|face| face.glyph_hor_advance(GlyphId(glyph)))
            .unwrap_or(self.space_advance)
    }

    /// Advance scaled to 1/1000 em, the unit PDF width arrays use.
    pub fn glyph_width_milli(&self, glyph: u16) -> f32 {
        self.glyph_advance(glyph) as f32 * 1000.0 / self.units_per_em as f32
    }

    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, 0) else {
            return estimate_text_width_units(text) * size;
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * (size / self.units_per_em as f32)
    }
}

/// Parsed metrics for every handle a run renders with.
#[derive(Default)]
pub struct FontBook {
    metrics: HashMap<String, Option<Arc<FontMetrics>>>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the handle's file once; failures are remembered as `None`.
    pub fn ensure(&mut self, handle: &FontHandle) -> Option<Arc<FontMetrics>> {
        if let Some(existing) = self.metrics.get(&handle.name) {
            return existing.clone();
        }
        let loaded = match handle.file_path.as_deref() {
            Some(path) => match FontMetrics::load(path) {
                Ok(metrics) => Some(Arc::new(metrics)),
                Err(err) => {
                    warn!("font metrics unavailable for {}: {:#}", handle.name, err);
                    None
                }
            },
            None => None,
        };
        self.metrics.insert(handle.name.clone(), loaded.clone());
        loaded
    }

    pub fn get(&self, handle: &FontHandle) -> Option<&Arc<FontMetrics>> {
        self.metrics.get(&handle.name).and_then(Option::as_ref)
    }
}

impl Measure for FontBook {
    fn text_width(&self, text: &str, font: &FontHandle, size: f32) -> f32 {
        if font.is_builtin() {
            let units: u32 = text
                .chars()
                .filter(|ch| *ch != '\n')
                .map(|ch| standard_width(&font.name, ch) as u32)
                .sum();
            return units as f32 * size / 1000.0;
        }
        match self.get(font) {
            Some(metrics) => metrics.text_width(text, size),
            None => estimate_text_width_units(text) * size,
        }
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_width_uses_standard_tables() {
        let book = FontBook::new();
        let helvetica = FontHandle::builtin("Helvetica");
        let width = book.text_width("AA", &helvetica, 10.0);
        assert!((width - 13.34).abs() < 0.01);
    }

    #[test]
    fn unreadable_file_falls_back_to_estimate() {
        let mut book = FontBook::new();
        let broken = FontHandle::file("Broken", "/no/such/font.ttf");
        assert!(book.ensure(&broken).is_none());
        let width = book.text_width("ab", &broken, 10.0);
        assert!((width - 11.0).abs() < 0.01);
    }

    #[test]
    fn garbage_data_is_rejected() {
        assert!(FontMetrics::from_data(b"not a font".to_vec()).is_err());
        assert!(FontMetrics::from_data(vec![0, 1, 0, 0, 0, 0]).is_err());
    }
}
