use serde::Serialize;

use crate::geom::{Point, Rect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleFlags {
    pub bold: bool,
    pub italic: bool,
}

impl StyleFlags {
    /// Best-effort: reads style words out of the font name. Fonts whose style
    /// tokens are not English (e.g. "Fett", "Gras") are classified as regular.
    pub fn from_font_name(font_id: &str) -> Self {
        Self {
            bold: font_id.contains("Bold"),
            italic: font_id.contains("Italic") || font_id.contains("Oblique"),
        }
    }

    pub fn style(&self) -> TextStyle {
        match (self.bold, self.italic) {
            (true, true) => TextStyle::BoldItalic,
            (true, false) => TextStyle::Bold,
            (false, true) => TextStyle::Italic,
            (false, false) => TextStyle::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl TextStyle {
    pub fn from_font_name(font_id: &str) -> Self {
        StyleFlags::from_font_name(font_id).style()
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, TextStyle::Bold | TextStyle::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, TextStyle::Italic | TextStyle::BoldItalic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextStyle::Normal => "normal",
            TextStyle::Bold => "bold",
            TextStyle::Italic => "italic",
            TextStyle::BoldItalic => "bolditalic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    pub text: String,
    pub origin: Point,
    pub bbox: Rect,
    pub size: f32,
    pub font_id: String,
    pub style: StyleFlags,
}

impl TextSpan {
    /// Returns `None` for whitespace-only text or a non-positive size. The box is
    /// widened to contain the origin when the extractor reports them apart.
    pub fn new(
        text: impl Into<String>,
        origin: Point,
        bbox: Rect,
        size: f32,
        font_id: impl Into<String>,
    ) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() || !(size > 0.0) {
            return None;
        }
        let font_id = font_id.into();
        let style = StyleFlags::from_font_name(&font_id);
        Some(Self {
            text,
            origin,
            bbox: bbox.include_point(origin),
            size,
            font_id,
            style,
        })
    }
}

/// Strips a subset tag such as `ABCDEF+` from a PostScript font name.
pub fn strip_subset_prefix(font_id: &str) -> &str {
    match font_id.split_once('+') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => font_id,
    }
}

/// Labels extractors report when they cannot name a font.
pub fn is_unidentified_font(font_id: &str) -> bool {
    let name = strip_subset_prefix(font_id.trim());
    if name.is_empty() {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    lower.starts_with("unnamed")
        || lower == "unknown"
        || lower == "type3"
        || lower == "(null)"
        || lower == "null"
}
