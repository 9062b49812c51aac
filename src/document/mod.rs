mod glyphs;
mod mutool;
mod pdf;
mod stext;

use anyhow::Result;
use quick_xml::events::BytesStart;

use crate::fonts::{FontHandle, FontSource};
use crate::geom::{Point, Rect};
use crate::reflow::PositionedSegment;
use crate::span::TextSpan;

pub use mutool::Mutool;
pub use pdf::{PdfSource, PdfWriter};
pub use stext::{StextPage, parse_stext};

/// A font dictionary the source document points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontReference {
    pub id: String,
    pub embedded: bool,
}

/// One character from the secondary (content stream) extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRecord {
    pub ch: char,
    pub origin: Point,
    pub bbox: Rect,
    pub size: f32,
    pub font_id: String,
}

/// Read side of a translation run. Page indices are zero-based and every
/// coordinate is in top-left page space.
pub trait SourceDocument: FontSource {
    fn page_count(&self) -> usize;
    fn font_references(&self) -> Vec<FontReference>;
    fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>>;
    fn page_glyphs(&self, page: usize) -> Result<Vec<GlyphRecord>>;

    fn is_embedded(&self, font_id: &str) -> bool {
        self.font_references()
            .iter()
            .any(|reference| reference.embedded && reference.id == font_id)
    }
}

/// Write side: a text-free copy of each source page that translated runs are
/// placed onto.
pub trait PageCanvas {
    fn begin_page(&mut self, page: usize) -> Result<()>;
    fn register_font(&mut self, font: &FontHandle) -> Result<()>;
    fn insert_text(&mut self, segment: &PositionedSegment) -> Result<()>;
    fn finish_page(&mut self) -> Result<()>;
}

pub(crate) fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attribute| attribute.key.as_ref() == name)
        .and_then(|attribute| attribute.unescape_value().ok())
        .map(|value| value.into_owned())
}

pub(crate) fn attr_f32(element: &BytesStart<'_>, name: &[u8]) -> Option<f32> {
    attr(element, name)?.trim().parse().ok()
}

pub(crate) fn attr_floats(element: &BytesStart<'_>, name: &[u8]) -> Option<Vec<f32>> {
    let value = attr(element, name)?;
    value
        .split_whitespace()
        .map(|part| part.parse::<f32>().ok())
        .collect()
}
