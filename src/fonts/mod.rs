mod catalog;
mod local;
mod metrics;
pub mod names;
mod resolver;
mod standard;
mod workspace;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::span::TextStyle;

pub use catalog::{CatalogFuture, FamilyCatalog, FamilyFiles, FontCatalog, GoogleFonts};
pub use local::{LocalFontEntry, LocalFontIndex};
pub use metrics::{FontBook, FontMetrics, Measure};
pub use resolver::{DefaultFontUrls, FamilyVariantSet, FontResolver, FontSource, ResolverOptions};
pub(crate) use standard::{standard_width, winansi_char, winansi_code};
pub use workspace::FontWorkspace;

pub const DEFAULT_KEY: &str = "default";
pub const DEFAULT_BOLD_KEY: &str = "default-bold";
pub const DEFAULT_ITALIC_KEY: &str = "default-italic";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FontHandle {
    pub name: String,
    pub file_path: Option<PathBuf>,
}

impl FontHandle {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: Some(path.into()),
        }
    }

    /// One of the standard PDF families every viewer carries.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.file_path.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Embedded,
    Local,
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFont {
    pub handle: FontHandle,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    OpenTypeCff,
}

impl FontFormat {
    /// Accepts TrueType (`00 01 00 00`, `true`) and CFF-flavoured OpenType (`OTTO`).
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..4)?;
        if header == [0x00, 0x01, 0x00, 0x00] || header == b"true" {
            Some(FontFormat::TrueType)
        } else if header == b"OTTO" {
            Some(FontFormat::OpenTypeCff)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::TrueType => "ttf",
            FontFormat::OpenTypeCff => "otf",
        }
    }
}

pub fn validate_font_file(path: &Path) -> Result<FontFormat> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("failed to open font: {}", path.display()))?;
    let mut header = [0u8; 4];
    file.read_exact(&mut header)
        .with_context(|| format!("font file too short: {}", path.display()))?;
    FontFormat::detect(&header)
        .ok_or_else(|| anyhow!("unsupported font signature: {}", path.display()))
}

/// Every name the run knows a font under, mapped to the handle it renders with.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    entries: BTreeMap<String, FontHandle>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FontHandle> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, handle: FontHandle) {
        self.entries.insert(name.into(), handle);
    }

    /// Inserts only when `name` is not taken yet; returns whether it was added.
    pub fn insert_alias(&mut self, name: impl Into<String>, handle: FontHandle) -> bool {
        let name = name.into();
        if name.is_empty() || self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, handle);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FontHandle)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultFonts {
    pub regular: FontHandle,
    pub bold: FontHandle,
    pub italic: FontHandle,
}

impl DefaultFonts {
    pub fn builtin() -> Self {
        Self {
            regular: FontHandle::builtin("Helvetica"),
            bold: FontHandle::builtin("Helvetica-Bold"),
            italic: FontHandle::builtin("Helvetica-Oblique"),
        }
    }

    pub fn for_style(&self, style: TextStyle) -> &FontHandle {
        match style {
            TextStyle::Bold | TextStyle::BoldItalic => &self.bold,
            TextStyle::Italic => &self.italic,
            TextStyle::Normal => &self.regular,
        }
    }

    /// Bold wins over italic, mirroring the three available defaults.
    pub fn for_font_name(&self, font_id: &str) -> &FontHandle {
        if font_id.contains("Bold") {
            &self.bold
        } else if font_id.contains("Italic") || font_id.contains("Oblique") {
            &self.italic
        } else {
            &self.regular
        }
    }

    pub fn contains(&self, handle: &FontHandle) -> bool {
        &self.regular == handle || &self.bold == handle || &self.italic == handle
    }
}

/// The four handles a block renders its style runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleFonts {
    pub normal: FontHandle,
    pub bold: FontHandle,
    pub italic: FontHandle,
    pub bold_italic: FontHandle,
}

impl StyleFonts {
    pub fn for_base(registry: &FontRegistry, defaults: &DefaultFonts, base: &FontHandle) -> Self {
        Self {
            normal: get_font_for_style(registry, defaults, base, TextStyle::Normal),
            bold: get_font_for_style(registry, defaults, base, TextStyle::Bold),
            italic: get_font_for_style(registry, defaults, base, TextStyle::Italic),
            bold_italic: get_font_for_style(registry, defaults, base, TextStyle::BoldItalic),
        }
    }

    pub fn get(&self, style: TextStyle) -> &FontHandle {
        match style {
            TextStyle::Normal => &self.normal,
            TextStyle::Bold => &self.bold,
            TextStyle::Italic => &self.italic,
            TextStyle::BoldItalic => &self.bold_italic,
        }
    }

    pub fn handles(&self) -> [&FontHandle; 4] {
        [&self.normal, &self.bold, &self.italic, &self.bold_italic]
    }
}

fn style_suffixes(style: TextStyle) -> &'static [&'static str] {
    match style {
        TextStyle::Normal => &["Regular", ""],
        TextStyle::Bold => &["Bold"],
        TextStyle::Italic => &["Italic", "Oblique"],
        TextStyle::BoldItalic => &["BoldItalic", "BoldOblique"],
    }
}

fn natural_names(base: &str, stem: &str, style: TextStyle) -> Vec<String> {
    let mut names = Vec::new();
    for suffix in style_suffixes(style) {
        if suffix.is_empty() {
            names.push(stem.to_string());
            continue;
        }
        names.push(format!("{stem}-{suffix}"));
        names.push(format!("{stem}{suffix}"));
        names.push(format!("{base}-{suffix}"));
        names.push(format!("{base}{suffix}"));
    }
    names
}

fn local_variant_search(
    registry: &FontRegistry,
    stem: &str,
    style: TextStyle,
) -> Option<FontHandle> {
    let token = names::letters_lower(stem);
    if token.is_empty() {
        return None;
    }
    registry
        .iter()
        .find(|(key, handle)| {
            names::letters_lower(key).contains(&token)
                && TextStyle::from_font_name(key) == style
                && TextStyle::from_font_name(&handle.name) == style
        })
        .map(|(_, handle)| handle.clone())
}

/// Sibling of `base` in the requested style, looked up in the registry only.
pub fn get_font_for_style(
    registry: &FontRegistry,
    defaults: &DefaultFonts,
    base: &FontHandle,
    style: TextStyle,
) -> FontHandle {
    if TextStyle::from_font_name(&base.name) == style {
        return base.clone();
    }
    let stem = names::family_stem(&base.name);
    for candidate in natural_names(&base.name, &stem, style) {
        if let Some(handle) = registry.get(&candidate)
            && TextStyle::from_font_name(&handle.name) == style
        {
            return handle.clone();
        }
    }
    if let Some(handle) = local_variant_search(registry, &stem, style) {
        return handle;
    }
    if let Some(regular) = names::regular_counterpart(&base.name)
        && let Some(handle) = registry.get(&regular)
    {
        return handle.clone();
    }
    defaults.for_style(style).clone()
}
