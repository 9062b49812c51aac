use anyhow::{Context, Result, anyhow};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::glyphs::page_glyphs;
use super::{FontReference, GlyphRecord, Mutool, PageCanvas, SourceDocument, parse_stext};
use crate::fonts::{FontFormat, FontHandle, FontMetrics, FontSource, winansi_code};
use crate::geom::Rect;
use crate::reflow::PositionedSegment;
use crate::span::{TextSpan, strip_subset_prefix};

const LETTER: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};
const MAX_TREE_DEPTH: usize = 32;
const TOUNICODE_CHUNK: usize = 100;

/// Operators that may appear inside `BT`/`ET` but still affect graphics
/// outside the text object.
const KEEP_IN_TEXT: &[&str] = &[
    "g", "G", "rg", "RG", "k", "K", "cs", "CS", "sc", "SC", "scn", "SCN", "gs", "w", "J", "j",
    "M", "d", "ri", "i", "BMC", "BDC", "EMC", "MP", "DP",
];

pub(super) fn deref<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

pub(super) fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|object| deref(doc, object))
}

pub(super) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

pub(super) fn name_text(object: &Object) -> Option<String> {
    object
        .as_name()
        .ok()
        .map(|name| String::from_utf8_lossy(name).into_owned())
}

fn pdf_name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Walks the page tree upwards for an inheritable page attribute.
pub(super) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(value) = lookup(doc, current, key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn rect_from(doc: &Document, object: &Object) -> Option<Rect> {
    let values: Vec<f32> = deref(doc, object)
        .as_array()
        .ok()?
        .iter()
        .filter_map(|value| number(deref(doc, value)))
        .collect();
    (values.len() == 4).then(|| Rect::new(values[0], values[1], values[2], values[3]))
}

/// Visible page area: CropBox, else MediaBox, else US Letter.
pub(super) fn page_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"CropBox")
        .and_then(|object| rect_from(doc, object))
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|object| rect_from(doc, object)))
        .unwrap_or(LETTER)
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

pub(super) fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Font dictionaries of a document keyed by `BaseFont`, with the object id of
/// the embedded program stream when there is one.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontTable {
    fonts: BTreeMap<String, Option<ObjectId>>,
}

impl FontTable {
    pub(crate) fn from_document(doc: &Document) -> Self {
        let mut fonts = BTreeMap::new();
        for object in doc.objects.values() {
            let Ok(dict) = object.as_dict() else {
                continue;
            };
            if lookup(doc, dict, b"Type").and_then(name_text).as_deref() != Some("Font") {
                continue;
            }
            let subtype = lookup(doc, dict, b"Subtype").and_then(name_text);
            // descendants are reached through their Type0 parent
            if matches!(subtype.as_deref(), Some("CIDFontType0" | "CIDFontType2")) {
                continue;
            }
            let Some(base_font) = lookup(doc, dict, b"BaseFont").and_then(name_text) else {
                continue;
            };
            let program = font_program_id(doc, dict, subtype.as_deref());
            let entry = fonts.entry(base_font).or_insert(None);
            if entry.is_none() {
                *entry = program;
            }
        }
        Self { fonts }
    }

    pub(crate) fn references(&self) -> Vec<FontReference> {
        self.fonts
            .iter()
            .map(|(id, program)| FontReference {
                id: id.clone(),
                embedded: program.is_some(),
            })
            .collect()
    }

    fn program_id(&self, font_id: &str) -> Option<ObjectId> {
        if let Some(found) = self.fonts.get(font_id) {
            return *found;
        }
        let bare = strip_subset_prefix(font_id);
        self.fonts
            .iter()
            .find(|(id, _)| strip_subset_prefix(id) == bare)
            .and_then(|(_, program)| *program)
    }

    pub(crate) fn program(&self, doc: &Document, font_id: &str) -> Result<Option<Vec<u8>>> {
        let Some(id) = self.program_id(font_id) else {
            return Ok(None);
        };
        let stream = doc
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|err| anyhow!("font program of {} unreadable: {}", font_id, err))?;
        Ok(Some(stream_bytes(stream)))
    }
}

fn font_program_id(doc: &Document, dict: &Dictionary, subtype: Option<&str>) -> Option<ObjectId> {
    let descriptor_owner = if subtype == Some("Type0") {
        lookup(doc, dict, b"DescendantFonts")?
            .as_array()
            .ok()?
            .first()
            .map(|object| deref(doc, object))?
            .as_dict()
            .ok()?
    } else {
        dict
    };
    let descriptor = lookup(doc, descriptor_owner, b"FontDescriptor")?
        .as_dict()
        .ok()?;
    ["FontFile2", "FontFile3", "FontFile"]
        .iter()
        .find_map(|key| descriptor.get(key.as_bytes()).ok()?.as_reference().ok())
}

/// Source document backed by `lopdf` for structure and `mutool` for text.
pub struct PdfSource {
    path: PathBuf,
    document: Document,
    pages: Vec<ObjectId>,
    fonts: FontTable,
    mutool: Mutool,
}

impl PdfSource {
    pub fn open(path: &Path, mutool: Mutool) -> Result<Self> {
        let document = Document::load(path)
            .with_context(|| format!("failed to open pdf: {}", path.display()))?;
        let pages = page_ids(&document);
        for (index, page_id) in pages.iter().enumerate() {
            let rotation = inherited(&document, *page_id, b"Rotate")
                .and_then(number)
                .unwrap_or(0.0);
            if rotation.rem_euclid(360.0) != 0.0 {
                warn!(
                    "page {} is rotated {} degrees; text is placed unrotated",
                    index + 1,
                    rotation
                );
            }
        }
        let fonts = FontTable::from_document(&document);
        info!(
            "opened {} ({} pages, {} fonts)",
            path.display(),
            pages.len(),
            fonts.fonts.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
            fonts,
            mutool,
        })
    }

}

impl FontSource for PdfSource {
    fn font_program(&self, font_id: &str) -> Result<Option<Vec<u8>>> {
        self.fonts.program(&self.document, font_id)
    }
}

impl SourceDocument for PdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn font_references(&self) -> Vec<FontReference> {
        self.fonts.references()
    }

    fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>> {
        let xml = self.mutool.stext(&self.path, page)?;
        let pages = parse_stext(&xml)?;
        Ok(pages
            .into_iter()
            .next()
            .map(|page| page.spans)
            .unwrap_or_default())
    }

    fn page_glyphs(&self, page: usize) -> Result<Vec<GlyphRecord>> {
        let page_id = *self
            .pages
            .get(page)
            .ok_or_else(|| anyhow!("page {} out of range (1-{})", page + 1, self.pages.len()))?;
        page_glyphs(&self.document, page_id)
    }
}

/// Drops text objects from a content stream, keeping the graphics state
/// operators they carry.
pub(crate) fn strip_text(content: &[u8]) -> Result<Vec<u8>> {
    let content =
        Content::decode(content).map_err(|err| anyhow!("failed to decode page content: {}", err))?;
    let mut kept = Vec::with_capacity(content.operations.len());
    let mut in_text = false;
    for operation in content.operations {
        match operation.operator.as_str() {
            "BT" => in_text = true,
            "ET" => in_text = false,
            operator => {
                if !in_text || KEEP_IN_TEXT.contains(&operator) {
                    kept.push(operation);
                }
            }
        }
    }
    Content { operations: kept }
        .encode()
        .map_err(|err| anyhow!("failed to encode page content: {}", err))
}

struct FileFont {
    metrics: Arc<FontMetrics>,
    base_name: String,
    used: BTreeMap<u16, char>,
}

enum FontKind {
    Builtin,
    File(FileFont),
}

struct PlacedFont {
    resource: String,
    object_id: ObjectId,
    kind: FontKind,
}

struct PageState {
    page_id: ObjectId,
    bbox: Rect,
    background: Vec<u8>,
    text: Vec<Operation>,
    fonts: BTreeSet<FontHandle>,
}

/// Output document: a copy of the source whose pages lose their text and
/// receive the translated runs.
pub struct PdfWriter {
    document: Document,
    pages: Vec<ObjectId>,
    /// Keyed by the whole handle: one name may come from different files.
    fonts: HashMap<FontHandle, PlacedFont>,
    current: Option<PageState>,
}

impl PdfWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .with_context(|| format!("failed to open pdf: {}", path.display()))?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: Document) -> Self {
        let pages = page_ids(&document);
        Self {
            document,
            pages,
            fonts: HashMap::new(),
            current: None,
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        if self.current.is_some() {
            self.finish_page()?;
        }
        self.write_font_objects();
        self.document.prune_objects();
        self.document.compress();
        self.document
            .save(path)
            .with_context(|| format!("failed to write pdf: {}", path.display()))?;
        info!("wrote {}", path.display());
        Ok(())
    }

    fn encode_text(&mut self, segment: &PositionedSegment) -> Result<(String, Object)> {
        let placed = self
            .fonts
            .get_mut(&segment.font)
            .ok_or_else(|| anyhow!("font {} is not registered", segment.font.name))?;
        let encoded = match &mut placed.kind {
            FontKind::Builtin => {
                let bytes = segment
                    .text
                    .chars()
                    .map(|ch| winansi_code(ch).unwrap_or(b'?'))
                    .collect();
                Object::String(bytes, StringFormat::Literal)
            }
            FontKind::File(font) => {
                let space = font.metrics.glyph_id(' ');
                let mut glyphs = Vec::with_capacity(segment.text.len());
                for ch in segment.text.chars() {
                    let glyph = match font.metrics.glyph_id(ch) {
                        Some(glyph) => glyph,
                        None if ch.is_whitespace() => space.ok_or_else(|| {
                            anyhow!("font {} has no space glyph", segment.font.name)
                        })?,
                        None => {
                            return Err(anyhow!(
                                "font {} has no glyph for {:?}",
                                segment.font.name,
                                ch
                            ));
                        }
                    };
                    glyphs.push((glyph, ch));
                }
                let mut bytes = Vec::with_capacity(glyphs.len() * 2);
                for (glyph, ch) in glyphs {
                    font.used.entry(glyph).or_insert(ch);
                    bytes.extend_from_slice(&glyph.to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        };
        Ok((placed.resource.clone(), encoded))
    }

    fn write_font_objects(&mut self) {
        let mut pending = Vec::new();
        for placed in self.fonts.values() {
            if let FontKind::File(font) = &placed.kind {
                pending.push((
                    placed.object_id,
                    font.metrics.clone(),
                    font.base_name.clone(),
                    font.used.clone(),
                ));
            }
        }
        for (object_id, metrics, base_name, used) in pending {
            let type0 = composite_font(&mut self.document, &metrics, &base_name, &used);
            self.document
                .objects
                .insert(object_id, Object::Dictionary(type0));
        }
    }

    fn page_resources(&self, page_id: ObjectId) -> Dictionary {
        inherited(&self.document, page_id, b"Resources")
            .and_then(|object| object.as_dict().ok())
            .cloned()
            .unwrap_or_default()
    }
}

impl PageCanvas for PdfWriter {
    fn begin_page(&mut self, page: usize) -> Result<()> {
        if self.current.is_some() {
            self.finish_page()?;
        }
        let page_id = *self
            .pages
            .get(page)
            .ok_or_else(|| anyhow!("page {} out of range (1-{})", page + 1, self.pages.len()))?;
        let content = self
            .document
            .get_page_content(page_id)
            .with_context(|| format!("failed to read content of page {}", page + 1))?;
        let background = strip_text(&content)?;
        self.current = Some(PageState {
            page_id,
            bbox: page_box(&self.document, page_id),
            background,
            text: Vec::new(),
            fonts: BTreeSet::new(),
        });
        Ok(())
    }

    fn register_font(&mut self, font: &FontHandle) -> Result<()> {
        if self.fonts.contains_key(font) {
            return Ok(());
        }
        let resource = format!("TF{}", self.fonts.len() + 1);
        let placed = match font.file_path.as_deref() {
            None => {
                let dict = Dictionary::from_iter([
                    ("Type", pdf_name("Font")),
                    ("Subtype", pdf_name("Type1")),
                    ("BaseFont", pdf_name(&font.name)),
                    ("Encoding", pdf_name("WinAnsiEncoding")),
                ]);
                PlacedFont {
                    resource,
                    object_id: self.document.add_object(dict),
                    kind: FontKind::Builtin,
                }
            }
            Some(path) => {
                let metrics = FontMetrics::load(path)?;
                PlacedFont {
                    resource,
                    object_id: self.document.new_object_id(),
                    kind: FontKind::File(FileFont {
                        metrics: Arc::new(metrics),
                        base_name: postscript_safe(&font.name),
                        used: BTreeMap::new(),
                    }),
                }
            }
        };
        debug!("registered font {} as /{}", font.name, placed.resource);
        self.fonts.insert(font.clone(), placed);
        Ok(())
    }

    fn insert_text(&mut self, segment: &PositionedSegment) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow!("no page is open"));
        }
        self.register_font(&segment.font)?;
        let (resource, encoded) = self.encode_text(segment)?;
        let state = self
            .current
            .as_mut()
            .ok_or_else(|| anyhow!("no page is open"))?;
        let x = segment.origin.x + state.bbox.x0;
        let y = state.bbox.y1 - segment.origin.y;
        state.text.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(resource.as_bytes().to_vec()), segment.size.into()],
            ),
            Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
            ),
            Operation::new("Tj", vec![encoded]),
            Operation::new("ET", vec![]),
        ]);
        state.fonts.insert(segment.font.clone());
        Ok(())
    }

    fn finish_page(&mut self) -> Result<()> {
        let Some(state) = self.current.take() else {
            return Ok(());
        };
        let mut background = b"q\n".to_vec();
        background.extend_from_slice(&state.background);
        background.extend_from_slice(b"\nQ\n");

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new("g", vec![0.into()]),
        ];
        operations.extend(state.text);
        operations.push(Operation::new("Q", vec![]));
        let text = Content { operations }
            .encode()
            .map_err(|err| anyhow!("failed to encode text content: {}", err))?;

        let background_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), background));
        let text_id = self.document.add_object(Stream::new(Dictionary::new(), text));

        let mut resources = self.page_resources(state.page_id);
        let mut font_dict = resources
            .get(b"Font")
            .ok()
            .map(|object| deref(&self.document, object))
            .and_then(|object| object.as_dict().ok())
            .cloned()
            .unwrap_or_default();
        for handle in &state.fonts {
            if let Some(placed) = self.fonts.get(handle) {
                font_dict.set(placed.resource.as_bytes(), Object::Reference(placed.object_id));
            }
        }
        resources.set("Font", Object::Dictionary(font_dict));

        let page = self
            .document
            .get_object_mut(state.page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| anyhow!("page object is not a dictionary: {}", err))?;
        page.set(
            "Contents",
            Object::Array(vec![
                Object::Reference(background_id),
                Object::Reference(text_id),
            ]),
        );
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }
}

fn postscript_safe(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    if cleaned.is_empty() {
        "Font".to_string()
    } else {
        cleaned
    }
}

fn composite_font(
    doc: &mut Document,
    metrics: &FontMetrics,
    base_name: &str,
    used: &BTreeMap<u16, char>,
) -> Dictionary {
    let scale = 1000.0 / metrics.units_per_em() as f32;
    let scaled = |value: i16| Object::Integer((value as f32 * scale).round() as i64);
    let [x0, y0, x1, y1] = metrics.bbox();
    let cff = metrics.format() == FontFormat::OpenTypeCff;

    let mut file_dict = Dictionary::new();
    if cff {
        file_dict.set("Subtype", pdf_name("OpenType"));
    } else {
        file_dict.set("Length1", Object::Integer(metrics.data().len() as i64));
    }
    let file_id = doc.add_object(Stream::new(file_dict, metrics.data().to_vec()));

    let mut flags = 32;
    if metrics.italic_angle() != 0.0 {
        flags |= 64;
    }
    let mut descriptor = Dictionary::from_iter([
        ("Type", pdf_name("FontDescriptor")),
        ("FontName", pdf_name(base_name)),
        ("Flags", Object::Integer(flags)),
        (
            "FontBBox",
            Object::Array(vec![scaled(x0), scaled(y0), scaled(x1), scaled(y1)]),
        ),
        ("ItalicAngle", Object::Real(metrics.italic_angle())),
        ("Ascent", scaled(metrics.ascender())),
        ("Descent", scaled(metrics.descender())),
        ("CapHeight", scaled(metrics.ascender())),
        ("StemV", Object::Integer(80)),
    ]);
    let file_key = if cff { "FontFile3" } else { "FontFile2" };
    descriptor.set(file_key, Object::Reference(file_id));
    let descriptor_id = doc.add_object(descriptor);

    let mut widths = Vec::with_capacity(used.len() * 2);
    for glyph in used.keys() {
        widths.push(Object::Integer(*glyph as i64));
        widths.push(Object::Array(vec![Object::Integer(
            metrics.glyph_width_milli(*glyph).round() as i64,
        )]));
    }
    let mut cid_font = Dictionary::from_iter([
        ("Type", pdf_name("Font")),
        (
            "Subtype",
            pdf_name(if cff { "CIDFontType0" } else { "CIDFontType2" }),
        ),
        ("BaseFont", pdf_name(base_name)),
        (
            "CIDSystemInfo",
            Object::Dictionary(Dictionary::from_iter([
                ("Registry", Object::string_literal("Adobe")),
                ("Ordering", Object::string_literal("Identity")),
                ("Supplement", Object::Integer(0)),
            ])),
        ),
        ("FontDescriptor", Object::Reference(descriptor_id)),
        ("DW", Object::Integer(1000)),
        ("W", Object::Array(widths)),
    ]);
    if !cff {
        cid_font.set("CIDToGIDMap", pdf_name("Identity"));
    }
    let cid_id = doc.add_object(cid_font);
    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(used).into_bytes(),
    ));

    Dictionary::from_iter([
        ("Type", pdf_name("Font")),
        ("Subtype", pdf_name("Type0")),
        ("BaseFont", pdf_name(base_name)),
        ("Encoding", pdf_name("Identity-H")),
        ("DescendantFonts", Object::Array(vec![Object::Reference(cid_id)])),
        ("ToUnicode", Object::Reference(to_unicode_id)),
    ])
}

pub(crate) fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &char)> = used.iter().collect();
    for chunk in entries.chunks(TOUNICODE_CHUNK) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (glyph, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", glyph, hex);
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}
