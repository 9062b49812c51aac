use anyhow::{Context, Result, anyhow};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::debug;

use super::GlyphRecord;
use super::pdf::{deref, inherited, lookup, name_text, number, page_box, stream_bytes};
use crate::fonts::{standard_width, winansi_char};
use crate::geom::{Point, Rect};

const DEFAULT_WIDTH: f32 = 500.0;
const ASCENT: f32 = 0.8;
const DESCENT: f32 = -0.2;
const MAX_RANGE: u32 = 0xFFFF;

static BFCHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").expect("regex"));
static BFRANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").expect("regex"));
static RANGE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f\s]*>|\[[^\]]*\])")
        .expect("regex")
});
static HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([0-9A-Fa-f\s]*)>").expect("regex"));

static DIGIT_NAMES: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// Glyphs of one page read straight from its content stream. Labels come
/// from the font dictionaries, so a font the text engine reports without a
/// name is still told apart here.
pub(crate) fn page_glyphs(doc: &Document, page_id: ObjectId) -> Result<Vec<GlyphRecord>> {
    let content = doc
        .get_page_content(page_id)
        .with_context(|| "failed to read page content")?;
    let content = Content::decode(&content)
        .map_err(|err| anyhow!("failed to decode page content: {}", err))?;
    let fonts = inherited(doc, page_id, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .and_then(|resources| lookup(doc, resources, b"Font"))
        .and_then(|object| object.as_dict().ok());
    let mut interpreter = Interpreter::new(doc, fonts, page_box(doc, page_id));
    for operation in &content.operations {
        interpreter.apply(operation);
    }
    debug!("glyph pass found {} glyphs", interpreter.glyphs.len());
    Ok(interpreter.glyphs)
}

/// Affine matrix `[a b c d e f]` in PDF order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        (values.len() == 6).then(|| {
            Matrix([
                values[0], values[1], values[2], values[3], values[4], values[5],
            ])
        })
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> Point {
        let [a, b, c, d, e, f] = self.0;
        Point::new(x * a + y * c + e, x * b + y * d + f)
    }

    fn scale(&self) -> f32 {
        let [a, b, c, d, _, _] = self.0;
        (a * d - b * c).abs().sqrt()
    }
}

enum Widths {
    Simple { first: u32, widths: Vec<f32> },
    Composite { widths: HashMap<u32, f32>, default: f32 },
}

struct GlyphFont {
    label: String,
    widths: Widths,
    /// Glyph space to text space, horizontally.
    unit: f32,
    /// Type3 fonts scale their size through `FontMatrix`.
    size_scale: f32,
    to_unicode: HashMap<u32, String>,
    differences: HashMap<u32, char>,
}

impl GlyphFont {
    fn load(doc: &Document, dict: &Dictionary, resource: &str) -> Self {
        let subtype = lookup(doc, dict, b"Subtype").and_then(name_text);
        let (unit, size_scale) = match subtype.as_deref() {
            Some("Type3") => font_matrix_scale(doc, dict),
            _ => (0.001, 1.0),
        };
        let widths = if subtype.as_deref() == Some("Type0") {
            composite_widths(doc, dict)
        } else {
            simple_widths(doc, dict)
        };
        let to_unicode = lookup(doc, dict, b"ToUnicode")
            .and_then(|object| object.as_stream().ok())
            .map(|stream| parse_to_unicode(&String::from_utf8_lossy(&stream_bytes(stream))))
            .unwrap_or_default();
        Self {
            label: font_label(doc, dict, subtype.as_deref(), resource),
            widths,
            unit,
            size_scale,
            to_unicode,
            differences: differences(doc, dict),
        }
    }

    fn composite(&self) -> bool {
        matches!(self.widths, Widths::Composite { .. })
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite() {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |code, byte| (code << 8) | *byte as u32))
                .collect()
        } else {
            bytes.iter().map(|byte| *byte as u32).collect()
        }
    }

    fn text_for(&self, code: u32) -> Option<String> {
        if let Some(text) = self.to_unicode.get(&code) {
            return Some(text.clone());
        }
        if let Some(ch) = self.differences.get(&code) {
            return Some(ch.to_string());
        }
        if self.composite() {
            return None;
        }
        u8::try_from(code)
            .ok()
            .and_then(winansi_char)
            .map(String::from)
    }

    /// Advance in glyph space units.
    fn width(&self, code: u32, text: Option<&str>) -> f32 {
        match &self.widths {
            Widths::Simple { widths, .. } if widths.is_empty() => text
                .and_then(|text| text.chars().next())
                .map(|ch| standard_width(&self.label, ch) as f32)
                .unwrap_or(DEFAULT_WIDTH),
            Widths::Simple { first, widths } => code
                .checked_sub(*first)
                .and_then(|index| widths.get(index as usize))
                .copied()
                .unwrap_or(DEFAULT_WIDTH),
            Widths::Composite { widths, default } => {
                widths.get(&code).copied().unwrap_or(*default)
            }
        }
    }
}

fn name_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    lookup(doc, dict, key)
        .and_then(name_text)
        .filter(|name| !name.trim().is_empty())
}

/// `BaseFont`, then the Type3 `Name`, then the descriptor's `FontName`,
/// else the subtype qualified by the resource key.
fn font_label(doc: &Document, dict: &Dictionary, subtype: Option<&str>, resource: &str) -> String {
    name_entry(doc, dict, b"BaseFont")
        .or_else(|| name_entry(doc, dict, b"Name"))
        .or_else(|| {
            let descriptor = lookup(doc, dict, b"FontDescriptor")?.as_dict().ok()?;
            name_entry(doc, descriptor, b"FontName")
        })
        .unwrap_or_else(|| format!("{}-{}", subtype.unwrap_or("Font"), resource))
}

fn font_matrix_scale(doc: &Document, dict: &Dictionary) -> (f32, f32) {
    let values: Vec<f32> = lookup(doc, dict, b"FontMatrix")
        .and_then(|object| object.as_array().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| number(deref(doc, value)))
                .collect()
        })
        .unwrap_or_default();
    match values.as_slice() {
        [a, b, c, d, _, _] => {
            let matrix = Matrix([*a, *b, *c, *d, 0.0, 0.0]);
            (*a, matrix.scale() * 1000.0)
        }
        _ => (0.001, 1.0),
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> Widths {
    let first = lookup(doc, dict, b"FirstChar")
        .and_then(number)
        .unwrap_or(0.0)
        .max(0.0) as u32;
    let widths = lookup(doc, dict, b"Widths")
        .and_then(|object| object.as_array().ok())
        .map(|values| {
            values
                .iter()
                .map(|value| number(deref(doc, value)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();
    Widths::Simple { first, widths }
}

fn composite_widths(doc: &Document, dict: &Dictionary) -> Widths {
    let descendant = lookup(doc, dict, b"DescendantFonts")
        .and_then(|object| object.as_array().ok())
        .and_then(|fonts| fonts.first())
        .map(|object| deref(doc, object))
        .and_then(|object| object.as_dict().ok());
    let Some(descendant) = descendant else {
        return Widths::Composite {
            widths: HashMap::new(),
            default: 1000.0,
        };
    };
    let default = lookup(doc, descendant, b"DW").and_then(number).unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let entries = lookup(doc, descendant, b"W")
        .and_then(|object| object.as_array().ok())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut index = 0;
    while index < entries.len() {
        let Some(start) = number(deref(doc, &entries[index])) else {
            break;
        };
        let start = start.max(0.0) as u32;
        match entries.get(index + 1).map(|object| deref(doc, object)) {
            Some(Object::Array(run)) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = number(deref(doc, width)) {
                        widths.insert(start + offset as u32, width);
                    }
                }
                index += 2;
            }
            Some(end) => {
                let width = entries
                    .get(index + 2)
                    .and_then(|object| number(deref(doc, object)));
                let (Some(end), Some(width)) = (number(end), width) else {
                    break;
                };
                let end = (end.max(0.0) as u32).min(start.saturating_add(MAX_RANGE));
                for cid in start..=end {
                    widths.insert(cid, width);
                }
                index += 3;
            }
            None => break,
        }
    }
    Widths::Composite { widths, default }
}

fn differences(doc: &Document, dict: &Dictionary) -> HashMap<u32, char> {
    let mut map = HashMap::new();
    let entries = lookup(doc, dict, b"Encoding")
        .and_then(|object| object.as_dict().ok())
        .and_then(|encoding| lookup(doc, encoding, b"Differences"))
        .and_then(|object| object.as_array().ok());
    let Some(entries) = entries else {
        return map;
    };
    let mut code = 0u32;
    for entry in entries {
        match deref(doc, entry) {
            Object::Integer(value) => code = (*value).max(0) as u32,
            Object::Name(name) => {
                if let Some(ch) = glyph_name_char(&String::from_utf8_lossy(name)) {
                    map.insert(code, ch);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

fn glyph_name_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Some(ch);
    }
    if let Some(hex) = name.strip_prefix("uni").filter(|hex| hex.len() == 4) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(digit) = DIGIT_NAMES.iter().position(|digit| *digit == name) {
        return char::from_digit(digit as u32, 10);
    }
    let ch = match name {
        "space" => ' ',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" => '-',
        "exclam" => '!',
        "question" => '?',
        "quoteleft" => '‘',
        "quoteright" => '’',
        "parenleft" => '(',
        "parenright" => ')',
        "slash" => '/',
        "ampersand" => '&',
        _ => return None,
    };
    Some(ch)
}

fn hex_digits(value: &str) -> String {
    value.chars().filter(|ch| !ch.is_whitespace()).collect()
}

fn hex_code(value: &str) -> Option<u32> {
    let digits = hex_digits(value);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// UTF-16BE text of a CMap destination string.
fn hex_text(value: &str) -> Option<String> {
    let digits = hex_digits(value);
    let units: Vec<u16> = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|unit| u16::from_str_radix(unit, 16).ok())
        })
        .collect::<Option<_>>()?;
    let text = String::from_utf16(&units).ok()?;
    (!text.is_empty()).then_some(text)
}

fn parse_to_unicode(cmap: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for section in BFCHAR.captures_iter(cmap) {
        let values: Vec<&str> = HEX
            .captures_iter(&section[1])
            .filter_map(|capture| capture.get(1))
            .map(|value| value.as_str())
            .collect();
        for pair in values.chunks(2) {
            if let [source, target] = pair
                && let (Some(code), Some(text)) = (hex_code(source), hex_text(target))
            {
                map.insert(code, text);
            }
        }
    }
    for section in BFRANGE.captures_iter(cmap) {
        for entry in RANGE_ENTRY.captures_iter(&section[1]) {
            let (Some(low), Some(high)) = (hex_code(&entry[1]), hex_code(&entry[2])) else {
                continue;
            };
            let high = high.min(low.saturating_add(MAX_RANGE));
            let target = &entry[3];
            if target.starts_with('[') {
                let targets = HEX
                    .captures_iter(target)
                    .filter_map(|capture| hex_text(&capture[1]));
                for (code, text) in (low..=high).zip(targets) {
                    map.insert(code, text);
                }
                continue;
            }
            let Some(start) = HEX.captures(target).and_then(|capture| hex_text(&capture[1]))
            else {
                continue;
            };
            // consecutive codes step the last character
            let mut prefix: Vec<char> = start.chars().collect();
            let Some(last) = prefix.pop() else {
                continue;
            };
            let prefix: String = prefix.into_iter().collect();
            for (offset, code) in (low..=high).enumerate() {
                if let Some(ch) = char::from_u32(last as u32 + offset as u32) {
                    map.insert(code, format!("{prefix}{ch}"));
                }
            }
        }
    }
    map
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<String>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    font_dict: Option<&'a Dictionary>,
    fonts: HashMap<String, Option<Rc<GlyphFont>>>,
    page: Rect,
    ctm: Matrix,
    state: TextState,
    stack: Vec<(Matrix, TextState)>,
    tm: Matrix,
    tlm: Matrix,
    glyphs: Vec<GlyphRecord>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, font_dict: Option<&'a Dictionary>, page: Rect) -> Self {
        Self {
            doc,
            font_dict,
            fonts: HashMap::new(),
            page,
            ctm: Matrix::IDENTITY,
            state: TextState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            glyphs: Vec::new(),
        }
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = operation.operands.as_slice();
        let value = |index: usize| operands.get(index).and_then(number);
        match operation.operator.as_str() {
            "q" => self.stack.push((self.ctm, self.state.clone())),
            "Q" => {
                if let Some((ctm, state)) = self.stack.pop() {
                    self.ctm = ctm;
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.ctm = matrix.then(&self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(name_text) {
                    self.state.font = Some(name);
                }
                if let Some(size) = value(1) {
                    self.state.size = size;
                }
            }
            "Tc" => self.state.char_spacing = value(0).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = value(0).unwrap_or(0.0),
            "Tz" => self.state.horizontal_scale = value(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = value(0).unwrap_or(0.0),
            "Ts" => self.state.rise = value(0).unwrap_or(0.0),
            "Td" => self.move_line(value(0).unwrap_or(0.0), value(1).unwrap_or(0.0)),
            "TD" => {
                let ty = value(1).unwrap_or(0.0);
                self.state.leading = -ty;
                self.move_line(value(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.tm = matrix;
                    self.tlm = matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = operands.first() {
                    for part in parts {
                        match part {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0
                                        * self.state.size
                                        * self.state.horizontal_scale;
                                    self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                                }
                            }
                        }
                    }
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.state.word_spacing = value(0).unwrap_or(0.0);
                self.state.char_spacing = value(1).unwrap_or(0.0);
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn font(&mut self) -> Option<Rc<GlyphFont>> {
        let name = self.state.font.clone()?;
        if let Some(font) = self.fonts.get(&name) {
            return font.clone();
        }
        let loaded = self
            .font_dict
            .and_then(|fonts| lookup(self.doc, fonts, name.as_bytes()))
            .and_then(|object| object.as_dict().ok())
            .map(|dict| Rc::new(GlyphFont::load(self.doc, dict, &name)));
        if loaded.is_none() {
            debug!("font resource /{} not found", name);
        }
        self.fonts.insert(name, loaded.clone());
        loaded
    }

    fn to_page(&self, point: Point) -> Point {
        Point::new(point.x - self.page.x0, self.page.y1 - point.y)
    }

    fn show(&mut self, bytes: &[u8]) {
        let Some(font) = self.font() else {
            return;
        };
        let state = self.state.clone();
        for code in font.codes(bytes) {
            let text = font.text_for(code);
            let width = font.width(code, text.as_deref()) * font.unit;
            let trm = Matrix([
                state.size * state.horizontal_scale,
                0.0,
                0.0,
                state.size,
                0.0,
                state.rise,
            ])
            .then(&self.tm)
            .then(&self.ctm);
            let size = state.size * self.tm.then(&self.ctm).scale() * font.size_scale;
            if let Some(text) = text {
                let chars: Vec<char> = text.chars().collect();
                let share = width / chars.len().max(1) as f32;
                for (index, ch) in chars.into_iter().enumerate() {
                    let x0 = share * index as f32;
                    let x1 = x0 + share;
                    let corners = [
                        trm.apply(x0, DESCENT),
                        trm.apply(x1, DESCENT),
                        trm.apply(x1, ASCENT),
                        trm.apply(x0, ASCENT),
                    ]
                    .map(|corner| self.to_page(corner));
                    let bbox = corners[1..].iter().fold(
                        Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y),
                        |rect, corner| rect.include_point(*corner),
                    );
                    let origin = self.to_page(trm.apply(x0, 0.0));
                    self.glyphs.push(GlyphRecord {
                        ch,
                        origin,
                        bbox,
                        size,
                        font_id: font.label.clone(),
                    });
                }
            }
            let word_spacing = if code == 32 && !font.composite() {
                state.word_spacing
            } else {
                0.0
            };
            let tx = (width * state.size + state.char_spacing + word_spacing)
                * state.horizontal_scale;
            self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary::{OVERLAP_TOLERANCE, recover_spans};
    use crate::span::TextSpan;
    use lopdf::{Stream, StringFormat};

    fn name(value: &str) -> Object {
        Object::Name(value.as_bytes().to_vec())
    }

    /// A page with an anonymous Type3 font for "Hi" followed by Helvetica.
    fn type3_document(descriptor_name: Option<&str>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let page_tree_id = doc.new_object_id();
        let mut widths = vec![Object::Integer(0); 34];
        widths[0] = Object::Integer(722);
        widths[33] = Object::Integer(278);
        let mut type3 = Dictionary::from_iter([
            ("Type", name("Font")),
            ("Subtype", name("Type3")),
            (
                "FontMatrix",
                Object::Array(vec![
                    Object::Real(0.001),
                    0.into(),
                    0.into(),
                    Object::Real(0.001),
                    0.into(),
                    0.into(),
                ]),
            ),
            ("FirstChar", Object::Integer(72)),
            ("LastChar", Object::Integer(105)),
            ("Widths", Object::Array(widths)),
            (
                "Encoding",
                Object::Dictionary(Dictionary::from_iter([(
                    "Differences",
                    Object::Array(vec![72.into(), name("H"), 105.into(), name("i")]),
                )])),
            ),
            ("CharProcs", Object::Dictionary(Dictionary::new())),
        ]);
        if let Some(font_name) = descriptor_name {
            let descriptor_id = doc.add_object(Dictionary::from_iter([
                ("Type", name("FontDescriptor")),
                ("FontName", name(font_name)),
            ]));
            type3.set("FontDescriptor", Object::Reference(descriptor_id));
        }
        let type3_id = doc.add_object(type3);
        let helvetica_id = doc.add_object(Dictionary::from_iter([
            ("Type", name("Font")),
            ("Subtype", name("Type1")),
            ("BaseFont", name("Helvetica")),
        ]));
        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([
                ("T3a", Object::Reference(type3_id)),
                ("F1", Object::Reference(helvetica_id)),
            ])),
        )]));
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![name("T3a"), 10.into()]),
                Operation::new(
                    "Tm",
                    vec![1.into(), 0.into(), 0.into(), 1.into(), 72.into(), 700.into()],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(b"Hi".to_vec(), StringFormat::Literal)],
                ),
                Operation::new("Tf", vec![name("F1"), 10.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(b" you".to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode"),
        ));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", name("Page")),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
        ]));
        doc.objects.insert(
            page_tree_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", name("Pages")),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
                ("Count", Object::Integer(1)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", name("Catalog")),
            ("Pages", Object::Reference(page_tree_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        (doc, page_id)
    }

    #[test]
    fn glyphs_carry_font_dictionary_names_and_positions() {
        let (doc, page_id) = type3_document(Some("Caption-Bold"));
        let glyphs = page_glyphs(&doc, page_id).expect("glyphs");
        let text: String = glyphs.iter().map(|glyph| glyph.ch).collect();
        assert_eq!(text, "Hi you");
        assert_eq!(glyphs[0].font_id, "Caption-Bold");
        assert_eq!(glyphs[1].font_id, "Caption-Bold");
        assert_eq!(glyphs[2].font_id, "Helvetica");
        assert!((glyphs[0].origin.x - 72.0).abs() < 0.01);
        assert!((glyphs[0].origin.y - 92.0).abs() < 0.01);
        assert!((glyphs[1].origin.x - 79.22).abs() < 0.01);
        assert!((glyphs[2].origin.x - 82.0).abs() < 0.01);
        assert!(glyphs.iter().all(|glyph| (glyph.size - 10.0).abs() < 0.01));
        assert!((glyphs[0].bbox.y0 - 84.0).abs() < 0.01);
        assert!((glyphs[0].bbox.y1 - 94.0).abs() < 0.01);
    }

    #[test]
    fn anonymous_type3_is_named_after_its_resource() {
        let (doc, page_id) = type3_document(None);
        let glyphs = page_glyphs(&doc, page_id).expect("glyphs");
        assert_eq!(glyphs[0].font_id, "Type3-T3a");
    }

    #[test]
    fn unnamed_span_is_split_by_content_stream_fonts() {
        let (doc, page_id) = type3_document(Some("Caption-Bold"));
        let unnamed = TextSpan::new(
            "Hi you",
            Point::new(72.0, 92.0),
            Rect::new(72.0, 84.0, 102.0, 94.0),
            10.0,
            "Unnamed-T3",
        )
        .expect("span");
        let spans = recover_spans(
            vec![unnamed],
            || page_glyphs(&doc, page_id),
            OVERLAP_TOLERANCE,
        );
        let runs: Vec<(&str, &str)> = spans
            .iter()
            .map(|span| (span.text.as_str(), span.font_id.as_str()))
            .collect();
        assert_eq!(runs, vec![("Hi", "Caption-Bold"), (" you", "Helvetica")]);
        assert!(spans.iter().all(|span| span.origin.y == 92.0));
    }

    #[test]
    fn to_unicode_ranges_and_arrays() {
        let cmap = "2 beginbfchar\n<0003> <0041>\n<0004> <00660069>\nendbfchar\n\
                    2 beginbfrange\n<0010> <0012> <0061>\n<0020> <0021> [<0058> <0059>]\nendbfrange";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&3).map(String::as_str), Some("A"));
        assert_eq!(map.get(&4).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x12).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x21).map(String::as_str), Some("Y"));
        assert!(!map.contains_key(&0x13));
    }

    #[test]
    fn glyph_names_map_to_characters() {
        assert_eq!(glyph_name_char("A"), Some('A'));
        assert_eq!(glyph_name_char("uni00E9"), Some('é'));
        assert_eq!(glyph_name_char("seven"), Some('7'));
        assert_eq!(glyph_name_char("space"), Some(' '));
        assert_eq!(glyph_name_char("g42"), None);
    }
}
