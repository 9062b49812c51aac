use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{attr, attr_f32, attr_floats};
use crate::geom::{Point, Rect, bounding_rect};
use crate::span::TextSpan;

/// One page of `mutool draw -F stext` output, in top-left page coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StextPage {
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
}

#[derive(Default)]
struct FontRun {
    font_id: String,
    size: f32,
    text: String,
    origin: Option<Point>,
    boxes: Vec<Rect>,
}

impl FontRun {
    fn open(element: &BytesStart<'_>) -> Self {
        Self {
            font_id: attr(element, b"name").unwrap_or_default(),
            size: attr_f32(element, b"size").unwrap_or(0.0),
            ..Self::default()
        }
    }

    fn push_char(&mut self, element: &BytesStart<'_>) {
        let Some(ch) = attr(element, b"c") else {
            return;
        };
        let origin = match (attr_f32(element, b"x"), attr_f32(element, b"y")) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        };
        let bbox = char_box(element).or_else(|| origin.map(|p| Rect::new(p.x, p.y, p.x, p.y)));
        if self.origin.is_none() {
            self.origin = origin.or_else(|| bbox.map(|rect| Point::new(rect.x0, rect.y1)));
        }
        if let Some(bbox) = bbox {
            self.boxes.push(bbox);
        }
        self.text.push_str(&ch);
    }

    fn close(self) -> Option<TextSpan> {
        let bbox = bounding_rect(self.boxes)?;
        let origin = self.origin.unwrap_or(Point::new(bbox.x0, bbox.y1));
        TextSpan::new(self.text, origin, bbox, self.size, self.font_id)
    }
}

/// Accepts both the `quad` (newer) and `bbox` (older) char geometry.
fn char_box(element: &BytesStart<'_>) -> Option<Rect> {
    if let Some(quad) = attr_floats(element, b"quad")
        && quad.len() == 8
    {
        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]];
        let x0 = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let x1 = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let y0 = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let y1 = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        return Some(Rect::new(x0, y0, x1, y1));
    }
    let bbox = attr_floats(element, b"bbox")?;
    (bbox.len() == 4).then(|| Rect::new(bbox[0], bbox[1], bbox[2], bbox[3]))
}

pub fn parse_stext(xml: &str) -> Result<Vec<StextPage>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut pages = Vec::new();
    let mut page: Option<StextPage> = None;
    let mut run: Option<FontRun> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => {
                    page = Some(StextPage {
                        width: attr_f32(&e, b"width").unwrap_or(0.0),
                        height: attr_f32(&e, b"height").unwrap_or(0.0),
                        spans: Vec::new(),
                    });
                }
                b"font" => run = Some(FontRun::open(&e)),
                b"char" => {
                    if let Some(run) = run.as_mut() {
                        run.push_char(&e);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"char"
                    && let Some(run) = run.as_mut()
                {
                    run.push_char(&e);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                // a line ends every run, even when the font element is left open
                b"font" | b"line" => {
                    if let (Some(finished), Some(page)) = (run.take(), page.as_mut())
                        && let Some(span) = finished.close()
                    {
                        page.spans.push(span);
                    }
                }
                b"page" => {
                    if let Some(done) = page.take() {
                        pages.push(done);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(anyhow!("failed to parse structured text: {}", err)),
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0"?>
<document name="in.pdf">
<page id="page1" width="612" height="792">
<block bbox="72 60 300 90">
<line bbox="72 60 300 74" wmode="0" dir="1 0">
<font name="ABCDEF+Arial-BoldMT" size="12">
<char quad="72 62 80 62 72 74 80 74" x="72" y="71.5" color="#000000" c="H"/>
<char quad="80 62 86 62 80 74 86 74" x="80" y="71.5" color="#000000" c="i"/>
</font>
<font name="ArialMT" size="12">
<char quad="86 62 90 62 86 74 90 74" x="86" y="71.5" color="#000000" c=" "/>
<char quad="90 62 98 62 90 74 98 74" x="90" y="71.5" color="#000000" c="&amp;"/>
</font>
</line>
<line bbox="72 80 90 90" wmode="0" dir="1 0">
<font name="ArialMT" size="12">
<char bbox="72 80 78 90" x="72" y="88" c=" "/>
</font>
</line>
</block>
</page>
</document>"##;

    #[test]
    fn parses_font_runs_into_spans() {
        let pages = parse_stext(SAMPLE).expect("parse");
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!((page.width, page.height), (612.0, 792.0));
        assert_eq!(page.spans.len(), 2);

        let first = &page.spans[0];
        assert_eq!(first.text, "Hi");
        assert_eq!(first.font_id, "ABCDEF+Arial-BoldMT");
        assert!(first.style.bold);
        assert_eq!(first.origin, Point::new(72.0, 71.5));
        assert_eq!(first.bbox, Rect::new(72.0, 62.0, 86.0, 74.0));

        assert_eq!(page.spans[1].text, " &");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(parse_stext("<page><block></page>").is_err());
    }
}
