use anyhow::Result;
use tracing::{debug, warn};

use crate::document::GlyphRecord;
use crate::geom::{Point, Rect, bounding_rect};
use crate::span::{TextSpan, is_unidentified_font};

pub const OVERLAP_TOLERANCE: f32 = 1.0;
const SIZE_EPSILON: f32 = 0.01;

fn within(span: &Rect, glyph: &Rect, tolerance: f32) -> bool {
    let center = Point::new((glyph.x0 + glyph.x1) / 2.0, (glyph.y0 + glyph.y1) / 2.0);
    span.expand(tolerance).contains(center)
}

/// Re-splits an unidentified span from glyph records inside its box. Runs of
/// glyphs sharing font and size become spans on the original baseline.
pub fn replacement_spans(span: &TextSpan, glyphs: &[GlyphRecord], tolerance: f32) -> Vec<TextSpan> {
    let mut runs: Vec<Vec<&GlyphRecord>> = Vec::new();
    for glyph in glyphs {
        if is_unidentified_font(&glyph.font_id) || !within(&span.bbox, &glyph.bbox, tolerance) {
            continue;
        }
        match runs.last_mut() {
            Some(run)
                if run[0].font_id == glyph.font_id
                    && (run[0].size - glyph.size).abs() <= SIZE_EPSILON =>
            {
                run.push(glyph)
            }
            _ => runs.push(vec![glyph]),
        }
    }
    runs.into_iter()
        .filter_map(|run| {
            let first = run.first()?;
            let text: String = run.iter().map(|glyph| glyph.ch).collect();
            let bbox = bounding_rect(run.iter().map(|glyph| glyph.bbox))?;
            TextSpan::new(
                text,
                Point::new(first.origin.x, span.origin.y),
                bbox,
                first.size,
                first.font_id.clone(),
            )
        })
        .collect()
}

/// Replaces spans with unidentified fonts using the glyph pass. Glyphs are
/// loaded on the first unidentified span only; a failed load keeps every
/// span as extracted.
pub fn recover_spans<F>(spans: Vec<TextSpan>, load_glyphs: F, tolerance: f32) -> Vec<TextSpan>
where
    F: FnOnce() -> Result<Vec<GlyphRecord>>,
{
    let mut load_glyphs = Some(load_glyphs);
    let mut glyphs: Option<Vec<GlyphRecord>> = None;
    let mut recovered = Vec::with_capacity(spans.len());
    for span in spans {
        if !is_unidentified_font(&span.font_id) {
            recovered.push(span);
            continue;
        }
        let page_glyphs = glyphs.get_or_insert_with(|| match load_glyphs.take() {
            Some(load) => load().unwrap_or_else(|err| {
                warn!("secondary text extraction failed: {:#}", err);
                Vec::new()
            }),
            None => Vec::new(),
        });
        let replacements = replacement_spans(&span, page_glyphs, tolerance);
        if replacements.is_empty() {
            warn!(
                "no glyphs recovered for {:?} under font label {:?}",
                span.text, span.font_id
            );
            recovered.push(span);
        } else {
            debug!(
                "recovered {} spans for unidentified font {:?}",
                replacements.len(),
                span.font_id
            );
            recovered.extend(replacements);
        }
    }
    recovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn glyph(ch: char, x: f32, font_id: &str, size: f32) -> GlyphRecord {
        GlyphRecord {
            ch,
            origin: Point::new(x, 50.0),
            bbox: Rect::new(x, 50.0 - size * 0.8, x + size * 0.5, 50.0 + size * 0.2),
            size,
            font_id: font_id.to_string(),
        }
    }

    fn unnamed_span() -> TextSpan {
        TextSpan::new(
            "Hi you",
            Point::new(10.0, 50.5),
            Rect::new(10.0, 42.0, 40.0, 52.0),
            10.0,
            "Unnamed-T3",
        )
        .expect("span")
    }

    #[test]
    fn splices_runs_by_font_and_size() {
        let glyphs = vec![
            glyph('H', 10.0, "Serif-Bold", 10.0),
            glyph('i', 15.0, "Serif-Bold", 10.0),
            glyph(' ', 20.0, "Serif", 10.0),
            glyph('y', 25.0, "Serif", 10.0),
            glyph('z', 90.0, "Serif", 10.0),
        ];
        let spans = replacement_spans(&unnamed_span(), &glyphs, OVERLAP_TOLERANCE);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Hi");
        assert_eq!(spans[0].font_id, "Serif-Bold");
        assert!(spans[0].style.bold);
        assert_eq!(spans[1].text, " y");
        assert!(spans.iter().all(|span| span.origin.y == 50.5));
    }

    #[test]
    fn identified_spans_never_load_glyphs() {
        let span = TextSpan::new(
            "ok",
            Point::new(0.0, 10.0),
            Rect::new(0.0, 2.0, 10.0, 12.0),
            10.0,
            "Helvetica",
        )
        .expect("span");
        let spans = recover_spans(
            vec![span.clone()],
            || -> Result<Vec<GlyphRecord>> { panic!("glyphs loaded") },
            OVERLAP_TOLERANCE,
        );
        assert_eq!(spans, vec![span]);
    }

    #[test]
    fn miss_keeps_original_span() {
        let span = unnamed_span();
        let spans = recover_spans(
            vec![span.clone()],
            || Err(anyhow!("mutool missing")),
            OVERLAP_TOLERANCE,
        );
        assert_eq!(spans, vec![span]);
    }
}
