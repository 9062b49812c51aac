use serde::Serialize;

use crate::fonts::{FontHandle, Measure, StyleFonts};
use crate::geom::Point;
use crate::grouping::{Alignment, TextBlock};
use crate::span::TextStyle;
use crate::translator::StyledSegment;

const SHRINK_STEP: f32 = 0.95;
const SHRINK_FLOOR_RATIO: f32 = 0.9;
const HEADING_MIN_SIZE: f32 = 10.0;
const LINE_PITCH: f32 = 1.2;
const FIT_EPSILON: f32 = 0.01;

/// One run of text ready to be drawn. `origin` is the baseline start in
/// top-left page space.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedSegment {
    pub text: String,
    pub style: TextStyle,
    pub font: FontHandle,
    pub size: f32,
    pub origin: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflowStrategy {
    Original,
    Shrunk,
    Wrapped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub size: f32,
    pub strategy: ReflowStrategy,
    pub lines: Vec<Vec<PositionedSegment>>,
}

impl BlockLayout {
    pub fn segments(&self) -> impl Iterator<Item = &PositionedSegment> {
        self.lines.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    style: TextStyle,
}

/// Whitespace-free run; pieces glued without a space stay in one word even
/// when their styles differ.
#[derive(Debug, Clone, Default)]
struct Word {
    pieces: Vec<Piece>,
}

impl Word {
    fn last_style(&self) -> TextStyle {
        self.pieces
            .last()
            .map(|piece| piece.style)
            .unwrap_or(TextStyle::Normal)
    }
}

fn split_words(segments: &[StyledSegment]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = Word::default();
    for segment in segments {
        let mut run = String::new();
        for ch in segment.text.chars() {
            if ch.is_whitespace() {
                if !run.is_empty() {
                    current.pieces.push(Piece {
                        text: std::mem::take(&mut run),
                        style: segment.style,
                    });
                }
                if !current.pieces.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            } else {
                run.push(ch);
            }
        }
        if !run.is_empty() {
            current.pieces.push(Piece {
                text: run,
                style: segment.style,
            });
        }
    }
    if !current.pieces.is_empty() {
        words.push(current);
    }
    words
}

struct Metrics<'a> {
    fonts: &'a StyleFonts,
    measure: &'a dyn Measure,
}

impl Metrics<'_> {
    fn piece(&self, text: &str, style: TextStyle, size: f32) -> f32 {
        self.measure.text_width(text, self.fonts.get(style), size)
    }

    fn word(&self, word: &Word, size: f32) -> f32 {
        word.pieces
            .iter()
            .map(|piece| self.piece(&piece.text, piece.style, size))
            .sum()
    }

    /// The space after `word` is drawn in that word's trailing style.
    fn space_after(&self, word: &Word, size: f32) -> f32 {
        self.piece(" ", word.last_style(), size)
    }

    fn line(&self, words: &[&Word], size: f32) -> f32 {
        let mut width = 0.0;
        for (index, word) in words.iter().enumerate() {
            if index > 0 {
                width += self.space_after(words[index - 1], size);
            }
            width += self.word(word, size);
        }
        width
    }
}

fn fits(width: f32, limit: f32) -> bool {
    width <= limit + FIT_EPSILON
}

/// Greedy packing; a word wider than `limit` still opens its own line.
fn wrap_words<'w>(
    words: &'w [Word],
    size: f32,
    limit: f32,
    metrics: &Metrics<'_>,
) -> Vec<Vec<&'w Word>> {
    let mut lines = Vec::new();
    let mut current: Vec<&Word> = Vec::new();
    let mut width = 0.0;
    for word in words {
        let word_width = metrics.word(word, size);
        if let Some(previous) = current.last() {
            let candidate = width + metrics.space_after(previous, size) + word_width;
            if fits(candidate, limit) {
                current.push(word);
                width = candidate;
                continue;
            }
            lines.push(std::mem::take(&mut current));
        }
        current.push(word);
        width = word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn place_line(
    words: &[&Word],
    baseline: f32,
    size: f32,
    block: &TextBlock,
    justify: bool,
    metrics: &Metrics<'_>,
) -> Vec<PositionedSegment> {
    let limit = block.bbox.width();
    let natural = metrics.line(words, size);
    let slack = (limit - natural).max(0.0);
    let start = match block.alignment {
        Alignment::Right => block.bbox.x0 + slack,
        Alignment::Center => block.bbox.x0 + slack / 2.0,
        Alignment::Left | Alignment::Justify => block.bbox.x0,
    };
    let extra_gap = if justify && words.len() > 1 {
        slack / (words.len() - 1) as f32
    } else {
        0.0
    };

    let mut segments: Vec<PositionedSegment> = Vec::new();
    let mut x = start;
    for (index, word) in words.iter().enumerate() {
        let mut detached = false;
        if index > 0 {
            let space = metrics.space_after(words[index - 1], size);
            if extra_gap > 0.0 {
                x += space + extra_gap;
                detached = true;
            } else {
                // unjustified spaces ride along with the previous run
                if let Some(last) = segments.last_mut() {
                    last.text.push(' ');
                }
                x += space;
            }
        }
        for (piece_index, piece) in word.pieces.iter().enumerate() {
            let width = metrics.piece(&piece.text, piece.style, size);
            let starts_run = detached && piece_index == 0;
            match segments.last_mut() {
                Some(last) if !starts_run && last.style == piece.style => {
                    last.text.push_str(&piece.text);
                }
                _ => segments.push(PositionedSegment {
                    text: piece.text.clone(),
                    style: piece.style,
                    font: metrics.fonts.get(piece.style).clone(),
                    size,
                    origin: Point::new(x, baseline),
                }),
            }
            x += width;
        }
    }
    segments
}

fn place_lines(
    lines: &[Vec<&Word>],
    size: f32,
    block: &TextBlock,
    metrics: &Metrics<'_>,
) -> Vec<Vec<PositionedSegment>> {
    let first_baseline = block.first_baseline();
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(index, words)| {
            let baseline = first_baseline + index as f32 * size * LINE_PITCH;
            let justify = block.alignment == Alignment::Justify && index < last;
            place_line(words, baseline, size, block, justify, metrics)
        })
        .collect()
}

/// Fits translated style runs into the block's original box: original size
/// on one line, else shrunk on one line down to 90%, else wrapped at the
/// original size (headings may shrink further to keep their line count).
pub fn layout_block(
    block: &TextBlock,
    segments: &[StyledSegment],
    fonts: &StyleFonts,
    measure: &dyn Measure,
) -> BlockLayout {
    let metrics = Metrics { fonts, measure };
    let words = split_words(segments);
    let original = block.size;
    if words.is_empty() {
        return BlockLayout {
            size: original,
            strategy: ReflowStrategy::Original,
            lines: Vec::new(),
        };
    }
    let limit = block.bbox.width();
    let all: Vec<&Word> = words.iter().collect();
    let single = std::slice::from_ref(&all);

    if fits(metrics.line(&all, original), limit) {
        return BlockLayout {
            size: original,
            strategy: ReflowStrategy::Original,
            lines: place_lines(single, original, block, &metrics),
        };
    }

    let floor = original * SHRINK_FLOOR_RATIO;
    let mut size = original;
    while size > floor {
        size = (size * SHRINK_STEP).max(floor);
        if fits(metrics.line(&all, size), limit) {
            return BlockLayout {
                size,
                strategy: ReflowStrategy::Shrunk,
                lines: place_lines(single, size, block, &metrics),
            };
        }
    }

    let mut size = original;
    let mut lines = wrap_words(&words, size, limit, &metrics);
    if block.is_heading() {
        let target = block.line_count.max(1);
        while lines.len() > target && size > HEADING_MIN_SIZE {
            size = (size * SHRINK_STEP).max(HEADING_MIN_SIZE);
            lines = wrap_words(&words, size, limit, &metrics);
        }
    }
    BlockLayout {
        size,
        strategy: ReflowStrategy::Wrapped,
        lines: place_lines(&lines, size, block, &metrics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{DefaultFonts, FontBook};
    use crate::geom::Rect;
    use crate::grouping::{GroupingTolerances, group_spans};
    use crate::span::TextSpan;

    fn fonts() -> StyleFonts {
        let defaults = DefaultFonts::builtin();
        StyleFonts {
            normal: defaults.regular.clone(),
            bold: defaults.bold.clone(),
            italic: defaults.italic.clone(),
            bold_italic: defaults.bold,
        }
    }

    fn block(x0: f32, x1: f32, baseline: f32, size: f32) -> TextBlock {
        let span = TextSpan::new(
            "source",
            Point::new(x0, baseline),
            Rect::new(x0, baseline - size * 0.8, x1, baseline + size * 0.2),
            size,
            "Helvetica",
        )
        .expect("span");
        let mut blocks = group_spans(vec![span], &GroupingTolerances::default());
        blocks.remove(0)
    }

    fn plain(text: &str) -> Vec<StyledSegment> {
        vec![StyledSegment::new(text, TextStyle::Normal)]
    }

    fn right_edge(segment: &PositionedSegment, book: &FontBook) -> f32 {
        segment.origin.x + book.text_width(&segment.text, &segment.font, segment.size)
    }

    #[test]
    fn short_text_keeps_size_and_position() {
        let book = FontBook::new();
        let block = block(50.0, 250.0, 100.0, 12.0);
        let layout = layout_block(&block, &plain("Hallo Welt"), &fonts(), &book);
        assert_eq!(layout.strategy, ReflowStrategy::Original);
        assert_eq!(layout.size, 12.0);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0][0].text, "Hallo Welt");
        assert_eq!(layout.lines[0][0].origin, Point::new(50.0, 100.0));
    }

    #[test]
    fn slightly_long_text_shrinks_within_floor() {
        let book = FontBook::new();
        // "aaaa aaaa" is 4.726 em wide
        let block = block(0.0, 45.0, 20.0, 10.0);
        let layout = layout_block(&block, &plain("aaaa aaaa"), &fonts(), &book);
        assert_eq!(layout.strategy, ReflowStrategy::Shrunk);
        assert!(layout.size < 10.0 && layout.size >= 9.0);
        assert_eq!(layout.lines.len(), 1);
    }

    #[test]
    fn wrapped_lines_fit_the_block() {
        let book = FontBook::new();
        let block = block(10.0, 110.0, 40.0, 10.0);
        let text = "Die Übersetzung dieses Absatzes ist deutlich länger als der \
                    ursprüngliche Text und muss deshalb umbrochen werden";
        let layout = layout_block(&block, &plain(text), &fonts(), &book);
        assert_eq!(layout.strategy, ReflowStrategy::Wrapped);
        assert_eq!(layout.size, 10.0);
        assert!(layout.lines.len() > 1);
        for (index, line) in layout.lines.iter().enumerate() {
            let baseline = 40.0 + index as f32 * 12.0;
            for segment in line {
                assert!((segment.origin.y - baseline).abs() < 1e-3);
                assert!(right_edge(segment, &book) <= block.bbox.x1 + FIT_EPSILON);
            }
        }
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let book = FontBook::new();
        let block = block(0.0, 40.0, 20.0, 10.0);
        let layout = layout_block(
            &block,
            &plain("ab Donaudampfschifffahrtsgesellschaft cd"),
            &fonts(),
            &book,
        );
        let texts: Vec<&str> = layout
            .lines
            .iter()
            .map(|line| line[0].text.as_str())
            .collect();
        assert_eq!(texts, vec!["ab", "Donaudampfschifffahrtsgesellschaft", "cd"]);
    }

    #[test]
    fn heading_keeps_single_line() {
        let book = FontBook::new();
        let block = block(0.0, 80.0, 30.0, 20.0);
        assert!(block.is_heading());
        assert_eq!(block.line_count, 1);
        let layout = layout_block(&block, &plain("aaaa aaaa"), &fonts(), &book);
        assert_eq!(layout.strategy, ReflowStrategy::Wrapped);
        assert_eq!(layout.lines.len(), 1);
        assert!(layout.size < 18.0 && layout.size >= HEADING_MIN_SIZE);
    }

    #[test]
    fn styles_select_fonts_and_glued_pieces_stay_together() {
        let book = FontBook::new();
        let block = block(0.0, 500.0, 20.0, 10.0);
        let segments = vec![
            StyledSegment::new("Hallo", TextStyle::Bold),
            StyledSegment::new(", Welt", TextStyle::Normal),
        ];
        let layout = layout_block(&block, &segments, &fonts(), &book);
        let line = &layout.lines[0];
        assert_eq!(line.len(), 2);
        assert_eq!(line[0].text, "Hallo");
        assert_eq!(line[0].font.name, "Helvetica-Bold");
        assert_eq!(line[1].text, ", Welt");
        assert_eq!(line[1].font.name, "Helvetica");
        let bold_width = book.text_width("Hallo", &line[0].font, 10.0);
        assert!((line[1].origin.x - bold_width).abs() < 1e-3);
    }

    #[test]
    fn right_and_center_alignment() {
        let book = FontBook::new();
        let mut block = block(0.0, 100.0, 20.0, 10.0);
        let width = book.text_width("ab", &fonts().normal, 10.0);
        block.alignment = Alignment::Right;
        let layout = layout_block(&block, &plain("ab"), &fonts(), &book);
        assert!((layout.lines[0][0].origin.x - (100.0 - width)).abs() < 1e-3);
        block.alignment = Alignment::Center;
        let layout = layout_block(&block, &plain("ab"), &fonts(), &book);
        assert!((layout.lines[0][0].origin.x - (100.0 - width) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn justify_spreads_all_but_last_line() {
        let book = FontBook::new();
        let mut block = block(0.0, 60.0, 20.0, 10.0);
        block.alignment = Alignment::Justify;
        let layout = layout_block(&block, &plain("aa bb cc dd ee ff gg"), &fonts(), &book);
        assert!(layout.lines.len() >= 2);
        let first = &layout.lines[0];
        let end = first.last().map(|segment| right_edge(segment, &book));
        assert!(end.is_some_and(|end| (end - 60.0).abs() < 1e-2));
        let last = layout.lines.last().expect("last line");
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].origin.x, 0.0);
    }

    #[test]
    fn empty_translation_produces_no_lines() {
        let book = FontBook::new();
        let block = block(0.0, 60.0, 20.0, 10.0);
        assert!(layout_block(&block, &plain("  "), &fonts(), &book).is_empty());
    }
}
