use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::{PageCanvas, SourceDocument};
use crate::fonts::{FontBook, FontHandle, FontResolver, StyleFonts};
use crate::grouping::{GroupingTolerances, TextBlock, group_spans};
use crate::providers::Provider;
use crate::reflow::{PositionedSegment, layout_block};
use crate::secondary::{OVERLAP_TOLERANCE, recover_spans};
use crate::span::TextStyle;
use crate::translator::{StyleTranslator, reading_order};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    pub grouping: GroupingTolerances,
    pub overlap_tolerance: f32,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            grouping: GroupingTolerances::default(),
            overlap_tolerance: OVERLAP_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub page: usize,
    pub spans: usize,
    pub blocks: usize,
    pub placed: usize,
    /// Segments drawn with a default font after their own font failed.
    pub fallbacks: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Placed,
    Fallback,
    Skipped,
}

/// Drives one document through extraction, translation and reflow, page by
/// page in order.
pub struct Assembler<P: Provider> {
    resolver: FontResolver,
    translator: StyleTranslator<P>,
    book: FontBook,
    options: AssemblyOptions,
}

impl<P: Provider> Assembler<P> {
    pub fn new(
        resolver: FontResolver,
        translator: StyleTranslator<P>,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            resolver,
            translator,
            book: FontBook::new(),
            options,
        }
    }

    pub fn resolver(&self) -> &FontResolver {
        &self.resolver
    }

    pub fn translator(&self) -> &StyleTranslator<P> {
        &self.translator
    }

    /// Resolves every font the document declares, before any page is drawn.
    pub async fn resolve_document_fonts<S: SourceDocument>(&mut self, source: &S) {
        self.resolver.ensure_defaults().await;
        for reference in source.font_references() {
            self.resolver
                .resolve(&reference.id, reference.embedded, source)
                .await;
        }
    }

    pub async fn assemble<S, C>(&mut self, source: &S, canvas: &mut C) -> Result<Vec<PageStats>>
    where
        S: SourceDocument,
        C: PageCanvas,
    {
        self.resolve_document_fonts(source).await;
        let mut pages = Vec::with_capacity(source.page_count());
        for page in 0..source.page_count() {
            let stats = self
                .assemble_page(source, canvas, page)
                .await
                .with_context(|| format!("failed to translate page {}", page + 1))?;
            info!(
                "page {}: {} blocks, {} segments ({} fallback, {} skipped)",
                page + 1,
                stats.blocks,
                stats.placed,
                stats.fallbacks,
                stats.skipped
            );
            pages.push(stats);
        }
        Ok(pages)
    }

    pub async fn assemble_page<S, C>(
        &mut self,
        source: &S,
        canvas: &mut C,
        page: usize,
    ) -> Result<PageStats>
    where
        S: SourceDocument,
        C: PageCanvas,
    {
        let mut stats = PageStats {
            page,
            ..PageStats::default()
        };
        canvas.begin_page(page)?;
        let spans = source.page_spans(page)?;
        let spans = recover_spans(
            spans,
            || source.page_glyphs(page),
            self.options.overlap_tolerance,
        );
        stats.spans = spans.len();
        self.resolver.ensure_defaults().await;
        for span in &spans {
            let embedded = source.is_embedded(&span.font_id);
            self.resolver.resolve(&span.font_id, embedded, source).await;
        }

        let blocks = group_spans(spans, &self.options.grouping);
        stats.blocks = blocks.len();
        for block in &blocks {
            let segments = self.translator.translate_block(block).await?;
            let fonts = self.block_fonts(block);
            for handle in fonts.handles() {
                self.book.ensure(handle);
            }
            let layout = layout_block(block, &segments, &fonts, &self.book);
            debug!(
                "block at ({:.1}, {:.1}): {:?} at {:.2}, {} lines",
                block.bbox.x0,
                block.bbox.y0,
                layout.strategy,
                layout.size,
                layout.lines.len()
            );
            for segment in layout.segments() {
                match self.place(canvas, segment) {
                    Placement::Placed => stats.placed += 1,
                    Placement::Fallback => {
                        stats.placed += 1;
                        stats.fallbacks += 1;
                    }
                    Placement::Skipped => stats.skipped += 1,
                }
            }
        }
        canvas.finish_page()?;
        Ok(stats)
    }

    /// Style fonts of a block, based on the first regular span in reading
    /// order (else the first span).
    fn block_fonts(&self, block: &TextBlock) -> StyleFonts {
        let ordered = reading_order(&block.spans);
        let base_span = ordered
            .iter()
            .find(|span| span.style.style() == TextStyle::Normal)
            .or_else(|| ordered.first());
        let base: FontHandle = base_span
            .and_then(|span| self.resolver.handle_for(&span.font_id))
            .cloned()
            .unwrap_or_else(|| self.resolver.defaults().regular.clone());
        self.resolver.style_fonts(&base)
    }

    fn place<C: PageCanvas>(&mut self, canvas: &mut C, segment: &PositionedSegment) -> Placement {
        let Err(err) = try_place(canvas, segment) else {
            return Placement::Placed;
        };
        let fallback = self.resolver.defaults().for_style(segment.style).clone();
        if fallback == segment.font {
            warn!("skipping {:?}: {:#}", segment.text, err);
            return Placement::Skipped;
        }
        warn!(
            "placing {:?} with {} failed ({:#}); retrying with {}",
            segment.text, segment.font.name, err, fallback.name
        );
        self.book.ensure(&fallback);
        let retry = PositionedSegment {
            font: fallback,
            ..segment.clone()
        };
        match try_place(canvas, &retry) {
            Ok(()) => Placement::Fallback,
            Err(err) => {
                warn!("skipping {:?}: {:#}", segment.text, err);
                Placement::Skipped
            }
        }
    }
}

fn try_place<C: PageCanvas>(canvas: &mut C, segment: &PositionedSegment) -> Result<()> {
    canvas.register_font(&segment.font)?;
    canvas.insert_text(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FontReference, GlyphRecord};
    use crate::fonts::{
        FontSource, FontWorkspace, LocalFontEntry, LocalFontIndex, ResolutionSource, ResolverOptions,
    };
    use crate::geom::{Point, Rect};
    use crate::providers::{ProviderFuture, TranslationRequest};
    use crate::span::TextSpan;
    use anyhow::anyhow;
    use std::collections::HashMap;

    struct Dictionary(HashMap<&'static str, &'static str>);

    impl Provider for Dictionary {
        fn name(&self) -> &'static str {
            "dictionary"
        }

        fn translate(&self, request: TranslationRequest) -> ProviderFuture {
            let translated = self
                .0
                .get(request.text.as_str())
                .map(|text| text.to_string())
                .unwrap_or(request.text);
            Box::pin(async move { Ok(translated) })
        }
    }

    struct StubDocument {
        pages: Vec<Vec<TextSpan>>,
        glyphs: Vec<GlyphRecord>,
        fonts: Vec<FontReference>,
    }

    impl FontSource for StubDocument {
        fn font_program(&self, _font_id: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    impl SourceDocument for StubDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn font_references(&self) -> Vec<FontReference> {
            self.fonts.clone()
        }

        fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>> {
            Ok(self.pages[page].clone())
        }

        fn page_glyphs(&self, _page: usize) -> Result<Vec<GlyphRecord>> {
            Ok(self.glyphs.clone())
        }
    }

    #[derive(Default)]
    struct RecordingCanvas {
        rejected: Vec<String>,
        pages: Vec<usize>,
        placed: Vec<PositionedSegment>,
        finished: usize,
    }

    impl PageCanvas for RecordingCanvas {
        fn begin_page(&mut self, page: usize) -> Result<()> {
            self.pages.push(page);
            Ok(())
        }

        fn register_font(&mut self, font: &FontHandle) -> Result<()> {
            if self.rejected.contains(&font.name) {
                return Err(anyhow!("bad font resource {}", font.name));
            }
            Ok(())
        }

        fn insert_text(&mut self, segment: &PositionedSegment) -> Result<()> {
            self.placed.push(segment.clone());
            Ok(())
        }

        fn finish_page(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    fn span(text: &str, x: f32, baseline: f32, font: &str) -> TextSpan {
        TextSpan::new(
            text,
            Point::new(x, baseline),
            Rect::new(x, baseline - 8.0, x + 60.0, baseline + 2.0),
            10.0,
            font,
        )
        .expect("span")
    }

    fn assembler(
        local: LocalFontIndex,
        words: &[(&'static str, &'static str)],
    ) -> Assembler<Dictionary> {
        let resolver = FontResolver::new(
            FontWorkspace::new().expect("workspace"),
            local,
            None,
            ResolverOptions::default(),
        );
        let provider = Dictionary(words.iter().copied().collect());
        let translator = StyleTranslator::new(provider, "EN", "DE");
        Assembler::new(resolver, translator, AssemblyOptions::default())
    }

    #[tokio::test]
    async fn pages_are_translated_in_order() {
        let document = StubDocument {
            pages: vec![
                vec![span("Hello", 50.0, 100.0, "Arial"), span("Footer", 50.0, 700.0, "Arial")],
                vec![span("Footer", 50.0, 700.0, "Arial")],
            ],
            glyphs: Vec::new(),
            fonts: vec![FontReference {
                id: "Arial".to_string(),
                embedded: false,
            }],
        };
        let mut assembler = assembler(
            LocalFontIndex::empty(),
            &[("Hello", "Hallo"), ("Footer", "Fußzeile")],
        );
        let mut canvas = RecordingCanvas::default();
        let stats = assembler.assemble(&document, &mut canvas).await.expect("assemble");

        assert_eq!(canvas.pages, vec![0, 1]);
        assert_eq!(canvas.finished, 2);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].blocks, 2);
        let texts: Vec<&str> = canvas.placed.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hallo", "Fußzeile", "Fußzeile"]);
        assert_eq!(canvas.placed[0].origin, Point::new(50.0, 100.0));
        assert_eq!(canvas.placed[0].font.name, "Helvetica");
        // repeated footer hits the memo
        assert_eq!(assembler.translator().calls(), 2);
    }

    #[tokio::test]
    async fn rejected_font_retries_with_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Garamond.ttf");
        std::fs::write(&path, b"\0\x01\0\0stub-font").expect("write font");
        let local = LocalFontIndex::from_entries(vec![LocalFontEntry::new("Garamond", &path)]);
        let document = StubDocument {
            pages: vec![vec![span("Hello", 10.0, 20.0, "Garamond")]],
            glyphs: Vec::new(),
            fonts: Vec::new(),
        };
        let mut assembler = assembler(local, &[]);
        let mut canvas = RecordingCanvas {
            rejected: vec!["Garamond".to_string()],
            ..RecordingCanvas::default()
        };
        let stats = assembler
            .assemble_page(&document, &mut canvas, 0)
            .await
            .expect("page");

        let resolved = assembler.resolver().resolutions().next().map(|(_, r)| r.source);
        assert_eq!(resolved, Some(ResolutionSource::Local));
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(canvas.placed.len(), 1);
        assert_eq!(canvas.placed[0].font.name, "Helvetica");
        assert_eq!(canvas.placed[0].origin, Point::new(10.0, 20.0));
        assert_eq!(canvas.placed[0].size, 10.0);
    }

    #[tokio::test]
    async fn failing_default_is_skipped_without_aborting() {
        let document = StubDocument {
            pages: vec![vec![
                span("Bold", 10.0, 20.0, "Arial-Bold"),
                span("Plain", 10.0, 300.0, "Arial"),
            ]],
            glyphs: Vec::new(),
            fonts: Vec::new(),
        };
        let mut assembler = assembler(LocalFontIndex::empty(), &[]);
        let mut canvas = RecordingCanvas {
            rejected: vec!["Helvetica-Bold".to_string()],
            ..RecordingCanvas::default()
        };
        let stats = assembler
            .assemble_page(&document, &mut canvas, 0)
            .await
            .expect("page");
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.placed, 1);
        assert_eq!(canvas.placed[0].text, "Plain");
        assert_eq!(canvas.finished, 1);
    }

    #[tokio::test]
    async fn unidentified_spans_use_glyph_pass() {
        let glyph = |ch: char, x: f32| GlyphRecord {
            ch,
            origin: Point::new(x, 20.0),
            bbox: Rect::new(x, 12.0, x + 5.0, 22.0),
            size: 10.0,
            font_id: "Arial".to_string(),
        };
        let document = StubDocument {
            pages: vec![vec![TextSpan::new(
                "Hi",
                Point::new(10.0, 20.0),
                Rect::new(10.0, 12.0, 20.0, 22.0),
                10.0,
                "Unnamed-T3",
            )
            .expect("span")]],
            glyphs: vec![glyph('H', 10.0), glyph('i', 15.0)],
            fonts: Vec::new(),
        };
        let mut assembler = assembler(LocalFontIndex::empty(), &[]);
        let mut canvas = RecordingCanvas::default();
        assembler
            .assemble_page(&document, &mut canvas, 0)
            .await
            .expect("page");
        assert!(assembler.resolver().handle_for("Arial").is_some());
        assert!(assembler.resolver().handle_for("Unnamed-T3").is_none());
        assert_eq!(canvas.placed[0].text, "Hi");
    }

    #[test]
    fn stats_serialize() {
        let stats = PageStats {
            page: 0,
            spans: 3,
            blocks: 2,
            placed: 2,
            fallbacks: 1,
            skipped: 0,
        };
        let value = serde_json::to_value(&stats).expect("json");
        assert_eq!(value["fallbacks"], 1);
    }
}
