use anyhow::Result;
use quick_xml::escape::{partial_escape, unescape_with};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::grouping::TextBlock;
use crate::providers::{Provider, TranslationRequest};
use crate::span::{TextSpan, TextStyle};

static STYLE_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<b>\s*<i>(.*?)</i>\s*</b>|<i>\s*<b>(.*?)</b>\s*</i>|<b>(.*?)</b>|<i>(.*?)</i>")
        .expect("regex")
});
static STRAY_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[bi]>").expect("regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledSegment {
    pub text: String,
    pub style: TextStyle,
}

impl StyledSegment {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

fn wrap(text: &str, style: TextStyle) -> String {
    let escaped = partial_escape(text);
    match style {
        TextStyle::Normal => escaped.into_owned(),
        TextStyle::Bold => format!("<b>{escaped}</b>"),
        TextStyle::Italic => format!("<i>{escaped}</i>"),
        TextStyle::BoldItalic => format!("<b><i>{escaped}</i></b>"),
    }
}

/// Spans in reading order, top to bottom then left to right.
pub fn reading_order(spans: &[TextSpan]) -> Vec<&TextSpan> {
    let mut ordered: Vec<&TextSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| {
        a.origin
            .y
            .total_cmp(&b.origin.y)
            .then(a.origin.x.total_cmp(&b.origin.x))
    });
    ordered
}

/// Serializes a block into one tagged string, styling each span from its font name.
pub fn block_markup(block: &TextBlock) -> String {
    let mut markup = String::new();
    let mut previous: Option<&str> = None;
    for span in reading_order(&block.spans) {
        if let Some(previous) = previous
            && !previous.ends_with(char::is_whitespace)
            && !span.text.starts_with(char::is_whitespace)
        {
            markup.push(' ');
        }
        markup.push_str(&wrap(&span.text, span.style.style()));
        previous = Some(&span.text);
    }
    markup
}

fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        _ => None,
    }
}

fn clean_text(raw: &str) -> String {
    let stripped = STRAY_TAGS.replace_all(raw, "");
    match unescape_with(&stripped, html_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => stripped.into_owned(),
    }
}

fn push_segment(segments: &mut Vec<StyledSegment>, raw: &str, style: TextStyle) {
    let text = clean_text(raw);
    if !text.is_empty() {
        segments.push(StyledSegment { text, style });
    }
}

/// Splits translated markup back into style runs. Text outside any tag pair
/// is `Normal`.
pub fn parse_markup(markup: &str) -> Vec<StyledSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for captures in STYLE_RUNS.captures_iter(markup) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_segment(&mut segments, &markup[cursor..whole.start()], TextStyle::Normal);
        let (inner, style) = if let Some(inner) = captures.get(1).or(captures.get(2)) {
            (inner, TextStyle::BoldItalic)
        } else if let Some(inner) = captures.get(3) {
            (inner, TextStyle::Bold)
        } else if let Some(inner) = captures.get(4) {
            (inner, TextStyle::Italic)
        } else {
            continue;
        };
        push_segment(&mut segments, inner.as_str(), style);
        cursor = whole.end();
    }
    push_segment(&mut segments, &markup[cursor..], TextStyle::Normal);
    segments
}

/// Translates blocks through a provider, one call per distinct markup string
/// for the whole run.
pub struct StyleTranslator<P: Provider> {
    provider: P,
    source_lang: String,
    target_lang: String,
    memo: HashMap<String, String>,
    calls: usize,
}

impl<P: Provider> StyleTranslator<P> {
    pub fn new(provider: P, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            provider,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            memo: HashMap::new(),
            calls: 0,
        }
    }

    /// Provider calls made so far; memo hits are not counted.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub async fn translate_markup(&mut self, markup: &str) -> Result<String> {
        if let Some(existing) = self.memo.get(markup) {
            debug!("translation memo hit ({} chars)", markup.len());
            return Ok(existing.clone());
        }
        let request =
            TranslationRequest::markup(markup, self.source_lang.clone(), self.target_lang.clone());
        let translated = self.provider.translate(request).await?;
        self.calls += 1;
        self.memo.insert(markup.to_string(), translated.clone());
        Ok(translated)
    }

    pub async fn translate_block(&mut self, block: &TextBlock) -> Result<Vec<StyledSegment>> {
        let markup = block_markup(block);
        if markup.trim().is_empty() {
            return Ok(Vec::new());
        }
        let translated = self.translate_markup(&markup).await?;
        Ok(parse_markup(&translated))
    }
}
