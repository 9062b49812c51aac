use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

mod deepl;
pub(crate) mod retry;

pub use deepl::DeepL;

/// Language code meaning "let the service detect it".
pub const AUTO_LANGUAGE: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Keep `<b>`/`<i>` markup intact around the translated words.
    pub preserve_markup: bool,
}

impl TranslationRequest {
    pub fn markup(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            preserve_markup: true,
        }
    }

    pub fn detects_source(&self) -> bool {
        let source = self.source_lang.trim();
        source.is_empty() || source.eq_ignore_ascii_case(AUTO_LANGUAGE)
    }
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// A machine translation service.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    fn translate(&self, request: TranslationRequest) -> ProviderFuture;
}
