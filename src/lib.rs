use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod assembler;
pub mod document;
pub mod fonts;
pub mod geom;
pub mod grouping;
pub mod logging;
pub mod providers;
pub mod reflow;
pub mod secondary;
pub mod settings;
pub mod span;
#[cfg(test)]
mod test_util;
pub mod translator;

pub use assembler::{Assembler, AssemblyOptions, PageStats};
pub use providers::{DeepL, Provider};
pub use translator::StyleTranslator;

use document::{Mutool, PdfSource, PdfWriter};
use fonts::{
    FontCatalog, FontResolver, FontWorkspace, GoogleFonts, LocalFontIndex, ResolutionSource,
};
use settings::Settings;

pub const DEEPL_KEY_ENV: &str = "DEEPL_API_KEY";
pub const FONTS_KEY_ENV: &str = "GOOGLE_FONTS_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: PathBuf,
    /// Defaults to `<stem>.<target>.pdf` next to the input.
    pub output: Option<PathBuf>,
    pub target_lang: Option<String>,
    pub source_lang: Option<String>,
    pub key: Option<String>,
    pub fonts_dir: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub offline: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    pub pages: usize,
    pub blocks: usize,
    pub segments: usize,
    pub fallbacks: usize,
    pub skipped: usize,
    /// Provider calls; repeated blocks are served from the memo.
    pub translations: usize,
    pub fonts: BTreeMap<ResolutionSource, usize>,
}

impl RunSummary {
    pub fn collect(
        output: PathBuf,
        pages: &[PageStats],
        resolver: &FontResolver,
        translations: usize,
    ) -> Self {
        let mut fonts = BTreeMap::new();
        for (_, resolved) in resolver.resolutions() {
            *fonts.entry(resolved.source).or_insert(0) += 1;
        }
        Self {
            output,
            pages: pages.len(),
            blocks: pages.iter().map(|page| page.blocks).sum(),
            segments: pages.iter().map(|page| page.placed).sum(),
            fallbacks: pages.iter().map(|page| page.fallbacks).sum(),
            skipped: pages.iter().map(|page| page.skipped).sum(),
            translations,
            fonts,
        }
    }
}

pub async fn run(config: Config) -> Result<RunSummary> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let key = resolve_key(config.key.as_deref(), std::env::var(DEEPL_KEY_ENV).ok())?;
    let target_lang = config
        .target_lang
        .clone()
        .or_else(|| settings.target_lang.clone())
        .filter(|lang| !lang.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("target language is not set (--target-lang or [translation] target_lang)")
        })?;
    let source_lang = config
        .source_lang
        .clone()
        .unwrap_or_else(|| settings.source_lang.clone());
    if !config.input.is_file() {
        return Err(anyhow!("input not found: {}", config.input.display()));
    }
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output(&config.input, &target_lang));

    let mut provider =
        DeepL::new(key, settings.timeout())?.with_max_retries(settings.max_retries);
    if let Some(endpoint) = settings.translation_endpoint.as_deref() {
        provider = provider.with_endpoint(endpoint);
    }
    info!(
        "translating {} ({} -> {}) via {}",
        config.input.display(),
        source_lang,
        target_lang,
        provider.endpoint()
    );

    let source = PdfSource::open(&config.input, Mutool::locate()?)?;
    let mut canvas = PdfWriter::open(&config.input)?;
    let resolver = build_resolver(&config, &settings)?;
    let translator = StyleTranslator::new(provider, source_lang, target_lang);
    let options = AssemblyOptions {
        grouping: settings.grouping,
        overlap_tolerance: settings.overlap_tolerance,
    };
    let mut assembler = Assembler::new(resolver, translator, options);
    let pages = assembler.assemble(&source, &mut canvas).await?;
    canvas.save(&output)?;

    Ok(RunSummary::collect(
        output,
        &pages,
        assembler.resolver(),
        assembler.translator().calls(),
    ))
}

fn resolve_key(explicit: Option<&str>, env: Option<String>) -> Result<String> {
    explicit
        .map(str::to_string)
        .or(env)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("{} is not set (or pass --key)", DEEPL_KEY_ENV))
}

pub fn default_output(input: &Path, target_lang: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    input.with_file_name(format!("{}.{}.pdf", stem, target_lang.trim().to_lowercase()))
}

fn build_resolver(config: &Config, settings: &Settings) -> Result<FontResolver> {
    let workspace = FontWorkspace::new()?;
    let local = match config.fonts_dir.as_ref().or(settings.fonts_dir.as_ref()) {
        Some(dir) => LocalFontIndex::scan(dir).unwrap_or_else(|err| {
            warn!("local fonts unavailable: {:#}", err);
            LocalFontIndex::empty()
        }),
        None => LocalFontIndex::empty(),
    };
    let catalog: Option<Box<dyn FontCatalog>> = if config.offline {
        info!("offline: remote fonts disabled");
        None
    } else {
        let catalog = GoogleFonts::new(
            settings.catalog_url.clone(),
            std::env::var(FONTS_KEY_ENV).ok(),
            settings.catalog_subset.clone(),
            settings.timeout(),
        )
        .with_context(|| "failed to set up font catalog")?;
        Some(Box::new(catalog))
    };
    Ok(FontResolver::new(
        workspace,
        local,
        catalog,
        settings.resolver_options(),
    ))
}
