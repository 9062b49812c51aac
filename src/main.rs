use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-translator-rust",
    version,
    about = "Translate a PDF while keeping its layout"
)]
struct Cli {
    /// PDF to translate
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output PDF (default: <input stem>.<target>.pdf)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Target language code (e.g. DE, FR, EN-GB)
    #[arg(short = 'l', long = "target-lang")]
    target_lang: Option<String>,

    /// Source language code. Use "auto" to detect.
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// DeepL API key (overrides DEEPL_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Directory with local .ttf/.otf fonts
    #[arg(long = "fonts-dir")]
    fonts_dir: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Never download fonts; unmatched fonts use the built-in defaults
    #[arg(long = "offline")]
    offline: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_translator_rust::logging::init(cli.verbose)?;

    let config = pdf_translator_rust::Config {
        input: cli.input,
        output: cli.output,
        target_lang: cli.target_lang,
        source_lang: cli.source_lang,
        key: cli.key,
        fonts_dir: cli.fonts_dir,
        settings_path: cli.read_settings,
        offline: cli.offline,
    };
    let summary = pdf_translator_rust::run(config).await?;

    println!("{}", summary.output.display());
    let fonts: Vec<String> = summary
        .fonts
        .iter()
        .map(|(source, count)| format!("{:?}={}", source, count).to_lowercase())
        .collect();
    println!(
        "pages: {}, blocks: {}, segments: {} ({} fallback, {} skipped), translations: {}, fonts: {}",
        summary.pages,
        summary.blocks,
        summary.segments,
        summary.fallbacks,
        summary.skipped,
        summary.translations,
        if fonts.is_empty() {
            "none".to_string()
        } else {
            fonts.join(" ")
        }
    );
    Ok(())
}
