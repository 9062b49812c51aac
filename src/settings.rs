use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fonts::{DefaultFontUrls, ResolverOptions};
use crate::grouping::GroupingTolerances;
use crate::providers::AUTO_LANGUAGE;
use crate::secondary::OVERLAP_TOLERANCE;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
pub const DEFAULT_CATALOG_URL: &str = "https://www.googleapis.com/webfonts/v1/webfonts";

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: Option<String>,
    pub translation_endpoint: Option<String>,
    pub max_retries: usize,
    pub fonts_dir: Option<PathBuf>,
    pub catalog_url: String,
    pub catalog_subset: Option<String>,
    pub default_family: String,
    pub default_urls: DefaultFontUrls,
    pub local_threshold: f64,
    pub catalog_threshold: f64,
    pub timeout_secs: u64,
    pub grouping: GroupingTolerances,
    pub overlap_tolerance: f32,
}

impl Default for Settings {
    fn default() -> Self {
        let resolver = ResolverOptions::default();
        Self {
            source_lang: AUTO_LANGUAGE.to_string(),
            target_lang: None,
            translation_endpoint: None,
            max_retries: 5,
            fonts_dir: None,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            catalog_subset: None,
            default_family: resolver.default_family,
            default_urls: resolver.default_urls,
            local_threshold: resolver.local_threshold,
            catalog_threshold: resolver.catalog_threshold,
            timeout_secs: 15,
            grouping: GroupingTolerances::default(),
            overlap_tolerance: OVERLAP_TOLERANCE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translation: Option<TranslationSettings>,
    fonts: Option<FontSettings>,
    network: Option<NetworkSettings>,
    layout: Option<LayoutSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
    endpoint: Option<String>,
    max_retries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
    catalog_url: Option<String>,
    subset: Option<String>,
    default_family: Option<String>,
    default_regular_url: Option<String>,
    default_bold_url: Option<String>,
    default_italic_url: Option<String>,
    local_threshold: Option<f64>,
    catalog_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkSettings {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    merge_tolerance: Option<f32>,
    size_tolerance: Option<f32>,
    line_tolerance: Option<f32>,
    edge_tolerance: Option<f32>,
    overlap_tolerance: Option<f32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings
        .merge_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse built-in settings")?;
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|value| *value > 0.0)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translation) = incoming.translation {
            if let Some(lang) = non_empty(translation.source_lang) {
                self.source_lang = lang;
            }
            if let Some(lang) = non_empty(translation.target_lang) {
                self.target_lang = Some(lang);
            }
            if let Some(endpoint) = non_empty(translation.endpoint) {
                self.translation_endpoint = Some(endpoint);
            }
            if let Some(retries) = translation.max_retries
                && retries > 0
            {
                self.max_retries = retries;
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = non_empty(fonts.dir) {
                self.fonts_dir = Some(PathBuf::from(dir));
            }
            if let Some(url) = non_empty(fonts.catalog_url) {
                self.catalog_url = url;
            }
            if let Some(subset) = non_empty(fonts.subset) {
                self.catalog_subset = Some(subset);
            }
            if let Some(family) = non_empty(fonts.default_family) {
                self.default_family = family;
            }
            if let Some(url) = non_empty(fonts.default_regular_url) {
                self.default_urls.regular = Some(url);
            }
            if let Some(url) = non_empty(fonts.default_bold_url) {
                self.default_urls.bold = Some(url);
            }
            if let Some(url) = non_empty(fonts.default_italic_url) {
                self.default_urls.italic = Some(url);
            }
            if let Some(threshold) = fonts.local_threshold
                && (0.0..=1.0).contains(&threshold)
            {
                self.local_threshold = threshold;
            }
            if let Some(threshold) = fonts.catalog_threshold
                && (0.0..=1.0).contains(&threshold)
            {
                self.catalog_threshold = threshold;
            }
        }
        if let Some(network) = incoming.network
            && let Some(timeout) = network.timeout_secs
            && timeout > 0
        {
            self.timeout_secs = timeout;
        }
        if let Some(layout) = incoming.layout {
            if let Some(value) = positive(layout.merge_tolerance) {
                self.grouping.merge = value;
            }
            if let Some(value) = positive(layout.size_tolerance) {
                self.grouping.size = value;
            }
            if let Some(value) = positive(layout.line_tolerance) {
                self.grouping.line = value;
            }
            if let Some(value) = positive(layout.edge_tolerance) {
                self.grouping.edge = value;
            }
            if let Some(value) = positive(layout.overlap_tolerance) {
                self.overlap_tolerance = value;
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            local_threshold: self.local_threshold,
            catalog_threshold: self.catalog_threshold,
            default_family: self.default_family.clone(),
            default_urls: self.default_urls.clone(),
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pdf-translator-rust"))
        }
    })
}
