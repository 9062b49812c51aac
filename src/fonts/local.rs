use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::names::{letters_lower, local_query};

const SUPPORTED_EXTENSIONS: &[&str] = &["ttf", "otf"];

#[derive(Debug, Clone, PartialEq)]
pub struct LocalFontEntry {
    pub key: String,
    pub path: PathBuf,
    normalized: String,
}

impl LocalFontEntry {
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let key = key.into();
        let normalized = letters_lower(&key);
        Self {
            key,
            path: path.into(),
            normalized,
        }
    }
}

/// Font files found in one directory, keyed by filename stem.
#[derive(Debug, Clone, Default)]
pub struct LocalFontIndex {
    entries: Vec<LocalFontEntry>,
}

impl LocalFontIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(mut entries: Vec<LocalFontEntry>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self { entries }
    }

    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            debug!("local font directory {} not found", dir.display());
            return Ok(Self::empty());
        }
        let mut entries = Vec::new();
        let listing = fs::read_dir(dir)
            .with_context(|| format!("failed to read font directory: {}", dir.display()))?;
        for entry in listing.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    SUPPORTED_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
                .unwrap_or(false);
            if !supported || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                entries.push(LocalFontEntry::new(stem, path.clone()));
            }
        }
        debug!("indexed {} local fonts in {}", entries.len(), dir.display());
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Containment match (longest key wins), else the most similar key at or
    /// above `threshold`.
    pub fn find(&self, font_id: &str, threshold: f64) -> Option<&LocalFontEntry> {
        let query = local_query(font_id);
        if query.is_empty() {
            return None;
        }
        let contained = self
            .entries
            .iter()
            .filter(|entry| !entry.normalized.is_empty())
            .filter(|entry| {
                entry.normalized.contains(&query) || query.contains(&entry.normalized)
            })
            .fold(None::<&LocalFontEntry>, |best, entry| match best {
                Some(current) if current.normalized.len() >= entry.normalized.len() => {
                    Some(current)
                }
                _ => Some(entry),
            });
        if contained.is_some() {
            return contained;
        }

        let mut best: Option<(&LocalFontEntry, f64)> = None;
        for entry in &self.entries {
            let score = strsim::normalized_levenshtein(&query, &entry.normalized);
            if score < threshold {
                continue;
            }
            if best.map(|(_, current)| score > current).unwrap_or(true) {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, _)| entry)
    }
}
