use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::span::TextStyle;

pub type CatalogFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Remote source of font families and their per-style download URLs.
pub trait FontCatalog: Send + Sync {
    fn families(&self) -> CatalogFuture<FamilyCatalog>;
    fn download(&self, url: &str) -> CatalogFuture<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FamilyFiles {
    pub family: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl FamilyFiles {
    pub fn new<I, K, V>(family: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            family: family.into(),
            files: files
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.files.get(*key))
            .map(String::as_str)
    }

    pub fn url_for(&self, style: TextStyle) -> Option<&str> {
        match style {
            TextStyle::Normal => self.first_of(&["regular", "400"]),
            TextStyle::Bold => self.first_of(&["700", "bold"]),
            TextStyle::Italic => self.first_of(&["italic", "400italic"]),
            TextStyle::BoldItalic => self.first_of(&["700italic", "bold italic", "bolditalic"]),
        }
    }
}

/// Families keyed by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct FamilyCatalog {
    families: BTreeMap<String, FamilyFiles>,
}

impl FamilyCatalog {
    pub fn from_families<I>(families: I) -> Self
    where
        I: IntoIterator<Item = FamilyFiles>,
    {
        Self {
            families: families
                .into_iter()
                .map(|family| (family.family.to_lowercase(), family))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn get(&self, family: &str) -> Option<&FamilyFiles> {
        self.families.get(&family.trim().to_lowercase())
    }

    /// Exact case-insensitive hit, else the most similar key at or above `threshold`.
    pub fn lookup(&self, query: &str, threshold: f64) -> Option<&FamilyFiles> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        if let Some(found) = self.families.get(&query) {
            return Some(found);
        }
        let mut best: Option<(&FamilyFiles, f64)> = None;
        for (key, family) in &self.families {
            let score = strsim::normalized_levenshtein(&query, key);
            if score < threshold {
                continue;
            }
            if best.map(|(_, current)| score > current).unwrap_or(true) {
                best = Some((family, score));
            }
        }
        best.map(|(family, _)| family)
    }
}

#[derive(Debug, Deserialize)]
struct WebfontsResponse {
    #[serde(default)]
    items: Vec<FamilyFiles>,
}

pub(crate) fn parse_webfonts(body: &str) -> Result<FamilyCatalog> {
    let response: WebfontsResponse =
        serde_json::from_str(body).with_context(|| "failed to parse font catalog")?;
    Ok(FamilyCatalog::from_families(response.items))
}

/// Google Fonts developer API (`webfonts/v1`).
#[derive(Debug, Clone)]
pub struct GoogleFonts {
    client: reqwest::Client,
    endpoint: String,
    key: Option<String>,
    subset: Option<String>,
}

impl GoogleFonts {
    pub fn new(
        endpoint: impl Into<String>,
        key: Option<String>,
        subset: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            key: key.filter(|key| !key.trim().is_empty()),
            subset: subset.filter(|subset| !subset.trim().is_empty()),
        })
    }
}

impl FontCatalog for GoogleFonts {
    fn families(&self) -> CatalogFuture<FamilyCatalog> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let key = self.key.clone();
        let subset = self.subset.clone();
        Box::pin(async move {
            let key = key.ok_or_else(|| anyhow!("font catalog key is not configured"))?;
            let mut query = vec![("key", key)];
            if let Some(subset) = subset {
                query.push(("subset", subset));
            }
            let response = client.get(&endpoint).query(&query).send().await?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("font catalog error ({}): {}", status, body.trim()));
            }
            parse_webfonts(&body)
        })
    }

    fn download(&self, url: &str) -> CatalogFuture<Vec<u8>> {
        let client = self.client.clone();
        // the catalog still hands out plain http links
        let url = match url.strip_prefix("http://") {
            Some(rest) => format!("https://{rest}"),
            None => url.to_string(),
        };
        Box::pin(async move {
            let response = client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("font download failed ({}): {}", status, url));
            }
            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("failed to read font body: {}", url))?;
            Ok(bytes.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_webfonts_payload() {
        let body = r#"{
            "kind": "webfonts#webfontList",
            "items": [
                {
                    "family": "Open Sans",
                    "variants": ["regular", "700", "italic", "700italic"],
                    "files": {
                        "regular": "http://fonts.example/os-r.ttf",
                        "700": "http://fonts.example/os-b.ttf",
                        "italic": "http://fonts.example/os-i.ttf",
                        "700italic": "http://fonts.example/os-bi.ttf"
                    }
                },
                {"family": "Lato", "files": {"regular": "http://fonts.example/lato.ttf"}}
            ]
        }"#;
        let catalog = parse_webfonts(body).expect("parse");
        assert_eq!(catalog.len(), 2);
        let family = catalog.get("open sans").expect("family");
        assert_eq!(
            family.url_for(TextStyle::Bold),
            Some("http://fonts.example/os-b.ttf")
        );
        assert_eq!(
            family.url_for(TextStyle::BoldItalic),
            Some("http://fonts.example/os-bi.ttf")
        );
        assert_eq!(catalog.get("Lato").and_then(|f| f.url_for(TextStyle::Bold)), None);
    }

    #[test]
    fn bold_prefers_numeric_weight() {
        let family = FamilyFiles::new("X", [("bold", "b.ttf"), ("700", "700.ttf")]);
        assert_eq!(family.url_for(TextStyle::Bold), Some("700.ttf"));
    }

    #[test]
    fn lookup_falls_back_to_similarity() {
        let catalog = FamilyCatalog::from_families([
            FamilyFiles::new("Open Sans", [("regular", "a")]),
            FamilyFiles::new("Roboto", [("regular", "b")]),
        ]);
        assert_eq!(
            catalog.lookup("Open Sans", 0.5).map(|f| f.family.as_str()),
            Some("Open Sans")
        );
        assert_eq!(
            catalog.lookup("open sans semi", 0.5).map(|f| f.family.as_str()),
            Some("Open Sans")
        );
        assert!(catalog.lookup("zzzz", 0.5).is_none());
    }
}
