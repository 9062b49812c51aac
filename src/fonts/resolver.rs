use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::catalog::{FamilyCatalog, FamilyFiles, FontCatalog};
use super::local::LocalFontIndex;
use super::names::{alias_forms, family_key, family_query, sanitize_file_stem};
use super::workspace::FontWorkspace;
use super::{
    DEFAULT_BOLD_KEY, DEFAULT_ITALIC_KEY, DEFAULT_KEY, DefaultFonts, FontFormat, FontHandle,
    FontRegistry, ResolutionSource, ResolvedFont, StyleFonts, validate_font_file,
};
use crate::span::TextStyle;

/// Access to font programs embedded in the source document.
pub trait FontSource {
    fn font_program(&self, font_id: &str) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultFontUrls {
    pub regular: Option<String>,
    pub bold: Option<String>,
    pub italic: Option<String>,
}

impl DefaultFontUrls {
    fn for_style(&self, style: TextStyle) -> Option<&str> {
        match style {
            TextStyle::Normal => self.regular.as_deref(),
            TextStyle::Bold | TextStyle::BoldItalic => self.bold.as_deref(),
            TextStyle::Italic => self.italic.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub local_threshold: f64,
    pub catalog_threshold: f64,
    pub default_family: String,
    pub default_urls: DefaultFontUrls,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            local_threshold: 0.8,
            catalog_threshold: 0.5,
            default_family: "Roboto Condensed".to_string(),
            default_urls: DefaultFontUrls::default(),
        }
    }
}

/// Downloaded style variants of one catalog family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyVariantSet {
    pub regular: Option<FontHandle>,
    pub bold: Option<FontHandle>,
    pub italic: Option<FontHandle>,
    pub bold_italic: Option<FontHandle>,
}

impl FamilyVariantSet {
    fn slot(&mut self, style: TextStyle) -> &mut Option<FontHandle> {
        match style {
            TextStyle::Normal => &mut self.regular,
            TextStyle::Bold => &mut self.bold,
            TextStyle::Italic => &mut self.italic,
            TextStyle::BoldItalic => &mut self.bold_italic,
        }
    }

    pub fn get(&self, style: TextStyle) -> Option<&FontHandle> {
        match style {
            TextStyle::Normal => self.regular.as_ref(),
            TextStyle::Bold => self.bold.as_ref(),
            TextStyle::Italic => self.italic.as_ref(),
            TextStyle::BoldItalic => self.bold_italic.as_ref(),
        }
    }

    /// Exact style, else the regular variant.
    pub fn pick(&self, style: TextStyle) -> Option<&FontHandle> {
        self.get(style).or(self.regular.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none()
            && self.bold.is_none()
            && self.italic.is_none()
            && self.bold_italic.is_none()
    }
}

const VARIANT_STYLES: [TextStyle; 4] = [
    TextStyle::Normal,
    TextStyle::Bold,
    TextStyle::Italic,
    TextStyle::BoldItalic,
];

fn variant_suffix(style: TextStyle) -> &'static str {
    match style {
        TextStyle::Normal => "Regular",
        TextStyle::Bold => "Bold",
        TextStyle::Italic => "Italic",
        TextStyle::BoldItalic => "BoldItalic",
    }
}

enum CatalogState {
    Unloaded,
    Loaded(FamilyCatalog),
    Unavailable,
}

/// Run-scoped font resolution state. Every id resolves exactly once; later
/// calls return the memoized answer without touching disk or network.
pub struct FontResolver {
    registry: FontRegistry,
    resolved: BTreeMap<String, ResolvedFont>,
    families: HashMap<String, Option<FamilyVariantSet>>,
    local: LocalFontIndex,
    catalog: Option<Box<dyn FontCatalog>>,
    catalog_state: CatalogState,
    defaults: DefaultFonts,
    defaults_ready: bool,
    workspace: FontWorkspace,
    options: ResolverOptions,
}

impl FontResolver {
    pub fn new(
        workspace: FontWorkspace,
        local: LocalFontIndex,
        catalog: Option<Box<dyn FontCatalog>>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            registry: FontRegistry::new(),
            resolved: BTreeMap::new(),
            families: HashMap::new(),
            local,
            catalog,
            catalog_state: CatalogState::Unloaded,
            defaults: DefaultFonts::builtin(),
            defaults_ready: false,
            workspace,
            options,
        }
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn defaults(&self) -> &DefaultFonts {
        &self.defaults
    }

    pub fn workspace(&self) -> &FontWorkspace {
        &self.workspace
    }

    pub fn handle_for(&self, font_id: &str) -> Option<&FontHandle> {
        self.resolved
            .get(font_id)
            .map(|resolved| &resolved.handle)
            .or_else(|| self.registry.get(font_id))
    }

    pub fn resolutions(&self) -> impl Iterator<Item = (&String, &ResolvedFont)> {
        self.resolved.iter()
    }

    pub fn style_fonts(&self, base: &FontHandle) -> StyleFonts {
        StyleFonts::for_base(&self.registry, &self.defaults, base)
    }

    pub async fn resolve(
        &mut self,
        font_id: &str,
        is_embedded: bool,
        source: &dyn FontSource,
    ) -> ResolvedFont {
        if let Some(found) = self.resolved.get(font_id) {
            return found.clone();
        }
        let resolved = self.resolve_uncached(font_id, is_embedded, source).await;
        debug!(
            "font {} -> {} ({:?})",
            font_id, resolved.handle.name, resolved.source
        );
        self.registry.insert(font_id, resolved.handle.clone());
        self.resolved.insert(font_id.to_string(), resolved.clone());
        resolved
    }

    async fn resolve_uncached(
        &mut self,
        font_id: &str,
        is_embedded: bool,
        source: &dyn FontSource,
    ) -> ResolvedFont {
        if is_embedded {
            match self.extract_embedded(font_id, source) {
                Ok(Some(handle)) => return resolved(handle, ResolutionSource::Embedded),
                Ok(None) => debug!("no embedded program for {}", font_id),
                Err(err) => warn!("embedded font {} unusable: {:#}", font_id, err),
            }
        }
        if let Some(handle) = self.match_local(font_id) {
            return resolved(handle, ResolutionSource::Local);
        }
        if let Some(handle) = self.match_remote(font_id).await {
            return resolved(handle, ResolutionSource::Remote);
        }
        self.ensure_defaults().await;
        resolved(
            self.defaults.for_font_name(font_id).clone(),
            ResolutionSource::Fallback,
        )
    }

    fn extract_embedded(
        &mut self,
        font_id: &str,
        source: &dyn FontSource,
    ) -> Result<Option<FontHandle>> {
        let Some(bytes) = source.font_program(font_id)? else {
            return Ok(None);
        };
        let format = FontFormat::detect(&bytes)
            .ok_or_else(|| anyhow!("unsupported font program signature"))?;
        let file_name = format!("{}.{}", sanitize_file_stem(font_id), format.extension());
        let path = self.workspace.persist(&file_name, &bytes)?;
        validate_font_file(&path)?;
        Ok(Some(FontHandle::file(font_id, path)))
    }

    fn match_local(&mut self, font_id: &str) -> Option<FontHandle> {
        let entry = self.local.find(font_id, self.options.local_threshold)?;
        if let Err(err) = validate_font_file(&entry.path) {
            warn!("local font {} rejected: {:#}", entry.path.display(), err);
            return None;
        }
        let handle = FontHandle::file(entry.key.clone(), entry.path.clone());
        self.registry.insert_alias(entry.key.clone(), handle.clone());
        Some(handle)
    }

    async fn match_remote(&mut self, font_id: &str) -> Option<FontHandle> {
        let query = family_query(font_id);
        if query.is_empty() {
            return None;
        }
        let threshold = self.options.catalog_threshold;
        let family = self.catalog().await?.lookup(&query, threshold)?.clone();
        let variants = self.family_variants(&family).await?;
        let handle = variants.pick(TextStyle::from_font_name(font_id))?.clone();
        for alias in alias_forms(font_id) {
            self.registry.insert_alias(alias, handle.clone());
        }
        Some(handle)
    }

    /// Catalog listing, fetched on first use. A failed fetch disables the
    /// remote stage for the rest of the run.
    async fn catalog(&mut self) -> Option<&FamilyCatalog> {
        if matches!(self.catalog_state, CatalogState::Unloaded) {
            let catalog = self.catalog.as_ref()?;
            self.catalog_state = match catalog.families().await {
                Ok(families) => {
                    info!("font catalog lists {} families", families.len());
                    CatalogState::Loaded(families)
                }
                Err(err) => {
                    warn!("font catalog unavailable: {:#}", err);
                    CatalogState::Unavailable
                }
            };
        }
        match &self.catalog_state {
            CatalogState::Loaded(families) => Some(families),
            _ => None,
        }
    }

    async fn family_variants(&mut self, family: &FamilyFiles) -> Option<FamilyVariantSet> {
        let key = family_key(&family.family);
        if let Some(cached) = self.families.get(&key) {
            return cached.clone();
        }
        let mut variants = FamilyVariantSet::default();
        for style in VARIANT_STYLES {
            let Some(url) = family.url_for(style) else {
                continue;
            };
            let name = format!("{}-{}", key, variant_suffix(style));
            match self.download_font(url, &name).await {
                Ok(handle) => {
                    self.registry.insert(name, handle.clone());
                    *variants.slot(style) = Some(handle);
                }
                Err(err) => warn!("font variant {} unavailable: {:#}", name, err),
            }
        }
        let variants = (!variants.is_empty()).then_some(variants);
        self.families.insert(key, variants.clone());
        variants
    }

    async fn download_font(&self, url: &str, name: &str) -> Result<FontHandle> {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or_else(|| anyhow!("font downloads are disabled"))?;
        let stem = sanitize_file_stem(name);
        for ext in ["ttf", "otf"] {
            if let Some(path) = self.workspace.existing(&format!("{stem}.{ext}")) {
                return Ok(FontHandle::file(name, path));
            }
        }
        let bytes = catalog.download(url).await?;
        let format =
            FontFormat::detect(&bytes).ok_or_else(|| anyhow!("unsupported font signature"))?;
        let path = self
            .workspace
            .persist(&format!("{stem}.{}", format.extension()), &bytes)?;
        if let Err(err) = validate_font_file(&path) {
            self.workspace.discard(&path);
            return Err(err);
        }
        Ok(FontHandle::file(name, path))
    }

    /// Establishes the three default handles once per run: the bundled URLs,
    /// then the configured family from the catalog, then built-in Helvetica.
    pub async fn ensure_defaults(&mut self) {
        if self.defaults_ready {
            return;
        }
        self.defaults_ready = true;
        let builtin = DefaultFonts::builtin();
        let slots = [
            (DEFAULT_KEY, TextStyle::Normal),
            (DEFAULT_BOLD_KEY, TextStyle::Bold),
            (DEFAULT_ITALIC_KEY, TextStyle::Italic),
        ];
        // looked up only when a bundled URL is missing or fails
        let mut family: Option<Option<FamilyFiles>> = None;
        for (key, style) in slots {
            let mut chosen = None;
            if let Some(url) = self.options.default_urls.for_style(style).map(str::to_string) {
                chosen = self.download_default(&url, key).await;
            }
            if chosen.is_none() {
                if family.is_none() {
                    family = Some(self.default_family().await);
                }
                let url = family
                    .as_ref()
                    .and_then(|family| family.as_ref())
                    .and_then(|family| family.url_for(style))
                    .map(str::to_string);
                if let Some(url) = url {
                    chosen = self.download_default(&url, key).await;
                }
            }
            let handle = chosen.unwrap_or_else(|| builtin.for_style(style).clone());
            if handle.is_builtin() {
                info!("default font {} uses built-in {}", key, handle.name);
            }
            self.registry.insert(key, handle.clone());
            match style {
                TextStyle::Bold => self.defaults.bold = handle,
                TextStyle::Italic => self.defaults.italic = handle,
                _ => self.defaults.regular = handle,
            }
        }
    }

    async fn default_family(&mut self) -> Option<FamilyFiles> {
        let threshold = self.options.catalog_threshold;
        let query = self.options.default_family.clone();
        self.catalog().await?.lookup(&query, threshold).cloned()
    }

    async fn download_default(&self, url: &str, key: &str) -> Option<FontHandle> {
        match self.download_font(url, key).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("default font {} from {} failed: {:#}", key, url, err);
                None
            }
        }
    }
}

fn resolved(handle: FontHandle, source: ResolutionSource) -> ResolvedFont {
    ResolvedFont { handle, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{CatalogFuture, LocalFontEntry};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TRUETYPE_STUB: &[u8] = b"\0\x01\0\0stub-font";

    struct StubCatalog {
        families: FamilyCatalog,
        listings: Arc<AtomicUsize>,
        downloads: Arc<AtomicUsize>,
    }

    impl StubCatalog {
        fn new(families: Vec<FamilyFiles>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let listings = Arc::new(AtomicUsize::new(0));
            let downloads = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    families: FamilyCatalog::from_families(families),
                    listings: listings.clone(),
                    downloads: downloads.clone(),
                },
                listings,
                downloads,
            )
        }
    }

    impl FontCatalog for StubCatalog {
        fn families(&self) -> CatalogFuture<FamilyCatalog> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            let families = self.families.clone();
            Box::pin(async move { Ok(families) })
        }

        fn download(&self, url: &str) -> CatalogFuture<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let url = url.to_string();
            Box::pin(async move {
                if url.contains("broken") {
                    Ok(b"<html>not a font</html>".to_vec())
                } else if url.contains("offline") {
                    Err(anyhow!("network unreachable"))
                } else {
                    Ok(TRUETYPE_STUB.to_vec())
                }
            })
        }
    }

    struct FailingCatalog;

    impl FontCatalog for FailingCatalog {
        fn families(&self) -> CatalogFuture<FamilyCatalog> {
            Box::pin(async { Err(anyhow!("network unreachable")) })
        }

        fn download(&self, _url: &str) -> CatalogFuture<Vec<u8>> {
            Box::pin(async { Err(anyhow!("network unreachable")) })
        }
    }

    #[derive(Default)]
    struct StubSource {
        programs: HashMap<String, Vec<u8>>,
    }

    impl FontSource for StubSource {
        fn font_program(&self, font_id: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.programs.get(font_id).cloned())
        }
    }

    fn open_sans() -> FamilyFiles {
        FamilyFiles::new(
            "Open Sans",
            [
                ("regular", "https://fonts.test/os-r.ttf"),
                ("700", "https://fonts.test/os-b.ttf"),
                ("italic", "https://fonts.test/os-i.ttf"),
                ("700italic", "https://fonts.test/os-bi.ttf"),
            ],
        )
    }

    fn resolver(catalog: Option<Box<dyn FontCatalog>>, local: LocalFontIndex) -> FontResolver {
        let workspace = FontWorkspace::new().expect("workspace");
        FontResolver::new(workspace, local, catalog, ResolverOptions::default())
    }

    #[tokio::test]
    async fn embedded_program_is_authoritative() {
        let mut source = StubSource::default();
        source
            .programs
            .insert("ABCDEF+Garamond".to_string(), TRUETYPE_STUB.to_vec());
        let (catalog, _, downloads) = StubCatalog::new(vec![open_sans()]);
        let mut resolver = resolver(Some(Box::new(catalog)), LocalFontIndex::empty());

        let found = resolver.resolve("ABCDEF+Garamond", true, &source).await;
        assert_eq!(found.source, ResolutionSource::Embedded);
        assert_eq!(found.handle.name, "ABCDEF+Garamond");
        let path = found.handle.file_path.clone().expect("file");
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("ttf"));
        assert!(path.starts_with(resolver.workspace().path()));
        assert_eq!(downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_embedded_program_falls_through() {
        let mut source = StubSource::default();
        source
            .programs
            .insert("Mystery".to_string(), b"%!PS-AdobeFont-1.0".to_vec());
        let mut resolver = resolver(None, LocalFontIndex::empty());

        let found = resolver.resolve("Mystery", true, &source).await;
        assert_eq!(found.source, ResolutionSource::Fallback);
        assert_eq!(found.handle, resolver.defaults().regular);
    }

    #[tokio::test]
    async fn local_directory_match_registers_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Lato-Bold.ttf");
        std::fs::write(&path, TRUETYPE_STUB).expect("write");
        let local = LocalFontIndex::from_entries(vec![LocalFontEntry::new("Lato-Bold", &path)]);
        let mut resolver = resolver(None, local);

        let found = resolver
            .resolve("XYZABC+Lato-Bold", false, &StubSource::default())
            .await;
        assert_eq!(found.source, ResolutionSource::Local);
        assert_eq!(found.handle.name, "Lato-Bold");
        assert!(resolver.registry().contains("Lato-Bold"));
        assert!(resolver.registry().contains("XYZABC+Lato-Bold"));
    }

    #[tokio::test]
    async fn remote_family_registers_aliases() {
        let (catalog, _, _) = StubCatalog::new(vec![open_sans()]);
        let mut resolver = resolver(Some(Box::new(catalog)), LocalFontIndex::empty());

        let found = resolver
            .resolve("ABCDEF+OpenSans-Bold", false, &StubSource::default())
            .await;
        assert_eq!(found.source, ResolutionSource::Remote);
        assert_eq!(found.handle.name, "OpenSans-Bold");
        for alias in ["OpenSans-Bold", "OpenSansBold", "OpenSans", "OpenSans-Regular"] {
            assert!(resolver.registry().contains(alias), "missing {alias}");
        }
        let fonts = resolver.style_fonts(&found.handle);
        assert_eq!(fonts.italic.name, "OpenSans-Italic");
        assert_eq!(fonts.bold_italic.name, "OpenSans-BoldItalic");
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let (catalog, listings, downloads) = StubCatalog::new(vec![open_sans()]);
        let mut resolver = resolver(Some(Box::new(catalog)), LocalFontIndex::empty());
        let source = StubSource::default();

        let first = resolver.resolve("OpenSans-Italic", false, &source).await;
        let after_first = downloads.load(Ordering::SeqCst);
        let second = resolver.resolve("OpenSans-Italic", false, &source).await;
        assert_eq!(first, second);
        assert_eq!(downloads.load(Ordering::SeqCst), after_first);

        // a sibling from the same family reuses the downloaded variants
        let sibling = resolver.resolve("OpenSans-Regular", false, &source).await;
        assert_eq!(sibling.handle.name, "OpenSans-Regular");
        assert_eq!(downloads.load(Ordering::SeqCst), after_first);
        assert_eq!(listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn offline_resolution_uses_builtin_defaults() {
        let mut resolver = resolver(None, LocalFontIndex::empty());
        let source = StubSource::default();
        let builtin = DefaultFonts::builtin();
        for (font_id, expected) in [
            ("ABCDEF+Futura-Bold", &builtin.bold),
            ("Futura-Oblique", &builtin.italic),
            ("Futura", &builtin.regular),
            ("Unnamed-T3", &builtin.regular),
        ] {
            let found = resolver.resolve(font_id, false, &source).await;
            assert_eq!(found.source, ResolutionSource::Fallback);
            assert_eq!(&found.handle, expected);
            assert!(resolver.registry().contains(font_id));
        }
        assert!(resolver.registry().contains(DEFAULT_KEY));
    }

    #[tokio::test]
    async fn unreachable_catalog_falls_back_to_builtins() {
        let mut resolver = resolver(Some(Box::new(FailingCatalog)), LocalFontIndex::empty());
        let found = resolver
            .resolve("OpenSans-Bold", false, &StubSource::default())
            .await;
        assert_eq!(found.source, ResolutionSource::Fallback);
        assert_eq!(found.handle, DefaultFonts::builtin().bold);
    }

    #[tokio::test]
    async fn defaults_fall_back_to_catalog_family_and_reject_bad_bytes() {
        let roboto = FamilyFiles::new(
            "Roboto Condensed",
            [
                ("regular", "https://fonts.test/rc-r.ttf"),
                ("700", "https://fonts.test/rc-broken.ttf"),
            ],
        );
        let (catalog, listings, _) = StubCatalog::new(vec![roboto]);
        let mut resolver = resolver(Some(Box::new(catalog)), LocalFontIndex::empty());
        resolver.ensure_defaults().await;

        let defaults = resolver.defaults();
        assert_eq!(defaults.regular.name, DEFAULT_KEY);
        assert!(defaults.regular.file_path.is_some());
        assert_eq!(defaults.bold, DefaultFonts::builtin().bold);
        assert_eq!(defaults.italic, DefaultFonts::builtin().italic);
        assert_eq!(listings.load(Ordering::SeqCst), 1);
    }

    struct UnlistedCatalog {
        downloads: Arc<AtomicUsize>,
    }

    impl FontCatalog for UnlistedCatalog {
        fn families(&self) -> CatalogFuture<FamilyCatalog> {
            Box::pin(async { Err(anyhow!("403 missing api key")) })
        }

        fn download(&self, _url: &str) -> CatalogFuture<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(TRUETYPE_STUB.to_vec()) })
        }
    }

    #[tokio::test]
    async fn bundled_defaults_download_without_catalog_listing() {
        let downloads = Arc::new(AtomicUsize::new(0));
        let catalog = UnlistedCatalog {
            downloads: downloads.clone(),
        };
        let options = ResolverOptions {
            default_urls: DefaultFontUrls {
                regular: Some("https://fonts.test/rc-400.ttf".to_string()),
                bold: Some("https://fonts.test/rc-700.ttf".to_string()),
                italic: None,
            },
            ..ResolverOptions::default()
        };
        let mut resolver = FontResolver::new(
            FontWorkspace::new().expect("workspace"),
            LocalFontIndex::empty(),
            Some(Box::new(catalog)),
            options,
        );

        let found = resolver
            .resolve("Futura-Bold", false, &StubSource::default())
            .await;
        assert_eq!(found.source, ResolutionSource::Fallback);
        assert_eq!(found.handle.name, DEFAULT_BOLD_KEY);
        assert!(found.handle.file_path.is_some());
        let defaults = resolver.defaults();
        assert!(defaults.regular.file_path.is_some());
        assert_eq!(defaults.italic, DefaultFonts::builtin().italic);
        assert_eq!(downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn embedded_ids_differing_in_punctuation_keep_their_programs() {
        let mut source = StubSource::default();
        source
            .programs
            .insert("A+B".to_string(), b"\0\x01\0\0plus".to_vec());
        source
            .programs
            .insert("A_B".to_string(), b"\0\x01\0\0underscore".to_vec());
        let mut resolver = resolver(None, LocalFontIndex::empty());

        let plus = resolver.resolve("A+B", true, &source).await;
        let underscore = resolver.resolve("A_B", true, &source).await;
        let plus_path = plus.handle.file_path.expect("plus file");
        let underscore_path = underscore.handle.file_path.expect("underscore file");
        assert_ne!(plus_path, underscore_path);
        assert_eq!(std::fs::read(&plus_path).expect("read"), b"\0\x01\0\0plus");
        assert_eq!(
            std::fs::read(&underscore_path).expect("read"),
            b"\0\x01\0\0underscore"
        );
    }
}
