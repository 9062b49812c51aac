use regex::Regex;
use std::sync::LazyLock;

use crate::span::strip_subset_prefix;

static STYLE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_ ,]*(?:Bold|Italic|Regular|Oblique).*$").expect("regex"));
static CAMEL_LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("regex"));
static CAMEL_ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("regex"));

const STYLE_SUFFIXES: &[&str] = &[
    "BoldItalic",
    "BoldOblique",
    "Regular",
    "Italic",
    "Oblique",
    "Bold",
];

/// Lowercase letters only; the form local font keys are compared in.
pub fn letters_lower(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphabetic())
        .flat_map(|ch| ch.to_lowercase())
        .collect()
}

/// Normalizes a font id for the local directory search. A `PSMT` tail (Windows
/// PostScript naming, e.g. `TimesNewRomanPSMT`) maps to the family's Regular form.
pub fn local_query(font_id: &str) -> String {
    let name = strip_subset_prefix(font_id);
    if let Some(family) = name.strip_suffix("PSMT") {
        let family = family.trim_end_matches(['-', '_', ' ']);
        return letters_lower(&format!("{family}Regular"));
    }
    letters_lower(name)
}

/// Removes the first style word and everything after it, keeping at least one
/// character of the family.
fn strip_style_tail(name: &str) -> &str {
    match STYLE_TAIL.find(name) {
        Some(found) if found.start() > 0 => &name[..found.start()],
        _ => name,
    }
}

fn strip_postscript_tail(name: &str) -> &str {
    for tail in ["PSMT", "MT", "PS"] {
        if let Some(rest) = name.strip_suffix(tail)
            && rest.chars().last().is_some_and(|ch| ch.is_lowercase())
        {
            return rest;
        }
    }
    name
}

/// Human family name used against the catalog: `ABCDEF+OpenSans-BoldItalic`
/// becomes `open sans`.
pub fn family_query(font_id: &str) -> String {
    let name = strip_subset_prefix(font_id);
    let name = strip_style_tail(name);
    let name = strip_postscript_tail(name);
    let spaced = CAMEL_ACRONYM.replace_all(name, "$1 $2");
    let spaced = CAMEL_LOWER_UPPER.replace_all(&spaced, "$1 $2");
    spaced
        .split(|ch: char| ch == '-' || ch == '_' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable, filename-safe key for a family: `Open Sans` becomes `OpenSans`.
pub fn family_key(family: &str) -> String {
    family
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Family part of a font name with any trailing style suffix removed:
/// `OpenSans-BoldItalic` becomes `OpenSans`.
pub fn family_stem(name: &str) -> String {
    let name = strip_subset_prefix(name);
    for suffix in STYLE_SUFFIXES {
        if let Some(rest) = name.strip_suffix(suffix) {
            let rest = rest.trim_end_matches(['-', '_', ' ', ',']);
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    strip_style_tail(name).to_string()
}

/// Replaces a trailing Bold/Italic/BoldItalic suffix with Regular.
pub fn regular_counterpart(name: &str) -> Option<String> {
    for suffix in ["BoldItalic", "BoldOblique", "Italic", "Oblique", "Bold"] {
        if let Some(rest) = name.strip_suffix(suffix)
            && !rest.is_empty()
        {
            return Some(format!("{rest}Regular"));
        }
    }
    None
}

/// Alternate registry keys for a remotely resolved id: without the subset prefix,
/// without hyphens, and the bare family name.
pub fn alias_forms(font_id: &str) -> Vec<String> {
    let bare = strip_subset_prefix(font_id);
    let mut forms = vec![bare.to_string(), bare.replace('-', "")];
    let family = strip_style_tail(bare).replace(['-', ' '], "");
    if !family.is_empty() {
        forms.push(family);
    }
    forms.retain(|form| !form.is_empty() && form != font_id);
    forms.dedup();
    forms
}

/// File-system safe stem for a font name. A short digest of the raw name
/// keeps names that only differ in punctuation on separate files.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let digest = format!("{:x}", md5::compute(name.as_bytes()));
    let base = if cleaned.is_empty() { "font" } else { &cleaned };
    format!("{}-{}", base, &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_query_strips_prefix_and_psmt() {
        assert_eq!(local_query("ABCDEF+Arial-BoldMT"), "arialboldmt");
        assert_eq!(local_query("TimesNewRomanPSMT"), "timesnewromanregular");
    }

    #[test]
    fn family_query_splits_camel_case() {
        assert_eq!(family_query("ABCDEF+OpenSans-BoldItalic"), "open sans");
        assert_eq!(family_query("SourceSerifPro-Regular"), "source serif pro");
        assert_eq!(family_query("PTSans-Bold"), "pt sans");
        assert_eq!(family_query("Lato"), "lato");
        assert_eq!(family_query("ArialMT"), "arial");
    }

    #[test]
    fn family_key_is_stable() {
        assert_eq!(family_key("Open Sans"), "OpenSans");
        assert_eq!(family_key("roboto condensed"), "RobotoCondensed");
    }

    #[test]
    fn alias_forms_cover_prefix_hyphen_and_family() {
        let forms = alias_forms("ABCDEF+OpenSans-Bold");
        assert_eq!(forms, vec!["OpenSans-Bold", "OpenSansBold", "OpenSans"]);
    }

    #[test]
    fn stems_and_regular_counterparts() {
        assert_eq!(family_stem("OpenSans-BoldItalic"), "OpenSans");
        assert_eq!(family_stem("RobotoCondensed-Regular"), "RobotoCondensed");
        assert_eq!(family_stem("Lato"), "Lato");
        assert_eq!(
            regular_counterpart("OpenSans-Bold").as_deref(),
            Some("OpenSans-Regular")
        );
        assert_eq!(regular_counterpart("OpenSans"), None);
    }

    #[test]
    fn file_stems_keep_punctuation_variants_apart() {
        let plus = sanitize_file_stem("A+B");
        let underscore = sanitize_file_stem("A_B");
        assert_ne!(plus, underscore);
        assert!(plus.starts_with("A_B-"));
        assert_eq!(plus, sanitize_file_stem("A+B"));
        assert_ne!(sanitize_file_stem("Font.One"), sanitize_file_stem("Font One"));
        assert!(sanitize_file_stem("").starts_with("font-"));
    }
}
