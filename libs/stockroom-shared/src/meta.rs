//! Product metadata that legacy rows embed inside the free-text description.
//!
//! The markers are HTML comments so storefront renderers never show them:
//! `<!--PRICING:{json}-->` and one of `<!--FILE_URL:url-->` / `<!--FILE_PATH:path-->`.

use std::collections::BTreeMap;

const PRICING: &str = "PRICING";
const FILE_URL: &str = "FILE_URL";
const FILE_PATH: &str = "FILE_PATH";
const KNOWN_MARKERS: [&str; 3] = [PRICING, FILE_URL, FILE_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReference {
    /// Directly downloadable location.
    Url(String),
    /// Object path inside the product bucket.
    Path(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMeta {
    /// Duration label -> price, e.g. `1일 -> 7500`.
    pub pricing: BTreeMap<String, String>,
    pub file: Option<FileReference>,
}

impl ProductMeta {
    /// Splits a description into its display text and embedded metadata.
    pub fn parse(description: &str) -> (String, ProductMeta) {
        let mut meta = ProductMeta::default();

        if let Some(raw) = marker_value(description, PRICING) {
            meta.pricing = parse_pricing(raw);
        }
        if let Some(url) = marker_value(description, FILE_URL).map(str::trim) {
            if !url.is_empty() {
                meta.file = Some(FileReference::Url(url.to_string()));
            }
        }
        if meta.file.is_none() {
            if let Some(path) = marker_value(description, FILE_PATH).map(str::trim) {
                if !path.is_empty() {
                    meta.file = Some(FileReference::Path(path.to_string()));
                }
            }
        }

        (strip_markers(description), meta)
    }

    /// Appends the markers for this metadata to `text`.
    pub fn embed(&self, text: &str) -> String {
        let mut out = strip_markers(text);
        if !self.pricing.is_empty() {
            // BTreeMap<String, String> always serializes
            let json = serde_json::to_string(&self.pricing).unwrap_or_else(|_| "{}".to_string());
            out.push_str(&format!("\n<!--{}:{}-->", PRICING, json));
        }
        match &self.file {
            Some(FileReference::Url(url)) => out.push_str(&format!("\n<!--{}:{}-->", FILE_URL, url)),
            Some(FileReference::Path(path)) => {
                out.push_str(&format!("\n<!--{}:{}-->", FILE_PATH, path))
            }
            None => {}
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pricing.is_empty() && self.file.is_none()
    }
}

/// Removes every known marker and trailing whitespace left behind.
pub fn strip_markers(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    let mut rest = description;

    while let Some(start) = rest.find("<!--") {
        let after = &rest[start + 4..];
        let known = KNOWN_MARKERS
            .iter()
            .any(|name| after.starts_with(name) && after[name.len()..].starts_with(':'));
        match after.find("-->") {
            Some(end) if known => {
                out.push_str(&rest[..start]);
                rest = &after[end + 3..];
            }
            _ => {
                out.push_str(&rest[..start + 4]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.trim_end().to_string()
}

fn marker_value<'a>(description: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<!--{}:", name);
    let start = description.find(&open)? + open.len();
    let end = description[start..].find("-->")?;
    Some(&description[start..start + end])
}

fn parse_pricing(raw: &str) -> BTreeMap<String, String> {
    let parsed: BTreeMap<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(_) => return BTreeMap::new(),
    };
    parsed
        .into_iter()
        .filter_map(|(label, value)| match value {
            serde_json::Value::String(s) => Some((label, s)),
            serde_json::Value::Number(n) => Some((label, n.to_string())),
            _ => None,
        })
        .collect()
}
