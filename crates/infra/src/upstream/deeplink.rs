//! Deep-link extraction from payment redirect pages.

use regex::Regex;

/// Finds the app-level payment URI in a payment page body.
///
/// Tries a bare `scheme://...` URI first, then a quoted
/// `deeplink: "..."` / `deepLink = "..."` assignment. Common JS/HTML escapes
/// (`&`, `\/`, `&amp;`) are undone before matching.
#[derive(Debug, Clone)]
pub struct DeepLinkExtractor {
    bare: Regex,
    quoted: Regex,
}

impl DeepLinkExtractor {
    pub fn new(scheme: &str) -> Result<Self, regex::Error> {
        let bare = Regex::new(&format!(r#"{}://[^\s"'<>\\]+"#, regex::escape(scheme)))?;
        let quoted = Regex::new(r#"(?i)deep_?link["']?\s*[:=]\s*["']([^"']+)["']"#)?;
        Ok(Self { bare, quoted })
    }

    pub fn extract(&self, body: &str) -> Option<String> {
        let body = body
            .replace("\\u0026", "&")
            .replace("\\/", "/")
            .replace("&amp;", "&");

        if let Some(m) = self.bare.find(&body) {
            return Some(m.as_str().to_string());
        }
        self.quoted
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|link| !link.is_empty())
    }
}
