//! LinkedIn profile URL validation and normalisation.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("URL is required")]
    Empty,
    #[error("Invalid LinkedIn URL format: {0}")]
    NotAProfile(String),
}

fn re_vanity_profile() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https://(?:www\.)?linkedin\.com/in/([a-z0-9-]+)$").unwrap())
}

fn re_legacy_profile() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https://(?:www\.)?linkedin\.com/profile/view\?id=[0-9]+$").unwrap())
}

fn re_slug_junk() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").unwrap())
}

fn re_whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_hyphens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").unwrap())
}

/// Returns the canonical `https://www.linkedin.com/...` form of a profile URL.
pub fn normalize(url: &str) -> Result<String, UrlError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let lowered = trimmed.to_lowercase();
    let mut clean = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        lowered
    } else {
        format!("https://{}", lowered)
    };
    if let Some(rest) = clean.strip_prefix("http://") {
        clean = format!("https://{}", rest);
    }

    // The legacy numeric form carries its id in the query string.
    if !re_legacy_profile().is_match(&clean) {
        if let Some(idx) = clean.find(['?', '#']) {
            clean.truncate(idx);
        }
        while clean.ends_with('/') {
            clean.pop();
        }
        if !re_vanity_profile().is_match(&clean) {
            return Err(UrlError::NotAProfile(clean));
        }
    }

    Ok(clean.replacen("https://linkedin.com", "https://www.linkedin.com", 1))
}

/// The vanity name of a `/in/` profile URL.
pub fn username(url: &str) -> Option<String> {
    let normalized = normalize(url).ok()?;
    re_vanity_profile()
        .captures(&normalized)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// A valid `/in/` URL whose vanity name looks like one LinkedIn would issue.
pub fn is_plausible_profile(url: &str) -> bool {
    match username(url) {
        Some(name) => (3..=50).contains(&name.len()) && !name.contains("--"),
        None => false,
    }
}

/// Builds the vanity slug a person would most likely have, from their name or,
/// failing that, the local part of their email. Empty when neither yields one.
pub fn slug_from_identity(name: &str, email: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = re_slug_junk().replace_all(&lowered, "");
    let dashed = re_whitespace().replace_all(stripped.trim(), "-");
    let mut slug: String = re_hyphens().replace_all(&dashed, "-").chars().take(50).collect();

    if slug.is_empty() && name.trim().is_empty() {
        slug = email
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
    }
    slug
}
