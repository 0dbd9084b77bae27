use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};
use std::time::Duration;
use log::{info, warn};
use url::Url;

use crate::error::ProviderError;
use crate::extractor::ProfileCandidate;
use crate::models::Identity;
use crate::profile_url;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Public web search used when the logged-in people search comes back empty.
pub struct SearchEngine {
    client: Client,
    result_link: Selector,
}

impl SearchEngine {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(concat!("profile-matcher/", env!("CARGO_PKG_VERSION"))));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(SearchEngine {
            client,
            result_link: Selector::parse(".result__a").unwrap(),
        })
    }

    pub fn find_profiles(&self, identity: &Identity) -> Result<Vec<ProfileCandidate>, ProviderError> {
        let query = search_query(identity);
        info!("Searching the web for: '{}'", query);

        let search_url = format!("{}?q={}", SEARCH_ENDPOINT, urlencoding::encode(&query));
        let resp = self.client.get(&search_url).send()?;
        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(ProviderError::Blocked(status.as_u16()));
        }
        if !status.is_success() {
            warn!("Search failed with status: {}", status);
            return Ok(Vec::new());
        }

        let text = resp.text()?;
        Ok(self.parse_duckduckgo_results(&text))
    }

    fn parse_duckduckgo_results(&self, html: &str) -> Vec<ProfileCandidate> {
        let document = Html::parse_document(html);
        let mut candidates: Vec<ProfileCandidate> = Vec::new();

        for element in document.select(&self.result_link) {
            let Some(href) = element.value().attr("href") else { continue };
            let Some(url) = unwrap_redirect(href).and_then(|u| profile_url::normalize(&u).ok()) else {
                continue;
            };
            if candidates.iter().any(|c| c.url == url) {
                continue;
            }

            let title = element.text().collect::<String>();
            let (name, job_title, company) = split_result_title(&title);
            candidates.push(ProfileCandidate { url, name, job_title, company });
        }

        if candidates.is_empty() {
            warn!("No LinkedIn profiles in top search results.");
        }
        candidates
    }
}

fn search_query(identity: &Identity) -> String {
    let domain = identity.email.split('@').nth(1).unwrap_or("");
    if identity.has_name() {
        format!("site:linkedin.com/in \"{}\" {}", identity.name, domain)
    } else {
        format!("site:linkedin.com/in \"{}\"", identity.email)
    }
}

/// Result links point at a redirector carrying the target in `uddg`.
fn unwrap_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    if parsed.domain().map_or(false, |d| d.ends_with("duckduckgo.com")) {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

/// "Jane Doe - Product Manager - Tech Corp | LinkedIn" -> name, title, company.
fn split_result_title(title: &str) -> (String, String, String) {
    let title = title.trim();
    let title = title.strip_suffix("| LinkedIn").unwrap_or(title).trim();
    let mut parts = title.splitn(3, " - ").map(|p| p.trim().to_string());
    (
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_parsing() {
        let engine = SearchEngine::new(Duration::from_secs(5)).unwrap();
        let html = r#"
            <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fuk.linkedin.com%2Fin%2Fnope&rut=1">Elsewhere</a></div>
            <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.linkedin.com%2Fin%2Fjane-doe%3Ftrk%3Dx&rut=2">Jane Doe - Product Manager - Tech Corp | LinkedIn</a></div>
            <div class="result"><a class="result__a" href="https://linkedin.com/in/jane-doe/">Jane Doe | LinkedIn</a></div>
        "#;

        let candidates = engine.parse_duckduckgo_results(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://www.linkedin.com/in/jane-doe");
        assert_eq!(candidates[0].name, "Jane Doe");
        assert_eq!(candidates[0].job_title, "Product Manager");
        assert_eq!(candidates[0].company, "Tech Corp");
    }

    #[test]
    fn query_uses_name_and_domain() {
        assert_eq!(
            search_query(&Identity::new("jane@techcorp.com", "Jane Doe")),
            "site:linkedin.com/in \"Jane Doe\" techcorp.com"
        );
        assert_eq!(
            search_query(&Identity::new("jane@techcorp.com", "")),
            "site:linkedin.com/in \"jane@techcorp.com\""
        );
    }
}
