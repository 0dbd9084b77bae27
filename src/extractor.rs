use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::profile_url;

/// A profile link found on a search page, before any matching decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileCandidate {
    pub url: String,
    pub name: String,
    pub job_title: String,
    pub company: String,
}

pub struct Extractor {
    csrf_input: Selector,
    result_card: Selector,
    profile_link: Selector,
    card_name: Selector,
    card_subtitle: Selector,
    page_title: Selector,
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            csrf_input: Selector::parse(r#"input[name="loginCsrfParam"]"#).unwrap(),
            result_card: Selector::parse("li.reusable-search__result-container, div.entity-result").unwrap(),
            profile_link: Selector::parse(r#"a[href*="/in/"]"#).unwrap(),
            card_name: Selector::parse(r#"span.entity-result__title-text span[aria-hidden="true"], span[aria-hidden="true"]"#).unwrap(),
            card_subtitle: Selector::parse(".entity-result__primary-subtitle").unwrap(),
            page_title: Selector::parse("title").unwrap(),
        }
    }

    /// The hidden CSRF token on the login form.
    pub fn login_csrf(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let token = document
            .select(&self.csrf_input)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        token
    }

    /// The person's name from a profile page title ("Jane Doe | LinkedIn").
    pub fn profile_page_name(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let title = document.select(&self.page_title).next().map(element_text)?;
        let before_bar = title.split('|').next().unwrap_or("");
        let name = before_bar.split(" - ").next().unwrap_or("").trim().to_string();
        if name.is_empty() || name.eq_ignore_ascii_case("linkedin") {
            None
        } else {
            Some(name)
        }
    }

    /// Profile candidates from a people-search results page, in page order,
    /// one per distinct profile URL.
    pub fn people_results(&self, html: &str) -> Vec<ProfileCandidate> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for card in document.select(&self.result_card) {
            if let Some(candidate) = self.card_candidate(card) {
                if seen.insert(candidate.url.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        // Layout without result cards: fall back to bare profile links.
        if candidates.is_empty() {
            for link in document.select(&self.profile_link) {
                let Some(url) = link.value().attr("href").and_then(absolute_profile_url) else {
                    continue;
                };
                if seen.insert(url.clone()) {
                    candidates.push(ProfileCandidate {
                        url,
                        name: element_text(link),
                        ..ProfileCandidate::default()
                    });
                }
            }
        }
        candidates
    }

    fn card_candidate(&self, card: ElementRef) -> Option<ProfileCandidate> {
        let url = card
            .select(&self.profile_link)
            .filter_map(|a| a.value().attr("href"))
            .find_map(absolute_profile_url)?;

        let name = card
            .select(&self.card_name)
            .map(element_text)
            .find(|t| !t.is_empty())
            .unwrap_or_default();
        let headline = card
            .select(&self.card_subtitle)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let (job_title, company) = split_headline(&headline);

        Some(ProfileCandidate { url, name, job_title, company })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute_profile_url(href: &str) -> Option<String> {
    let href = href.trim();
    let full = if href.starts_with('/') {
        format!("https://www.linkedin.com{}", href)
    } else {
        href.to_string()
    };
    profile_url::normalize(&full).ok()
}

/// Splits a headline such as "Product Manager at Acme" into title and company.
/// Without a separator the whole headline is the title.
pub fn split_headline(headline: &str) -> (String, String) {
    let headline = headline.trim();
    for sep in [" at ", " @ ", " | "] {
        if let Some((title, company)) = headline.split_once(sep) {
            return (title.trim().to_string(), company.trim().to_string());
        }
    }
    (headline.to_string(), String::new())
}
