use reqwest::blocking::{Client, Response};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, info, warn};
use url::Url;

use crate::delay_manager;
use crate::error::ProviderError;
use crate::extractor::{Extractor, ProfileCandidate};
use crate::matching::{FirstCandidate, MatchStrategy};
use crate::models::{EnrichmentResult, Identity, MatchStatus};
use crate::profile_url;
use crate::provider::{Credentials, EnrichmentProvider};
use crate::search_engine::SearchEngine;

const BASE_URL: &str = "https://www.linkedin.com";
const LOGIN_PAGE: &str = "https://www.linkedin.com/login";
const LOGIN_SUBMIT: &str = "https://www.linkedin.com/checkpoint/lg/login-submit";
const LOGOUT: &str = "https://www.linkedin.com/m/logout/";
const PEOPLE_SEARCH: &str = "https://www.linkedin.com/search/results/people/";
const SESSION_COOKIE: &str = "li_at";

#[derive(Debug, Clone)]
pub struct LinkedInSettings {
    pub request_timeout: Duration,
    pub page_delay: Duration,
    pub fallback_search: bool,
}

impl Default for LinkedInSettings {
    fn default() -> Self {
        LinkedInSettings {
            request_timeout: Duration::from_secs(30),
            page_delay: Duration::from_secs(3),
            fallback_search: false,
        }
    }
}

pub struct LinkedInProvider {
    client: Client,
    jar: Arc<Jar>,
    extractor: Extractor,
    search_engine: Option<SearchEngine>,
    strategy: Box<dyn MatchStrategy>,
    page_delay: Duration,
    logged_in: bool,
}

impl LinkedInProvider {
    pub fn new(settings: &LinkedInSettings) -> Result<Self, ProviderError> {
        Self::with_strategy(settings, Box::new(FirstCandidate))
    }

    pub fn with_strategy(
        settings: &LinkedInSettings,
        strategy: Box<dyn MatchStrategy>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .build()?;

        let search_engine = if settings.fallback_search {
            Some(SearchEngine::new(settings.request_timeout)?)
        } else {
            None
        };

        Ok(LinkedInProvider {
            client,
            jar,
            extractor: Extractor::new(),
            search_engine,
            strategy,
            page_delay: settings.page_delay,
            logged_in: false,
        })
    }

    fn has_session_cookie(&self) -> bool {
        let Ok(base) = Url::parse(BASE_URL) else { return false };
        self.jar
            .cookies(&base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
            .map_or(false, |cookies| {
                cookies
                    .split(';')
                    .any(|c| c.trim().starts_with(&format!("{}=", SESSION_COOKIE)))
            })
    }

    fn read_page(&self, resp: Response) -> Result<String, ProviderError> {
        let status = resp.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(ProviderError::Blocked(status.as_u16()));
        }
        let path = resp.url().path().to_string();
        if path.starts_with("/login") || path.starts_with("/authwall") || path.starts_with("/uas/login") {
            warn!("Redirected to the sign-in wall; the LinkedIn session is no longer valid.");
            return Err(ProviderError::NotLoggedIn);
        }
        if !status.is_success() {
            return Err(ProviderError::Other(format!("HTTP {} from {}", status, path)));
        }
        Ok(resp.text()?)
    }

    fn search_people(&self, identity: &Identity) -> Result<Vec<ProfileCandidate>, ProviderError> {
        let keywords = if identity.has_name() { &identity.name } else { &identity.email };
        info!("Searching LinkedIn for: '{}'", keywords);

        let resp = self
            .client
            .get(PEOPLE_SEARCH)
            .query(&[("keywords", keywords.as_str()), ("origin", "GLOBAL_SEARCH_HEADER")])
            .send()?;
        let html = self.read_page(resp)?;
        Ok(self.extractor.people_results(&html))
    }

    /// Tries the vanity URL the identity would most likely have.
    fn probe_vanity_url(&self, identity: &Identity) -> Option<ProfileCandidate> {
        let slug = profile_url::slug_from_identity(&identity.name, &identity.email);
        let url = format!("{}/in/{}", BASE_URL, slug);
        if slug.is_empty() || !profile_url::is_plausible_profile(&url) {
            return None;
        }

        debug!("Probing {}", url);
        delay_manager::random_page_delay(self.page_delay);
        let resp = self.client.get(&url).send().ok()?;
        if !resp.url().path().starts_with("/in/") {
            return None;
        }
        let html = self.read_page(resp).ok()?;
        Some(ProfileCandidate {
            url: profile_url::normalize(&url).ok()?,
            name: self.extractor.profile_page_name(&html).unwrap_or_default(),
            ..ProfileCandidate::default()
        })
    }

    fn result_for(&self, identity: &Identity, candidates: &[ProfileCandidate]) -> EnrichmentResult {
        match self.strategy.select(identity, candidates) {
            Some((chosen, confidence)) => {
                info!("Matched {} to {}", identity.email, chosen.url);
                EnrichmentResult {
                    profile_url: chosen.url,
                    profile_name: chosen.name,
                    job_title: chosen.job_title,
                    company: chosen.company,
                    confidence,
                    status: MatchStatus::Found,
                }
            }
            None => {
                info!("No profile matched {}", identity.email);
                EnrichmentResult::not_found()
            }
        }
    }
}

impl EnrichmentProvider for LinkedInProvider {
    fn login(&mut self, credentials: &Credentials) -> Result<bool, ProviderError> {
        info!("Signing in to LinkedIn as {}", credentials.email);

        // Served under /login, so it bypasses read_page.
        let html = self.client.get(LOGIN_PAGE).send()?.error_for_status()?.text()?;
        let csrf = self
            .extractor
            .login_csrf(&html)
            .ok_or_else(|| ProviderError::Parse("login form has no CSRF token".to_string()))?;

        delay_manager::random_page_delay(self.page_delay);

        let resp = self
            .client
            .post(LOGIN_SUBMIT)
            .form(&[
                ("session_key", credentials.email.as_str()),
                ("session_password", credentials.password.as_str()),
                ("loginCsrfParam", csrf.as_str()),
            ])
            .send()?;

        let landed = resp.url().path().to_string();
        if landed.contains("/checkpoint/challenge") {
            warn!("LinkedIn asked for a security challenge; complete it in a browser and retry.");
            return Ok(false);
        }

        self.logged_in = self.has_session_cookie();
        if self.logged_in {
            info!("LinkedIn session established.");
        } else {
            warn!("LinkedIn sign-in did not yield a session (landed on {}).", landed);
        }
        Ok(self.logged_in)
    }

    fn lookup(&mut self, identity: &Identity) -> Result<EnrichmentResult, ProviderError> {
        if !self.logged_in {
            return Err(ProviderError::NotLoggedIn);
        }

        delay_manager::random_page_delay(self.page_delay);

        let mut candidates = match self.search_people(identity) {
            Ok(found) => found,
            Err(ProviderError::Blocked(code)) => {
                warn!("Search blocked with HTTP {} for {}", code, identity.email);
                return Ok(EnrichmentResult::with_status(MatchStatus::SearchFailed));
            }
            Err(e) => return Err(e),
        };

        if candidates.is_empty() {
            candidates.extend(self.probe_vanity_url(identity));
        }

        if candidates.is_empty() {
            if let Some(engine) = &self.search_engine {
                match engine.find_profiles(identity) {
                    Ok(found) => candidates = found,
                    Err(e) => {
                        warn!("Fallback search failed for {}: {}", identity.email, e);
                        return Ok(EnrichmentResult::with_status(MatchStatus::SearchFailed));
                    }
                }
            }
        }

        Ok(self.result_for(identity, &candidates))
    }

    fn logout(&mut self) {
        if !self.logged_in {
            return;
        }
        match self.client.get(LOGOUT).send() {
            Ok(_) => info!("Signed out of LinkedIn."),
            Err(e) => warn!("LinkedIn sign-out failed: {}", e),
        }
        self.logged_in = false;
    }
}
