//! Command-line and environment configuration shared by both binaries.

use clap::{Args, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MatcherError, ProviderError, Result};
use crate::linkedin::{LinkedInProvider, LinkedInSettings};
use crate::pipeline::PipelineOptions;
use crate::provider::{Credentials, EnrichmentProvider, PlaceholderProvider};

/// Which enrichment provider a run uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Signs in to LinkedIn and searches for each identity
    Linkedin,
    /// Writes every identity back as Pending without any lookup
    Placeholder,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Linkedin => write!(f, "linkedin"),
            ProviderKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MatcherArgs {
    /// CSV (or xlsx) file with an `Email` column and an optional `Name` column.
    #[arg(short, long, default_value = "input_emails.csv", env = "MATCHER_INPUT")]
    pub input: PathBuf,

    /// Output CSV. Appended to, and used as the resume checkpoint.
    #[arg(short, long, default_value = "linkedin_results.csv", env = "MATCHER_OUTPUT")]
    pub output: PathBuf,

    /// Pause between two lookups, in seconds.
    #[arg(long, default_value_t = 5, env = "MATCHER_DELAY_SECS")]
    pub delay_secs: u64,

    /// Base pause between page loads inside one lookup, in seconds.
    #[arg(long, default_value_t = 3, env = "MATCHER_PAGE_DELAY_SECS")]
    pub page_delay_secs: u64,

    /// HTTP request timeout, in seconds.
    #[arg(long, default_value_t = 30, env = "MATCHER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    #[arg(long, env = "LINKEDIN_EMAIL")]
    pub linkedin_email: Option<String>,

    #[arg(long, env = "LINKEDIN_PASSWORD", hide_env_values = true)]
    pub linkedin_password: Option<String>,

    #[arg(long, value_enum, default_value_t = ProviderKind::Linkedin, env = "MATCHER_PROVIDER")]
    pub provider: ProviderKind,

    /// Fall back to a public web search when the LinkedIn search finds nobody.
    #[arg(long, default_value = "false", env = "MATCHER_FALLBACK_SEARCH")]
    pub fallback_search: bool,

    /// Append log lines to this file instead of stderr.
    #[arg(long, env = "MATCHER_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub delay: Duration,
    pub credentials: Credentials,
    pub provider: ProviderKind,
    pub linkedin: LinkedInSettings,
}

impl MatcherArgs {
    /// Validates the arguments. Missing credentials are fatal for the
    /// LinkedIn provider; there is no interactive prompt.
    pub fn resolve(&self) -> Result<MatcherConfig> {
        let email = self.linkedin_email.as_deref().map(str::trim).unwrap_or("");
        let password = self.linkedin_password.as_deref().unwrap_or("");
        if self.provider == ProviderKind::Linkedin && (email.is_empty() || password.is_empty()) {
            return Err(MatcherError::MissingCredentials);
        }
        if self.request_timeout_secs == 0 {
            return Err(MatcherError::Config("request timeout must be at least 1 second".to_string()));
        }

        Ok(MatcherConfig {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            delay: Duration::from_secs(self.delay_secs),
            credentials: Credentials {
                email: email.to_string(),
                password: password.to_string(),
            },
            provider: self.provider,
            linkedin: LinkedInSettings {
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                page_delay: Duration::from_secs(self.page_delay_secs),
                fallback_search: self.fallback_search,
            },
        })
    }
}

impl MatcherConfig {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            delay: self.delay,
            credentials: self.credentials.clone(),
        }
    }

    /// Must be called off any async runtime: the LinkedIn provider owns a
    /// blocking HTTP client.
    pub fn build_provider(&self) -> std::result::Result<Box<dyn EnrichmentProvider>, ProviderError> {
        match self.provider {
            ProviderKind::Linkedin => Ok(Box::new(LinkedInProvider::new(&self.linkedin)?)),
            ProviderKind::Placeholder => Ok(Box::new(PlaceholderProvider)),
        }
    }
}
