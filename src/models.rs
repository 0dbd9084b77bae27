use std::fmt;
use serde::{Serialize, Serializer};

/// Column header of the output CSV, in write order.
pub const OUTPUT_COLUMNS: [&str; 8] = [
    "Email",
    "Name",
    "LinkedIn_URL",
    "LinkedIn_Name",
    "Job_Title",
    "Company",
    "Confidence_Level",
    "Status",
];

/// One input row. `email` is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Identity {
            email: email.into().trim().to_string(),
            name: name.into().trim().to_string(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Pending,
    Found,
    NotFound,
    SearchFailed,
    Error(String),
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "Pending"),
            MatchStatus::Found => write!(f, "Found"),
            MatchStatus::NotFound => write!(f, "Not Found"),
            MatchStatus::SearchFailed => write!(f, "Search Failed"),
            MatchStatus::Error(detail) => write!(f, "Error: {}", detail),
        }
    }
}

impl Serialize for MatchStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    No,
}

/// What the enrichment provider returns for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub profile_url: String,
    pub profile_name: String,
    pub job_title: String,
    pub company: String,
    pub confidence: Option<ConfidenceLevel>,
    pub status: MatchStatus,
}

impl EnrichmentResult {
    pub fn with_status(status: MatchStatus) -> Self {
        EnrichmentResult {
            profile_url: String::new(),
            profile_name: String::new(),
            job_title: String::new(),
            company: String::new(),
            confidence: None,
            status,
        }
    }

    pub fn pending() -> Self {
        Self::with_status(MatchStatus::Pending)
    }

    pub fn not_found() -> Self {
        Self::with_status(MatchStatus::NotFound)
    }
}

/// A full output row: identity fields followed by the enrichment fields.
/// Field order matches `OUTPUT_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "LinkedIn_URL")]
    pub profile_url: String,
    #[serde(rename = "LinkedIn_Name")]
    pub profile_name: String,
    #[serde(rename = "Job_Title")]
    pub job_title: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Confidence_Level")]
    pub confidence: Option<ConfidenceLevel>,
    #[serde(rename = "Status")]
    pub status: MatchStatus,
}

impl OutputRecord {
    pub fn new(identity: &Identity, result: EnrichmentResult) -> Self {
        OutputRecord {
            email: identity.email.clone(),
            name: identity.name.clone(),
            profile_url: result.profile_url,
            profile_name: result.profile_name,
            job_title: result.job_title,
            company: result.company,
            confidence: result.confidence,
            status: result.status,
        }
    }
}
