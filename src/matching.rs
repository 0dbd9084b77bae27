use crate::extractor::ProfileCandidate;
use crate::models::{ConfidenceLevel, Identity};
use crate::profile_url;

/// Decides which search candidate, if any, belongs to an identity and how
/// sure that decision is. Providers delegate to this so the policy can be
/// swapped without touching the page handling.
pub trait MatchStrategy: Send {
    fn select(
        &self,
        identity: &Identity,
        candidates: &[ProfileCandidate],
    ) -> Option<(ProfileCandidate, Option<ConfidenceLevel>)>;
}

/// Takes the first plausible profile and makes no confidence claim.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl MatchStrategy for FirstCandidate {
    fn select(
        &self,
        _identity: &Identity,
        candidates: &[ProfileCandidate],
    ) -> Option<(ProfileCandidate, Option<ConfidenceLevel>)> {
        candidates
            .iter()
            .find(|c| profile_url::is_plausible_profile(&c.url))
            .cloned()
            .map(|c| (c, None))
    }
}
