use std::fmt;

use crate::error::ProviderError;
use crate::models::{EnrichmentResult, Identity};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Maps an identity to profile data. Calls are blocking and may take seconds.
///
/// `login` runs once before a batch; `logout` runs once after it, on every
/// exit path, whether or not `login` succeeded.
pub trait EnrichmentProvider: Send {
    fn login(&mut self, credentials: &Credentials) -> Result<bool, ProviderError>;

    fn lookup(&mut self, identity: &Identity) -> Result<EnrichmentResult, ProviderError>;

    fn logout(&mut self) {}
}

/// Writes every identity back unresolved with status `Pending`.
#[derive(Debug, Default)]
pub struct PlaceholderProvider;

impl EnrichmentProvider for PlaceholderProvider {
    fn login(&mut self, _credentials: &Credentials) -> Result<bool, ProviderError> {
        Ok(true)
    }

    fn lookup(&mut self, _identity: &Identity) -> Result<EnrichmentResult, ProviderError> {
        Ok(EnrichmentResult::pending())
    }
}
