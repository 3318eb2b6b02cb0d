//! Host-keyed strategy registry
//!
//! Sources are dispatched on their authority (scheme, host and non-default
//! port). Unknown authorities are an explicit error, never a silent no-op.

use crate::config::SiteProfile;
use crate::scrape::{ProfileStrategy, ScrapeStrategy};
use crate::url::authority_key;
use crate::{ConfigError, HarvestError};
use std::collections::HashMap;
use std::sync::Arc;

/// Strategy and profile selected for a source
#[derive(Clone)]
pub struct Dispatch {
    pub authority: String,
    pub profile: Arc<SiteProfile>,
    pub strategy: Arc<dyn ScrapeStrategy>,
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: HashMap<String, (Arc<SiteProfile>, Arc<dyn ScrapeStrategy>)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a [`ProfileStrategy`] for every profile
    pub fn from_profiles(profiles: &[SiteProfile]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for profile in profiles {
            let strategy = Arc::new(ProfileStrategy::new(profile));
            registry.register(profile.clone(), strategy)?;
        }
        Ok(registry)
    }

    /// Registers or replaces the strategy for a profile's authority
    pub fn register(
        &mut self,
        profile: SiteProfile,
        strategy: Arc<dyn ScrapeStrategy>,
    ) -> Result<(), ConfigError> {
        let key = authority_key(&profile.authority)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", profile.authority, e)))?;
        if self
            .entries
            .insert(key.clone(), (Arc::new(profile), strategy))
            .is_some()
        {
            tracing::debug!("Replaced strategy for {}", key);
        }
        Ok(())
    }

    /// Selects the strategy for a source URL
    ///
    /// # Errors
    ///
    /// * `HarvestError::UrlError` - The URL is not an absolute http(s) URL
    /// * `HarvestError::NoStrategy` - No profile is registered for its authority
    pub fn dispatch(&self, uri: &str) -> Result<Dispatch, HarvestError> {
        let authority = authority_key(uri)?;
        let (profile, strategy) = self
            .entries
            .get(&authority)
            .ok_or_else(|| HarvestError::NoStrategy {
                authority: authority.clone(),
            })?;

        Ok(Dispatch {
            authority,
            profile: Arc::clone(profile),
            strategy: Arc::clone(strategy),
        })
    }

    /// Registered authorities, sorted
    pub fn authorities(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
