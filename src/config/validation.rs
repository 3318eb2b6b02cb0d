use crate::config::types::{BrowserConfig, Config, HarvesterConfig, OutputConfig, SiteProfile};
use crate::url::authority_key;
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates global fetch settings
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if config.loader_max_attempts < 1 || config.chapter_max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "attempt caps must be >= 1, got loader={} chapter={}",
            config.loader_max_attempts, config.chapter_max_attempts
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.pool_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "pool_capacity must be >= 1, got {}",
            config.pool_capacity
        )));
    }

    if config.poll_interval_ms == 0 || config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "poll_interval_ms and navigation_timeout_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates site profiles: unique authorities, usable templates, parseable selectors
fn validate_sites(sites: &[SiteProfile]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for site in sites {
        let key = authority_key(&site.authority).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid authority '{}': {}", site.authority, e))
        })?;

        if !seen.insert(key.clone()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site profile for {}",
                key
            )));
        }

        if !site.pagination.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "Pagination template for {} must contain {{page}}",
                key
            )));
        }

        if site.concurrency == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Site concurrency for {} must be >= 1",
                key
            )));
        }

        validate_selectors(site)?;
    }

    Ok(())
}

fn validate_selectors(site: &SiteProfile) -> Result<(), ConfigError> {
    let mut selectors = site.selectors.named();
    if let Some(wait) = &site.wait_selector {
        selectors.push(("wait-selector", wait.as_str()));
    }

    for (field, selector) in selectors {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: field.to_string(),
                selector: selector.to_string(),
            });
        }
    }

    Ok(())
}
