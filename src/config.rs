//! Adapter configuration
//!
//! Defaults cover the common deployment. A TOML document can override any
//! field, and `DOCSTORE_*` environment variables override both.

use serde::Deserialize;

use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::{AdapterError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    /// Header carrying the bearer token
    pub auth_header: String,
    /// Scheme prefix stripped from the header value
    pub token_scheme: String,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            auth_header: "authorization".to_string(),
            token_scheme: "Bearer".to_string(),
            default_page_size: DEFAULT_PAGE_SIZE as usize,
            max_page_size: 100,
        }
    }
}

impl AdapterConfig {
    /// Parse from TOML; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| AdapterError::Validation(format!("invalid adapter config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCSTORE_AUTH_HEADER`, `DOCSTORE_TOKEN_SCHEME`,
    /// `DOCSTORE_DEFAULT_PAGE_SIZE` and `DOCSTORE_MAX_PAGE_SIZE`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(header) = lookup("DOCSTORE_AUTH_HEADER") {
            self.auth_header = header;
        }
        if let Some(scheme) = lookup("DOCSTORE_TOKEN_SCHEME") {
            self.token_scheme = scheme;
        }
        if let Some(raw) = lookup("DOCSTORE_DEFAULT_PAGE_SIZE") {
            self.default_page_size = parse_size("DOCSTORE_DEFAULT_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("DOCSTORE_MAX_PAGE_SIZE") {
            self.max_page_size = parse_size("DOCSTORE_MAX_PAGE_SIZE", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_header.trim().is_empty() {
            return Err(AdapterError::Validation(
                "auth_header cannot be empty".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(AdapterError::Validation(
                "page sizes must be positive".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(AdapterError::Validation(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }
}

fn parse_size(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| AdapterError::Validation(format!("{key} must be a positive integer, got '{raw}'")))
}
