//! Engine configuration.
//!
//! # Invariants
//! - Every field has a default; partial documents deserialize.
//! - `validate()` must pass before a config is handed to services.

use crate::recurrence::{OccurrenceGenerator, DEFAULT_HORIZON_MONTHS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PUBLISH_BUFFER: usize = 64;

/// Tunables of the recurrence engine and query paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Generation horizon for rules with neither `count` nor `until`.
    pub horizon_months: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Per-subscriber bound of `ChannelPublisher` queues.
    pub publish_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_months: DEFAULT_HORIZON_MONTHS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            publish_buffer: DEFAULT_PUBLISH_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{0}` must be at least 1")]
    MustBePositive(&'static str),
    #[error("default_page_size {default} exceeds max_page_size {max}")]
    PageSizeAboveMax { default: u32, max: u32 },
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_months == 0 {
            return Err(ConfigError::MustBePositive("horizon_months"));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::MustBePositive("default_page_size"));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::MustBePositive("max_page_size"));
        }
        if self.publish_buffer == 0 {
            return Err(ConfigError::MustBePositive("publish_buffer"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::PageSizeAboveMax {
                default: self.default_page_size,
                max: self.max_page_size,
            });
        }
        Ok(())
    }

    pub fn generator(&self) -> OccurrenceGenerator {
        OccurrenceGenerator::new(self.horizon_months)
    }

    /// Resolves a requested page size: `None`/`0` use the default, larger
    /// values are clamped to the maximum.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.default_page_size,
            Some(value) => value.min(self.max_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};

    #[test]
    fn partial_documents_fill_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"horizon_months": 6}"#).unwrap();
        assert_eq!(config.horizon_months, 6);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.generator().horizon_months(), 6);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_zero_and_inverted_page_sizes() {
        let config = EngineConfig {
            horizon_months: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MustBePositive("horizon_months"))
        );

        let config = EngineConfig {
            default_page_size: 50,
            max_page_size: 10,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PageSizeAboveMax { default: 50, max: 10 })
        ));
    }

    #[test]
    fn page_size_defaults_and_clamps() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size(None), 20);
        assert_eq!(config.page_size(Some(0)), 20);
        assert_eq!(config.page_size(Some(5)), 5);
        assert_eq!(config.page_size(Some(5000)), 100);
    }
}
