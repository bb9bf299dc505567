use crate::cors::{CorsConfig, CorsPolicy};
use crate::pagination::PaginationConfig;
use runtime::ConfigProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the section read from `modules.<name>` in the application config.
pub const MODULE_NAME: &str = "apikit";

/// The `apikit` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKitConfig {
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Startup-time configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid apikit config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid CORS {field} `{value}`: {reason}")]
    Cors {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Immutable state shared by every view: the validated CORS policy and the
/// pagination settings.
#[derive(Debug, Clone)]
pub struct ApiKit {
    cors: Arc<CorsPolicy>,
    pagination: Arc<PaginationConfig>,
}

impl ApiKit {
    pub fn from_config(cfg: ApiKitConfig) -> Result<Self, ConfigError> {
        let cors = CorsPolicy::new(&cfg.cors)?;
        tracing::debug!(
            default_limit = cfg.pagination.default_limit.get(),
            max_limit = cfg.pagination.max_limit,
            "apikit configured"
        );
        Ok(Self {
            cors: Arc::new(cors),
            pagination: Arc::new(cfg.pagination),
        })
    }

    /// Read the `apikit` section from the runtime config; a missing section means defaults.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let cfg = match provider.get_module_config(MODULE_NAME) {
            Some(raw) => serde_json::from_value::<ApiKitConfig>(raw.clone())?,
            None => ApiKitConfig::default(),
        };
        Self::from_config(cfg)
    }

    pub fn cors(&self) -> &Arc<CorsPolicy> {
        &self.cors
    }

    pub fn pagination(&self) -> &Arc<PaginationConfig> {
        &self.pagination
    }
}
