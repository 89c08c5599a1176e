//! HTTP route handlers.

pub mod fallback;
pub mod health;
pub mod root;

use crate::config::Config;

/// Immutable state shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Deployment environment name reported by `/health`.
    pub environment: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            environment: config.environment.clone(),
        }
    }
}
