//! HTTP surface for docshield.
//!
//! Documents arrive base64-encoded in JSON bodies; all PDF work runs on the
//! blocking pool. See [`api::router`] for the routes.

pub mod api;
pub mod config;
pub mod rules;

use docshield_core::{Detector, PatternSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

pub use api::router;
pub use config::{AppConfig, ConfigError, ConfigResult};
pub use rules::{Rule, RuleError, RuleStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rules: Arc<RuleStore>,
    pub detector: Arc<Detector>,
}

impl AppState {
    /// Build the shared state: load the pattern artifact (embedded unless
    /// `patternsPath` overrides it) and open the rule store.
    pub fn from_config(config: AppConfig) -> ConfigResult<Self> {
        let patterns = match &config.patterns_path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                let patterns = Arc::new(PatternSet::from_json(&raw)?);
                tracing::info!(
                    path = %path.display(),
                    version = patterns.version(),
                    "loaded pattern artifact"
                );
                patterns
            }
            None => PatternSet::builtin(),
        };

        let mut detector = Detector::new(patterns);
        if let Some(ms) = config.detect_budget_ms {
            detector = detector.with_budget(Duration::from_millis(ms));
        }

        Ok(Self {
            rules: Arc::new(RuleStore::new(config.rules_path.clone())),
            detector: Arc::new(detector),
            config: Arc::new(config),
        })
    }
}
