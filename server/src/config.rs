use docshield_core::config::{
    clamp_dpi, DEFAULT_RENDER_DPI, MAX_CALLER_BOXES, MAX_SEARCH_QUERIES,
};
use docshield_pdf::RedactionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File holding the JSON configuration.
pub const CONFIG_ENV: &str = "DOCSHIELD_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ Server ============
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in megabytes.
    pub max_body_mb: usize,

    // ============ Rendering & redaction ============
    pub render_dpi: u32,
    pub redact_mode: RedactionMode,
    pub jpeg_quality: u8,

    // ============ Detection ============
    /// Override for the embedded pattern artifact.
    pub patterns_path: Option<PathBuf>,
    /// Wall-clock budget for one detection call, in milliseconds.
    pub detect_budget_ms: Option<u64>,
    pub max_boxes: usize,
    pub max_search_queries: usize,

    // ============ Redaction rules ============
    pub rules_path: PathBuf,
    /// Rules expanded into search queries per request.
    pub max_rules: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_body_mb: 50,
            render_dpi: DEFAULT_RENDER_DPI,
            redact_mode: RedactionMode::Overlay,
            jpeg_quality: 85,
            patterns_path: None,
            detect_budget_ms: None,
            max_boxes: MAX_CALLER_BOXES,
            max_search_queries: MAX_SEARCH_QUERIES,
            rules_path: PathBuf::from("data/redaction_rules.json"),
            max_rules: 20,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("pattern artifact rejected: {0}")]
    Patterns(#[from] docshield_core::CoreError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config(path: &Path, config: &AppConfig) -> ConfigResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

impl AppConfig {
    /// Load from `DOCSHIELD_CONFIG` (when set) and apply the environment.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => load_config(Path::new(&path))?,
            Err(_) => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DOCSHIELD_*` overrides from `lookup`, then clamp values into
    /// their valid ranges.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOCSHIELD_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("DOCSHIELD_PORT") {
            self.port = parse_env("DOCSHIELD_PORT", &v)?;
        }
        if let Some(v) = lookup("DOCSHIELD_RENDER_DPI") {
            self.render_dpi = parse_env("DOCSHIELD_RENDER_DPI", &v)?;
        }
        if let Some(v) = lookup("DOCSHIELD_REDACT_MODE") {
            self.redact_mode = parse_env("DOCSHIELD_REDACT_MODE", &v)?;
        }
        if let Some(v) = lookup("DOCSHIELD_RULES_PATH") {
            self.rules_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCSHIELD_PATTERNS_PATH") {
            self.patterns_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("DOCSHIELD_DETECT_BUDGET_MS") {
            self.detect_budget_ms = Some(parse_env("DOCSHIELD_DETECT_BUDGET_MS", &v)?);
        }

        self.render_dpi = clamp_dpi(Some(self.render_dpi));
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.max_body_mb = self.max_body_mb.max(1);
        self.max_boxes = self.max_boxes.min(MAX_CALLER_BOXES);
        self.max_search_queries = self.max_search_queries.min(MAX_SEARCH_QUERIES);
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.render_dpi, 220);
        assert_eq!(config.redact_mode, RedactionMode::Overlay);
    }

    #[test]
    fn test_save_and_load_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            port: 9000,
            redact_mode: RedactionMode::Rasterize,
            ..Default::default()
        };
        save_config(&path, &config).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"renderDpi\""));
        assert!(raw.contains("\"rasterize\""));

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.port, 9000);
        assert_eq!(loaded.redact_mode, RedactionMode::Rasterize);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"port": 1234}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.port, 1234);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_rules, 20);
    }

    #[test]
    fn test_env_overrides_and_clamping() {
        let vars = env(&[
            ("DOCSHIELD_PORT", "9090"),
            ("DOCSHIELD_RENDER_DPI", "2000"),
            ("DOCSHIELD_REDACT_MODE", "rasterize"),
            ("DOCSHIELD_DETECT_BUDGET_MS", "1500"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.render_dpi, 600);
        assert_eq!(config.redact_mode, RedactionMode::Rasterize);
        assert_eq!(config.detect_budget_ms, Some(1500));
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn test_invalid_env_value() {
        let vars = env(&[("DOCSHIELD_PORT", "not-a-port")]);
        let mut config = AppConfig::default();
        let err = config.apply_overrides(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                key: "DOCSHIELD_PORT",
                ..
            }
        ));
    }
}
