//! Persisted redaction rules: literal texts to redact on every page.
//!
//! Stored as `{"rules": [...]}` in one JSON file. Removal only disables a
//! rule, and adding an existing `(text, label)` pair re-enables it.

use chrono::{DateTime, Utc};
use docshield_core::SearchQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_RULE_LABEL: &str = "user_rule";
pub const MAX_RULE_TEXT_CHARS: usize = 200;

fn default_label() -> String {
    DEFAULT_RULE_LABEL.to_string()
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub text: String,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// On-disk layout. Entries stay raw so that one malformed record neither
/// hides the others nor gets dropped when the file is rewritten.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<Value>,
}

fn parse_rule(entry: &Value) -> Option<Rule> {
    serde_json::from_value(entry.clone()).ok()
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("missing_text")]
    MissingText,
    #[error("text_too_long")]
    TextTooLong,
    #[error("missing_id")]
    MissingId,
    #[error("not_found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn new_rule_id(text: &str, label: &str, now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(label.as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("r_{}_{}", now.timestamp_millis(), &digest[..6])
}

fn clean_label(label: Option<&str>) -> String {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_label)
}

pub struct RuleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file counts as no rules; a file that is not
    /// valid JSON is an error so callers never write over it.
    fn load(&self) -> Result<RulesFile, RuleError> {
        if !self.path.exists() {
            return Ok(RulesFile::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, file: &RulesFile) -> Result<(), RuleError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// Enabled rules with non-empty text, in insertion order. Malformed
    /// entries are skipped.
    pub fn list(&self) -> Vec<Rule> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = match self.load() {
            Ok(file) => file,
            Err(e) => {
                log::warn!("[Rules] {} unreadable: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        file.rules
            .iter()
            .filter_map(parse_rule)
            .filter(|r| r.enabled && !r.text.trim().is_empty())
            .collect()
    }

    pub fn add(&self, text: &str, label: Option<&str>) -> Result<Rule, RuleError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RuleError::MissingText);
        }
        if text.chars().count() > MAX_RULE_TEXT_CHARS {
            return Err(RuleError::TextTooLong);
        }
        let label = clean_label(label);

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.load()?;

        let duplicate = file.rules.iter().enumerate().find_map(|(i, entry)| {
            parse_rule(entry)
                .filter(|r| r.text.trim() == text && r.label.trim() == label)
                .map(|r| (i, r))
        });
        if let Some((i, mut dup)) = duplicate {
            if !dup.enabled {
                dup.enabled = true;
                file.rules[i] = serde_json::to_value(&dup)?;
                self.write(&file)?;
                log::info!("[Rules] re-enabled {}", dup.id);
            }
            return Ok(dup);
        }

        let now = Utc::now();
        let rule = Rule {
            id: new_rule_id(text, &label, now),
            text: text.to_string(),
            label,
            enabled: true,
            created_at: Some(now),
        };
        file.rules.push(serde_json::to_value(&rule)?);
        self.write(&file)?;
        log::info!("[Rules] added {}", rule.id);
        Ok(rule)
    }

    /// Disable a rule. The record stays in the file.
    pub fn remove(&self, id: &str) -> Result<Rule, RuleError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RuleError::MissingId);
        }

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.load()?;
        let (i, mut rule) = file
            .rules
            .iter()
            .enumerate()
            .find_map(|(i, entry)| parse_rule(entry).filter(|r| r.id.trim() == id).map(|r| (i, r)))
            .ok_or(RuleError::NotFound)?;
        rule.enabled = false;
        file.rules[i] = serde_json::to_value(&rule)?;
        self.write(&file)?;
        log::info!("[Rules] disabled {}", rule.id);
        Ok(rule)
    }
}

/// Expand rules into one search query per page, labelled `user_{label}`.
/// At most `max_rules` rules and `max_queries` queries are produced.
pub fn expand_rules(
    rules: &[Rule],
    page_count: u32,
    max_rules: usize,
    max_queries: usize,
) -> Vec<SearchQuery> {
    let pages = page_count.max(1);
    rules
        .iter()
        .take(max_rules)
        .flat_map(|rule| {
            (1..=pages).map(move |page| SearchQuery {
                page,
                text: rule.text.clone(),
                label: format!("user_{}", rule.label),
            })
        })
        .take(max_queries)
        .collect()
}
