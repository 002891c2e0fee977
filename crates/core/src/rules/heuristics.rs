//! Heuristic matchers for single tokens.
//!
//! Grammars and word lists are data, not code: they are loaded from a
//! versioned JSON artifact embedded at build time. Deployments can supply
//! their own artifact through [`PatternSet::from_json`].
//!
//! Matching rules:
//! - email is a full-token match
//! - ssn, dob and phone match anywhere inside the token
//! - priority is email, ssn, dob, phone; the first hit wins

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::normalize::{normalize_token, strip_sentence_end};
use super::PiiLabel;
use crate::{CoreError, Result};

// ============================================================================
// Artifact layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct PatternsConfig {
    version: String,
    single_token: SingleTokenConfig,
    street_types: Vec<String>,
    name_labels: Vec<String>,
    name_sub_labels: Vec<String>,
    name_fragment: String,
}

#[derive(Debug, Deserialize)]
struct SingleTokenConfig {
    email: PatternConfig,
    ssn: PatternConfig,
    dob: PatternConfig,
    phone: PatternConfig,
}

#[derive(Debug, Deserialize)]
struct PatternConfig {
    pattern: String,
}

// ============================================================================
// Static configuration
// ============================================================================

static BUILTIN: Lazy<Arc<PatternSet>> = Lazy::new(|| {
    let json_str = include_str!("../../data/patterns.json");
    Arc::new(PatternSet::from_json(json_str).expect("Failed to compile patterns.json"))
});

fn compile(name: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| CoreError::InvalidPattern { name, source })
}

fn lower_set(words: Vec<String>) -> HashSet<String> {
    words.into_iter().map(|w| w.to_lowercase()).collect()
}

/// Compiled grammars and word lists used by the matchers and groupers.
#[derive(Debug)]
pub struct PatternSet {
    version: String,
    email: Regex,
    ssn: Regex,
    dob: Regex,
    phone: Regex,
    street_types: HashSet<String>,
    name_labels: HashSet<String>,
    name_sub_labels: HashSet<String>,
    name_fragment: Regex,
}

impl PatternSet {
    /// The artifact shipped with the crate.
    pub fn builtin() -> Arc<PatternSet> {
        Arc::clone(&BUILTIN)
    }

    /// Compile an artifact. Any invalid grammar fails the whole set.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: PatternsConfig = serde_json::from_str(raw)?;
        let single = config.single_token;
        Ok(Self {
            email: compile("email", &single.email.pattern)?,
            ssn: compile("ssn", &single.ssn.pattern)?,
            dob: compile("dob", &single.dob.pattern)?,
            phone: compile("phone", &single.phone.pattern)?,
            name_fragment: compile("name_fragment", &config.name_fragment)?,
            street_types: lower_set(config.street_types),
            name_labels: lower_set(config.name_labels),
            name_sub_labels: lower_set(config.name_sub_labels),
            version: config.version,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    // ------------------------------------------------------------------
    // Single-token matchers
    // ------------------------------------------------------------------

    pub fn match_email(&self, token: &str) -> bool {
        self.email.is_match(token)
    }

    pub fn match_ssn(&self, token: &str) -> bool {
        self.ssn.is_match(token)
    }

    pub fn match_dob(&self, token: &str) -> bool {
        self.dob.is_match(token)
    }

    pub fn match_phone(&self, token: &str) -> bool {
        self.phone.is_match(token)
    }

    /// Classify a raw token. The token is normalized first; an empty result
    /// never matches. Emails also match with sentence-final periods removed.
    pub fn classify_token(&self, raw: &str) -> Option<PiiLabel> {
        let token = normalize_token(raw);
        if token.is_empty() {
            return None;
        }
        if self.match_email(token) || self.match_email(strip_sentence_end(token)) {
            Some(PiiLabel::Email)
        } else if self.match_ssn(token) {
            Some(PiiLabel::Ssn)
        } else if self.match_dob(token) {
            Some(PiiLabel::Dob)
        } else if self.match_phone(token) {
            Some(PiiLabel::Phone)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Word lists for the groupers
    // ------------------------------------------------------------------

    /// Street type check: lower-cased, one trailing period dropped.
    pub fn is_street_type(&self, token: &str) -> bool {
        let lower = normalize_token(token).to_lowercase();
        let word = lower.strip_suffix('.').unwrap_or(&lower);
        self.street_types.contains(word)
    }

    pub fn is_name_label(&self, token: &str) -> bool {
        self.name_labels
            .contains(&normalize_token(token).to_lowercase())
    }

    pub fn is_name_sub_label(&self, token: &str) -> bool {
        self.name_sub_labels
            .contains(&normalize_token(token).to_lowercase())
    }

    pub fn is_name_fragment(&self, token: &str) -> bool {
        self.name_fragment.is_match(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Arc<PatternSet> {
        PatternSet::builtin()
    }

    #[test]
    fn test_match_email_full_token() {
        let p = patterns();
        assert_eq!(p.classify_token("jane@example.com"), Some(PiiLabel::Email));
        assert_eq!(p.classify_token("<jane.doe+x@mail.co.uk>"), Some(PiiLabel::Email));
        assert!(!p.match_email("mail:jane@example.com"));
        assert!(!p.match_email("jane@example"));
    }

    #[test]
    fn test_match_email_at_sentence_end() {
        let p = patterns();
        assert_eq!(p.classify_token("jane@example.com."), Some(PiiLabel::Email));
        assert_eq!(p.classify_token("(jane@example.com)."), Some(PiiLabel::Email));
        assert_eq!(p.classify_token("example.com."), None);
    }

    #[test]
    fn test_match_ssn() {
        let p = patterns();
        assert_eq!(p.classify_token("123-45-6789"), Some(PiiLabel::Ssn));
        assert_eq!(p.classify_token("SSN:123456789"), Some(PiiLabel::Ssn));
    }

    #[test]
    fn test_match_dob() {
        let p = patterns();
        assert_eq!(p.classify_token("12/01/1990"), Some(PiiLabel::Dob));
        assert_eq!(p.classify_token("3-7-85"), Some(PiiLabel::Dob));
        assert_eq!(p.classify_token("13/01/1990"), None);
    }

    #[test]
    fn test_match_phone() {
        let p = patterns();
        assert_eq!(p.classify_token("555-123-4567"), Some(PiiLabel::Phone));
        assert_eq!(p.classify_token("+1.555.123.4567"), Some(PiiLabel::Phone));
        assert_eq!(p.classify_token("Invoice"), None);
    }

    #[test]
    fn test_priority_order() {
        let p = patterns();
        assert_eq!(p.classify_token("123-45-6789@x.com"), Some(PiiLabel::Email));
        assert_eq!(
            p.classify_token("ssn:123-45-6789/555-123-4567"),
            Some(PiiLabel::Ssn)
        );
        assert_eq!(p.classify_token("01/02/2000,5551234567"), Some(PiiLabel::Dob));
    }

    #[test]
    fn test_punctuation_only_never_matches() {
        assert_eq!(patterns().classify_token("(--)"), None);
        assert_eq!(patterns().classify_token(""), None);
    }

    #[test]
    fn test_word_lists() {
        let p = patterns();
        assert!(p.is_street_type("St."));
        assert!(p.is_street_type("Terrace"));
        assert!(!p.is_street_type("Springfield"));
        assert!(p.is_name_label("Applicant:"));
        assert!(p.is_name_sub_label("(Last)"));
        assert!(p.is_name_fragment("Q."));
        assert!(p.is_name_fragment("Doe,"));
        assert!(!p.is_name_fragment("DOE"));
    }

    #[test]
    fn test_from_json_rejects_bad_regex() {
        let raw = include_str!("../../data/patterns.json").replace(
            "\"^(?:[A-Z]\\\\.|[A-Z][a-z]+,?)$\"",
            "\"([unclosed\"",
        );
        assert!(matches!(
            PatternSet::from_json(&raw),
            Err(CoreError::InvalidPattern { name: "name_fragment", .. })
        ));
        assert!(PatternSet::from_json("{}").is_err());
    }

    #[test]
    fn test_version() {
        assert_eq!(patterns().version(), "2024.1");
    }
}
