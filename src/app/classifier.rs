//! Priority-ordered error classification.
//!
//! Every raw failure resolves to exactly one [`ErrorKind`]. Rules are checked
//! kind by kind in [`ErrorKind::PRIORITY`] order, so a failure matching several
//! rules always lands on the most specific kind no matter how the rule table
//! was assembled. Substrings are matched case-insensitively.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ConfigError, ErrorKind, RawFailure, UNAUTHORIZED_CODE, USER_REJECTED_CODE};

/// One entry of the rule table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRule {
    pub kind: ErrorKind,
    /// Case-insensitive substrings of the failure message
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Structured codes that map to this kind
    #[serde(default)]
    pub codes: Vec<i64>,
}

impl ClassificationRule {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            patterns: Vec::new(),
            codes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns
            .extend(patterns.iter().map(|p| p.to_lowercase()));
        self
    }

    #[must_use]
    pub fn with_codes(mut self, codes: &[i64]) -> Self {
        self.codes.extend_from_slice(codes);
        self
    }

    fn matches(&self, message_lower: &str, code: Option<i64>) -> bool {
        if let Some(code) = code {
            if self.codes.contains(&code) {
                return true;
            }
        }
        self.patterns
            .iter()
            .any(|p| !p.is_empty() && message_lower.contains(p.as_str()))
    }
}

/// Default rule table
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(ErrorKind::UserRejected)
            .with_patterns(&[
                "user rejected",
                "user denied",
                "rejected the request",
                "request rejected",
                "action_rejected",
                "cancelled by user",
                "canceled by user",
            ])
            .with_codes(&[USER_REJECTED_CODE]),
        ClassificationRule::new(ErrorKind::AuthorizationDenied)
            .with_patterns(&[
                "unauthorized",
                "not authorized",
                "not authorised",
                "access denied",
                "accesscontrol",
                "permission denied",
                "caller is not",
                "only owner",
                "onlyowner",
                "missing role",
                "forbidden",
            ])
            .with_codes(&[UNAUTHORIZED_CODE]),
        ClassificationRule::new(ErrorKind::Expired).with_patterns(&[
            "expired",
            "expiry",
            "no longer valid",
            "deadline passed",
        ]),
        ClassificationRule::new(ErrorKind::InsufficientResources).with_patterns(&[
            "insufficient",
            "exceeds balance",
            "out of gas",
            "gas required exceeds",
            "intrinsic gas too low",
            "not enough",
        ]),
        ClassificationRule::new(ErrorKind::ValidationFailed)
            .with_patterns(&[
                "invalid",
                "does not exist",
                "already exists",
                "already registered",
                "not found",
                "must be",
                "cannot be empty",
                "validation",
            ])
            .with_codes(&[-32602]),
        ClassificationRule::new(ErrorKind::Reverted)
            .with_patterns(&[
                "revert",
                "call exception",
                "call_exception",
                "transaction failed",
                "execution failed",
            ])
            .with_codes(&[3]),
        ClassificationRule::new(ErrorKind::NetworkTimeout).with_patterns(&[
            "timeout",
            "timed out",
            "network error",
            "failed to fetch",
            "connection refused",
            "connection reset",
            "connection failed",
            "econnrefused",
            "etimedout",
            "unreachable",
        ]),
    ]
}

/// Rule-based failure classifier
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// Kept sorted by kind priority; insertion order is preserved within a kind
    rules: Vec<ClassificationRule>,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        let mut classifier = Self { rules: Vec::new() };
        classifier.extend(rules);
        classifier
    }

    #[must_use]
    pub fn with_default_rules() -> Self {
        Self::new(default_rules())
    }

    /// Add rules to the table. Priority still follows the kind.
    pub fn extend(&mut self, rules: impl IntoIterator<Item = ClassificationRule>) {
        self.rules.extend(rules.into_iter().map(|mut rule| {
            for pattern in &mut rule.patterns {
                *pattern = pattern.to_lowercase();
            }
            rule
        }));
        self.rules.sort_by_key(|rule| rule.kind.priority());
    }

    /// Parse a JSON array of rules
    pub fn rules_from_json(json: &str) -> Result<Vec<ClassificationRule>, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Rules(e.to_string()))
    }

    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Map a raw failure to its kind. Never fails; `Unknown` is the fallback.
    #[must_use]
    pub fn classify(&self, raw: &RawFailure) -> ErrorKind {
        let message = raw.message.to_lowercase();
        let kind = self
            .rules
            .iter()
            .find(|rule| rule.matches(&message, raw.code))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Unknown);

        debug!(kind = %kind, code = ?raw.code, "Classified failure");
        kind
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::with_default_rules()
    }
}
