//! Support domains and identifier parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Support domain served by a dedicated seq2seq model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// E-commerce customer support
    Ecommerce,
    /// Medical customer support
    Medical,
    /// Restaurant chatbot
    Restaurant,
    /// Customer query classification
    Classify,
}

impl Domain {
    /// All domains in load order.
    pub fn all() -> &'static [Domain] {
        &[
            Self::Ecommerce,
            Self::Medical,
            Self::Restaurant,
            Self::Classify,
        ]
    }

    /// Key used on the wire and in routes.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ecommerce => "ecommerce",
            Self::Medical => "medical",
            Self::Restaurant => "restaurant",
            Self::Classify => "classify",
        }
    }

    /// Default HuggingFace repository for this domain.
    pub fn default_source(&self) -> &'static str {
        match self {
            Self::Ecommerce => "Ataur77/ecommerce-customer-support",
            Self::Medical => "Ataur77/medical-customer-support-t5",
            Self::Restaurant => "Ataur77/restaurants-chatbot-t5",
            Self::Classify => "Ataur77/customer-query-classify",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ecommerce => "E-commerce Support",
            Self::Medical => "Medical Support",
            Self::Restaurant => "Restaurant Support",
            Self::Classify => "Query Classifier",
        }
    }

    /// Environment variable that overrides the source identifier.
    pub fn source_env_var(&self) -> String {
        format!("CONCIERGE_MODEL_{}", self.key().to_ascii_uppercase())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone)]
pub struct ParseDomainError {
    input: String,
}

impl ParseDomainError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for ParseDomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trimmed = self.input.trim();
        write!(
            f,
            "Unsupported domain: {}",
            if trimmed.is_empty() { "<empty>" } else { trimmed }
        )
    }
}

impl std::error::Error for ParseDomainError {}

/// Parse a domain key. Matching is exact on the wire key after trimming and
/// lowercasing; repo ids are not accepted so routing stays unambiguous.
pub fn parse_domain(input: &str) -> Result<Domain, ParseDomainError> {
    let normalized = input.trim().to_ascii_lowercase();
    Domain::all()
        .iter()
        .copied()
        .find(|domain| domain.key() == normalized)
        .ok_or_else(|| ParseDomainError::new(input))
}

impl FromStr for Domain {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_domain(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_order_is_fixed() {
        let keys: Vec<&str> = Domain::all().iter().map(|d| d.key()).collect();
        assert_eq!(keys, ["ecommerce", "medical", "restaurant", "classify"]);
    }

    #[test]
    fn parse_accepts_case_and_whitespace() {
        assert_eq!(parse_domain(" Medical ").unwrap(), Domain::Medical);
        assert_eq!("classify".parse::<Domain>().unwrap(), Domain::Classify);
    }

    #[test]
    fn parse_rejects_unknown_and_empty() {
        let err = parse_domain("legal").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported domain: legal");
        assert_eq!(
            parse_domain("  ").unwrap_err().to_string(),
            "Unsupported domain: <empty>"
        );
    }

    #[test]
    fn source_env_var_uses_uppercase_key() {
        assert_eq!(
            Domain::Restaurant.source_env_var(),
            "CONCIERGE_MODEL_RESTAURANT"
        );
    }

    #[test]
    fn serde_uses_wire_keys() {
        let json = serde_json::to_string(&Domain::Ecommerce).unwrap();
        assert_eq!(json, "\"ecommerce\"");
    }
}
