//! Disjoint content-type domains for duplicate checks.

use serde::{Deserialize, Serialize};

pub const DUPLICATE_VALIDATION_TYPE: &str = "duplicate";
pub const SEPARATE_DUPLICATE_VALIDATION_TYPE: &str = "separateDuplicate";

const PRIMARY_DUPLICATE_MESSAGE: &str =
    "This slug is already taken for selected venture. Slug must be unique per venture!";
const SEPARATE_DUPLICATE_MESSAGE: &str =
    "This slug is already taken within the same content type domain for selected venture!";

const PRIMARY_CONTENT_TYPES: &[&str] = &[
    "igJackpotsSection",
    "igGridASection",
    "igGridBSection",
    "igGridCSection",
    "igGridDSection",
    "igGridESection",
    "igGridFSection",
    "igGridGSection",
    "igCarouselA",
    "igCarouselB",
    "igSimilarityBasedPersonalisedSection",
    "igCollabBasedPersonalisedSection",
    "igSearchResults",
];

const SEPARATE_CONTENT_TYPES: &[&str] = &["igView"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryDomain {
    Primary,
    Separate,
}

impl QueryDomain {
    pub fn validation_type(self) -> &'static str {
        match self {
            QueryDomain::Primary => DUPLICATE_VALIDATION_TYPE,
            QueryDomain::Separate => SEPARATE_DUPLICATE_VALIDATION_TYPE,
        }
    }

    pub fn other(self) -> Self {
        match self {
            QueryDomain::Primary => QueryDomain::Separate,
            QueryDomain::Separate => QueryDomain::Primary,
        }
    }

    pub fn duplicate_message(self) -> &'static str {
        match self {
            QueryDomain::Primary => PRIMARY_DUPLICATE_MESSAGE,
            QueryDomain::Separate => SEPARATE_DUPLICATE_MESSAGE,
        }
    }
}

/// Content-type ids making up each domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    pub primary: Vec<String>,
    pub separate: Vec<String>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            primary: PRIMARY_CONTENT_TYPES.iter().map(|id| id.to_string()).collect(),
            separate: SEPARATE_CONTENT_TYPES.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl DomainConfig {
    /// Content types listed as separate form their own domain; everything
    /// else is checked against the primary domain.
    pub fn classify(&self, content_type_id: &str) -> QueryDomain {
        if self.separate.iter().any(|id| id == content_type_id) {
            QueryDomain::Separate
        } else {
            QueryDomain::Primary
        }
    }

    pub fn content_types(&self, domain: QueryDomain) -> &[String] {
        match domain {
            QueryDomain::Primary => &self.primary,
            QueryDomain::Separate => &self.separate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_types_classify_separately() {
        let domains = DomainConfig::default();
        assert_eq!(domains.classify("igView"), QueryDomain::Separate);
        assert_eq!(domains.classify("igGridASection"), QueryDomain::Primary);
        assert_eq!(domains.classify("unlisted"), QueryDomain::Primary);
        assert_eq!(domains.content_types(QueryDomain::Separate), ["igView"]);
        assert_eq!(domains.content_types(QueryDomain::Primary).len(), 13);
    }

    #[test]
    fn domains_use_disjoint_validation_types() {
        assert_eq!(QueryDomain::Primary.validation_type(), "duplicate");
        assert_eq!(QueryDomain::Separate.validation_type(), "separateDuplicate");
        assert_eq!(QueryDomain::Primary.other(), QueryDomain::Separate);
        assert_ne!(
            QueryDomain::Primary.duplicate_message(),
            QueryDomain::Separate.duplicate_message()
        );
    }
}
