use std::fmt;

/// Composite identifier `fieldId[:validationType]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationKey {
    field_id: String,
    validation_type: Option<String>,
}

impl ValidationKey {
    pub fn new(field_id: impl Into<String>, validation_type: Option<&str>) -> Self {
        Self {
            field_id: field_id.into(),
            validation_type: validation_type
                .filter(|kind| !kind.is_empty())
                .map(str::to_string),
        }
    }

    pub fn general(field_id: impl Into<String>) -> Self {
        Self::new(field_id, None)
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn validation_type(&self) -> Option<&str> {
        self.validation_type.as_deref()
    }

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((field_id, kind)) => Self::new(field_id, Some(kind)),
            None => Self::general(raw),
        }
    }
}

impl fmt::Display for ValidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.validation_type {
            Some(kind) => write!(f, "{}:{}", self.field_id, kind),
            None => f.write_str(&self.field_id),
        }
    }
}

/// True when `key` is the general key of `field_id` or one of its typed keys.
pub fn belongs_to(key: &str, field_id: &str) -> bool {
    match key.strip_prefix(field_id) {
        Some(rest) => rest.is_empty() || rest.starts_with(':'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_and_parses() {
        let key = ValidationKey::new("slug", Some("duplicate"));
        assert_eq!(key.to_string(), "slug:duplicate");
        assert_eq!(ValidationKey::parse("slug:duplicate"), key);
        assert_eq!(ValidationKey::new("slug", Some("")).to_string(), "slug");
    }

    #[test]
    fn ownership_requires_exact_id_or_colon() {
        assert!(belongs_to("slug", "slug"));
        assert!(belongs_to("slug:duplicate", "slug"));
        assert!(!belongs_to("slugline", "slug"));
        assert!(!belongs_to("other", "slug"));
    }
}
