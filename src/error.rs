use thiserror::Error;

/// Failure reported by an external entry store while answering a query.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("entry query failed: {0}")]
    Backend(String),
    #[error("entry query timed out")]
    Timeout,
}

/// A field whose declared rules cannot work with its setup.
///
/// Surfaced to the editor as a standing notice and never written to the
/// validation status blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Misconfiguration {
    #[error("field `{field_id}` has no predefined values to choose from")]
    EmptyPredefinedValues { field_id: String },
}

#[derive(Debug, Error)]
pub enum EntryGuardError {
    #[error("entry has no field `{0}`")]
    UnknownField(String),
    #[error("invalid instance parameters for `{field_id}`: {message}")]
    InstanceConfig { field_id: String, message: String },
    #[error("no tokio runtime is available to run uniqueness checks")]
    NoRuntime,
    #[error("invalid replay fixture: {0}")]
    Fixture(String),
}
