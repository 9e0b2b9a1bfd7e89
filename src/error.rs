//! Error types for podshift

use thiserror::Error;

/// Result type for translation operations
pub type Result<T, E = TranslateError> = std::result::Result<T, E>;

/// Fatal translation errors.
///
/// Anything that can still produce a best-effort artifact is a diagnostic
/// instead (see [`crate::diagnostics::Diagnostics`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Unsupported format: {0} (expected one of podman-compose, quadlet, kube)")]
    UnsupportedFormat(String),

    #[error("Failed to parse YAML: {0}")]
    Yaml(String),

    #[error("Compose file parse error: {}", .0.join("; "))]
    ComposeParse(Vec<String>),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),
}

impl TranslateError {
    /// Error messages as they appear in a [`crate::Translation`]
    pub fn messages(&self) -> Vec<String> {
        match self {
            TranslateError::ComposeParse(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// A fatal error together with the warnings collected before it happened
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct Failure {
    /// The error that stopped the pipeline
    pub error: TranslateError,
    /// Warnings accumulated by earlier stages
    pub warnings: Vec<String>,
}

impl Failure {
    /// Create a failure with no prior warnings
    pub fn new(error: TranslateError) -> Self {
        Self {
            error,
            warnings: Vec::new(),
        }
    }

    /// Attach warnings gathered before the failure
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl From<TranslateError> for Failure {
    fn from(error: TranslateError) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_parse_display_joins_messages() {
        let err = TranslateError::ComposeParse(vec![
            "service 'web' has no image".to_string(),
            "service 'db' has no image".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Compose file parse error: service 'web' has no image; service 'db' has no image"
        );
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn test_failure_keeps_warnings() {
        let failure = Failure::new(TranslateError::UnsupportedFormat("swarm".to_string()))
            .with_warnings(vec!["dropped build".to_string()]);
        assert_eq!(failure.warnings, vec!["dropped build".to_string()]);
        assert!(failure.to_string().contains("swarm"));
    }
}
