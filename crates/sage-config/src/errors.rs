//! Error types for configuration resolution.

use thiserror::Error;

/// Errors from template loading.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The path escapes the allowed template roots (absolute path, `..`
    /// segment, or a symlink resolving outside a root).
    #[error("template path not allowed: {0}")]
    PathNotAllowed(String),

    /// No allowed root contains the requested file.
    #[error("template not found: {0}")]
    NotFound(String),

    /// The file exists but does not parse.
    #[error("template invalid: {path}: {message}")]
    Invalid {
        /// Relative path as requested.
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Filesystem error other than not-found.
    #[error("template io error: {path}: {source}")]
    Io {
        /// Relative path as requested.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Errors from resolving an effective configuration for a request.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No enabled scope matches at any tier. Reportable, non-fatal.
    #[error("no workflow scope matches course={course_id} location={location_id}")]
    ScopeNotFound {
        /// Course identifier from the lookup key.
        course_id: String,
        /// Location identifier from the lookup key.
        location_id: String,
    },

    /// The scope names a profile that is not in the catalog.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Template loading failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The effective configuration fails schema validation. Carries the
    /// complete violation list — never a partial report.
    #[error("configuration invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ResolveError {
    /// Error category string for event emission and metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ScopeNotFound { .. } => "scope_not_found",
            Self::ProfileNotFound(_) => "profile_not_found",
            Self::Template(TemplateError::NotFound(_)) => "template_not_found",
            Self::Template(_) => "template_error",
            Self::Invalid(_) => "config_invalid",
        }
    }

    /// Whether this resolves to a 404-equivalent (nothing configured)
    /// rather than a configuration bug.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ScopeNotFound { .. } | Self::Template(TemplateError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_joins_all_violations() {
        let err = ResolveError::Invalid(vec![
            "orchestrator_class: missing".to_string(),
            "processor_config: missing".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("orchestrator_class"));
        assert!(msg.contains("processor_config"));
    }

    #[test]
    fn categories() {
        let err = ResolveError::ScopeNotFound {
            course_id: "c".into(),
            location_id: "l".into(),
        };
        assert_eq!(err.category(), "scope_not_found");
        assert!(err.is_not_found());
        assert!(!ResolveError::Invalid(vec![]).is_not_found());
    }
}
