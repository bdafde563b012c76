//! Error types for specification loading and normalization

use std::path::PathBuf;

/// Errors raised while reading or normalizing a specification
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The file could not be read
    #[error("could not read {path}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML, or does not match the expected shape
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required top-level section is absent
    #[error("missing required section '{0}'")]
    MissingSection(&'static str),

    /// A value has the wrong shape
    #[error("invalid {what} at '{path}': {reason}")]
    Invalid {
        /// What kind of element was being read
        what: &'static str,
        /// Dotted location inside the document
        path: String,
        /// Human-readable explanation
        reason: String,
    },
}

impl SpecError {
    /// Shorthand for [`SpecError::Invalid`]
    #[inline]
    pub fn invalid(what: &'static str, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            what,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_display_names_location() {
        let err = SpecError::invalid("folder", "folders.Pod", "expected a mapping");
        let text = err.to_string();
        assert!(text.contains("folders.Pod"));
        assert!(text.contains("expected a mapping"));
    }

    #[test]
    fn missing_section_display() {
        assert_eq!(
            SpecError::MissingSection("folders").to_string(),
            "missing required section 'folders'"
        );
    }
}
