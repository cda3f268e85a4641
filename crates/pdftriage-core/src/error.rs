use std::path::PathBuf;

use pdftriage_pdf::ObjRef;
use thiserror::Error;

/// The caller abandoned the run through its [`crate::CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("analysis cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("corrupt document: {reason}")]
    Corrupt { reason: String },
    #[error("document is encrypted and no usable credential was supplied")]
    Encrypted,
    #[error("unsupported structure: {reason}")]
    UnsupportedStructure { reason: String },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl LoadError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        LoadError::Corrupt { reason: reason.into() }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        LoadError::UnsupportedStructure { reason: reason.into() }
    }
}

/// Why a single page could not be scanned. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page {page}: object {reference} does not resolve to a page dictionary")]
    Unresolvable { page: usize, reference: ObjRef },
    #[error("page {page}: /Annots is not an array")]
    MalformedAnnotationList { page: usize },
    #[error("page {page}: annotation {index} is not a dictionary")]
    MalformedAnnotation { page: usize, index: usize },
}

impl PageError {
    pub fn page(&self) -> usize {
        match self {
            PageError::Unresolvable { page, .. }
            | PageError::MalformedAnnotationList { page }
            | PageError::MalformedAnnotation { page, .. } => *page,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config {path} exceeds {limit} bytes")]
    TooLarge { path: PathBuf, limit: u64 },
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML config")]
    Toml(#[from] toml::de::Error),
    #[error("invalid YAML config")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_errors_carry_their_page_number() {
        let err = PageError::MalformedAnnotation { page: 2, index: 0 };
        assert_eq!(err.page(), 2);
        assert_eq!(err.to_string(), "page 2: annotation 0 is not a dictionary");
    }

    #[test]
    fn cancellation_converts_into_load_error() {
        let err: LoadError = Cancelled.into();
        assert_eq!(err, LoadError::Cancelled(Cancelled));
    }
}
