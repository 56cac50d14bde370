//! Error types for the coreference resolver

use thiserror::Error;

/// Result type alias for this library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, resolving or writing a document
#[derive(Error, Debug)]
pub enum Error {
    /// A required annotation layer is absent for a document
    #[error("missing {layer} layer for text {document}")]
    MissingLayer { document: String, layer: String },

    /// Structurally invalid annotation (dangling pointer, empty span, bad attribute)
    #[error("malformed annotation in text {document}: {reason}")]
    MalformedAnnotation { document: String, reason: String },

    /// The external compatibility scorer failed
    #[error("Scorer error: {0}")]
    Scorer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lexical resource or embedding file could not be interpreted
    #[error("Resource error: {0}")]
    Resource(String),

    /// XML reading or writing error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Shorthand for a [`Error::MalformedAnnotation`]
    pub fn malformed(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::MissingLayer`]
    pub fn missing_layer(document: impl Into<String>, layer: impl Into<String>) -> Self {
        Self::MissingLayer {
            document: document.into(),
            layer: layer.into(),
        }
    }

    /// Whether this failure only concerns the document being processed.
    ///
    /// The batch pipeline skips such documents and keeps going; anything else
    /// (scorer failures, configuration problems) aborts the batch.
    #[must_use]
    pub const fn is_document_local(&self) -> bool {
        matches!(
            self,
            Self::MissingLayer { .. }
                | Self::MalformedAnnotation { .. }
                | Self::Xml(_)
                | Self::Io(_)
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_local_errors() {
        assert!(Error::missing_layer("t1", "mentions").is_document_local());
        assert!(Error::malformed("t1", "empty span").is_document_local());
        assert!(!Error::Scorer("boom".to_string()).is_document_local());
        assert!(!Error::Config("bad".to_string()).is_document_local());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::missing_layer("doc_7", "morphosyntax");
        assert_eq!(err.to_string(), "missing morphosyntax layer for text doc_7");
    }
}
