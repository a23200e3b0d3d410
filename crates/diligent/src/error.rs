//! Error taxonomy for the research pipeline.
//!
//! Only [`DiligentError`] crosses the public API as a hard failure. Template
//! and provider failures are per-module and normally travel as data inside a
//! chain result ([`ModuleOutcome::Failed`](crate::executor::ModuleOutcome));
//! they surface as errors only from single-module entry points.

use crate::router::Mode;

/// Failure talking to the LLM service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Transport(String),
    /// The service answered with a non-success HTTP status.
    #[error("LLM API HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The service answered 2xx but reported an error in the payload.
    #[error("LLM API error: {0}")]
    Api(String),
    /// The response body was not the expected JSON shape.
    #[error("failed to parse response: {0}")]
    Decode(String),
    /// The completion contained no text.
    #[error("empty LLM response")]
    EmptyResponse,
}

/// Why a module's template could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The module id is not part of any catalog the mode can resolve.
    #[error("unknown module '{module}' for mode {mode}")]
    UnknownModule { module: String, mode: Mode },
    /// The module is known but its heading does not occur in the document.
    #[error("heading '{heading}' for module '{module}' not found")]
    HeadingNotFound { module: String, heading: String },
    /// The template document itself could not be read.
    #[error("template document for mode {mode} unavailable: {reason}")]
    Source { mode: Mode, reason: String },
}

/// Top-level error for memory, routing and service operations.
#[derive(Debug, thiserror::Error)]
pub enum DiligentError {
    /// A field required by the resolved mode is missing.
    #[error("invalid input: {0}")]
    InputValidation(String),
    /// The caller named a mode outside the closed set.
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
    #[error(transparent)]
    TemplateNotFound(#[from] TemplateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// No artifact is stored under the given id.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    /// An artifact payload could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DiligentError {
    fn from(e: serde_json::Error) -> Self {
        DiligentError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_render_status_and_body() {
        let err = ProviderError::Http {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "LLM API HTTP 429: rate limited");
    }

    #[test]
    fn provider_error_converts_transparently() {
        let err: DiligentError = ProviderError::EmptyResponse.into();
        assert_eq!(err.to_string(), "empty LLM response");
    }

    #[test]
    fn json_errors_become_serialization_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DiligentError = parse.into();
        assert!(matches!(err, DiligentError::Serialization(_)));
    }
}
