//! Error types for the Pathway framework.

use std::error::Error as StdError;

use serde_json::{Map, Value};
use thiserror::Error;

use pathway_core::PatternError;

// =============================================================================
// Extraction
// =============================================================================

/// Errors that can occur while binding handler parameters.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The binder cannot supply a value of the requested type for this request.
    #[error("unsupported parameter type '{expected}': {reason}")]
    UnsupportedParameter {
        /// Requested type name.
        expected: &'static str,
        /// Why it could not be supplied.
        reason: String,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

// =============================================================================
// Registration
// =============================================================================

/// Static authoring mistakes detected while building a class registration.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error("invalid pattern on {page}::{member}: {source}")]
    Pattern {
        page: &'static str,
        member: String,
        source: PatternError,
    },

    #[error("reroute pattern '{pattern}' on {page}::{member} must end with a terminal '*'")]
    RerouteWithoutWildcard {
        page: &'static str,
        member: String,
        pattern: String,
    },

    #[error("{page}::{member} is routed but its type '{found}' is not a page")]
    NotAPage {
        page: &'static str,
        member: String,
        found: &'static str,
    },

    #[error("'{tag}' cannot be attached to field {page}::{member}")]
    UnsupportedFieldTag {
        page: &'static str,
        member: String,
        tag: &'static str,
    },
}

// =============================================================================
// Halt and API errors
// =============================================================================

/// Short-circuits the rest of the current request.
///
/// Raised by returning `Err(Halt::new())` from a handler or interceptor. No
/// further interceptors run; the top-level page sees it through its halt hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or("request halted"))]
pub struct Halt {
    message: Option<String>,
}

impl Halt {
    pub fn new() -> Self {
        Self::default()
    }

    /// A halt carrying a message for the halt hook.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// A structured, user-visible API failure.
///
/// Written through the same response map as successful API output:
///
/// ```json
/// { "error": { "code": "INTERNAL_SERVER_ERROR", "message": "...", "stack": ["..."] } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: u16,
    code: String,
    message: String,
    trace: Vec<String>,
}

impl ApiError {
    /// Code used when nothing more specific is known.
    pub const INTERNAL: &'static str = "INTERNAL_SERVER_ERROR";
    /// Code used when a handler parameter cannot be bound.
    pub const UNSUPPORTED_PARAMETER: &'static str = "UNSUPPORTED_PARAMETER_TYPE";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            code: Self::INTERNAL.to_owned(),
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Builds an internal error from any error, recording its source chain as trace.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        Self::new(error.to_string()).with_trace(trace)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Renders the `{code, message, stack}` error map.
    pub fn to_map(&self, include_trace: bool) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("code".into(), Value::from(self.code.as_str()));
        map.insert("message".into(), Value::from(self.message.as_str()));
        let stack = if include_trace {
            self.trace.iter().map(|line| Value::from(line.as_str())).collect()
        } else {
            Vec::new()
        };
        map.insert("stack".into(), Value::Array(stack));
        map
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        Self::new(err.to_string()).with_code(Self::UNSUPPORTED_PARAMETER)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Errors that abort the dispatch of one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Halt(#[from] Halt),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// A handler failed with an error that is neither an API error nor a halt.
    #[error("handler failed: {0}")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("reroute depth limit {limit} exceeded at {page}")]
    RerouteDepthExceeded { page: &'static str, limit: usize },
}

impl DispatchError {
    /// Wraps an arbitrary handler failure, unwrapping embedded halts and API errors.
    pub fn failed(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed(err.into()).classify()
    }

    /// Re-raises an API error or halt found inside a `Failed` error as itself.
    ///
    /// The error and then its source chain are searched; the first API error
    /// or halt wins. Other variants are returned unchanged.
    pub fn classify(self) -> Self {
        let Self::Failed(source) = self else {
            return self;
        };

        let source = match source.downcast::<ApiError>() {
            Ok(api) => return Self::Api(*api),
            Err(other) => other,
        };
        let source = match source.downcast::<Halt>() {
            Ok(halt) => return Self::Halt(*halt),
            Err(other) => other,
        };

        let mut cause = source.source();
        while let Some(err) = cause {
            if let Some(api) = err.downcast_ref::<ApiError>() {
                return Self::Api(api.clone());
            }
            if let Some(halt) = err.downcast_ref::<Halt>() {
                return Self::Halt(halt.clone());
            }
            cause = err.source();
        }
        Self::Failed(source)
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt(_))
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        Self::failed(err)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::failed(err)
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("wrapper")]
    struct Wrapper(#[source] ApiError);

    #[test]
    fn test_classify_unwraps_direct_errors() {
        let err = DispatchError::failed(ApiError::new("boom").with_code("BAD"));
        assert!(matches!(err, DispatchError::Api(ref api) if api.code() == "BAD"));

        let err = DispatchError::failed(Halt::with_message("stop"));
        assert!(matches!(err, DispatchError::Halt(ref halt) if halt.message() == Some("stop")));
        assert_eq!(Halt::new().to_string(), "request halted");
    }

    #[test]
    fn test_classify_searches_source_chain() {
        let err = DispatchError::failed(Wrapper(ApiError::new("inner")));
        assert!(matches!(err, DispatchError::Api(ref api) if api.message() == "inner"));
    }

    #[test]
    fn test_classify_keeps_other_failures() {
        let err = DispatchError::failed("plain failure");
        assert!(matches!(err, DispatchError::Failed(_)));
        assert_eq!(err.to_string(), "handler failed: plain failure");
    }

    #[test]
    fn test_api_error_map() {
        let err = ApiError::from_error(&Wrapper(ApiError::new("inner")));
        assert_eq!(err.code(), ApiError::INTERNAL);
        assert_eq!(err.message(), "wrapper");
        assert_eq!(err.trace(), ["INTERNAL_SERVER_ERROR: inner"]);

        let map = err.to_map(true);
        assert_eq!(map["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(map["stack"][0], "INTERNAL_SERVER_ERROR: inner");
        assert_eq!(err.to_map(false)["stack"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_extract_error_becomes_api_error() {
        let api = ApiError::from(ExtractError::UnsupportedParameter {
            expected: "Foo",
            reason: "missing".into(),
        });
        assert_eq!(api.code(), ApiError::UNSUPPORTED_PARAMETER);
        assert_eq!(api.status(), 500);
    }
}
