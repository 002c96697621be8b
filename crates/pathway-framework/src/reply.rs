//! Return-value interpretation.
//!
//! Whatever a handler returns is turned into an [`Outcome`], a closed union
//! the binder handles by exhaustive matching. The [`ReplyKind`] of a return
//! type is known statically, which is how a class registration recognises
//! reroute operations (those that return a page) without running them.

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::context::{ApiResponse, TextBuffer};
use crate::error::DispatchError;
use crate::page::{Page, PageObject};

/// Static classification of a return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    None,
    File,
    Map,
    Text,
    Page,
}

/// The interpreted result of one handler call.
pub enum Outcome {
    /// No output effect.
    None,
    /// Send the file through the page's file hook.
    File(PathBuf),
    /// A file reply with no file; answered with the not-found notice.
    MissingFile,
    /// Merge into the API response accumulator.
    Map(Map<String, Value>),
    /// Merge another accumulator, unless it is the request's own.
    Response(ApiResponse),
    /// Append another buffer, unless it is the request's own.
    Buffer(TextBuffer),
    /// Append to the text accumulator.
    Text(String),
    /// Delegate the rest of the path to this page.
    Page(Box<dyn PageObject>),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::MissingFile => f.write_str("MissingFile"),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Buffer(buffer) => f.debug_tuple("Buffer").field(buffer).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Page(page) => f.debug_tuple("Page").field(&page.page_name()).finish(),
        }
    }
}

/// A type that can be returned from a handler.
pub trait Reply {
    /// The kind of outcome this type produces.
    const KIND: ReplyKind;

    /// Converts the value into an outcome.
    fn into_outcome(self) -> Result<Outcome, DispatchError>;
}

impl Reply for () {
    const KIND: ReplyKind = ReplyKind::None;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::None)
    }
}

impl Reply for String {
    const KIND: ReplyKind = ReplyKind::Text;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::Text(self))
    }
}

impl Reply for &'static str {
    const KIND: ReplyKind = ReplyKind::Text;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::Text(self.to_owned()))
    }
}

impl Reply for TextBuffer {
    const KIND: ReplyKind = ReplyKind::Text;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::Buffer(self))
    }
}

impl Reply for PathBuf {
    const KIND: ReplyKind = ReplyKind::File;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::File(self))
    }
}

impl Reply for Option<PathBuf> {
    const KIND: ReplyKind = ReplyKind::File;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(self.map_or(Outcome::MissingFile, Outcome::File))
    }
}

impl Reply for Map<String, Value> {
    const KIND: ReplyKind = ReplyKind::Map;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::Map(self))
    }
}

/// Objects merge like maps; strings are appended as they are and any other
/// JSON value is appended in its serialized form.
impl Reply for Value {
    const KIND: ReplyKind = ReplyKind::Map;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(match self {
            Value::Object(map) => Outcome::Map(map),
            Value::Null => Outcome::None,
            Value::String(text) => Outcome::Text(text),
            other => Outcome::Text(other.to_string()),
        })
    }
}

impl Reply for ApiResponse {
    const KIND: ReplyKind = ReplyKind::Map;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(Outcome::Response(self))
    }
}

/// A delegate page. `None` means the reroute attempt does not apply.
impl<Q: Page> Reply for Option<Q> {
    const KIND: ReplyKind = ReplyKind::Page;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        Ok(match self {
            Some(page) => Outcome::Page(Box::new(page)),
            None => Outcome::None,
        })
    }
}

/// On `Err`, the error aborts the dispatch chain.
impl<R: Reply, E: Into<DispatchError>> Reply for Result<R, E> {
    const KIND: ReplyKind = R::KIND;

    fn into_outcome(self) -> Result<Outcome, DispatchError> {
        match self {
            Ok(reply) => reply.into_outcome(),
            Err(err) => Err(err.into().classify()),
        }
    }
}
