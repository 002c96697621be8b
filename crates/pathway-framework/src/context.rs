//! Per-request state.
//!
//! A [`RequestContext`] is created for every incoming request and dropped
//! when the request ends. It owns:
//!
//! - the verb, URI and normalized path segments,
//! - the shared accumulators ([`Params`], [`TextOut`], [`TextBuffer`],
//!   [`ApiResponse`]),
//! - an optional raw platform request,
//! - the response status, files queued for transfer, and a record of skipped
//!   invocations.
//!
//! The accumulators are cheap handles around `Arc<Mutex<_>>`. Extractors hand
//! out clones, so every page that takes part in a request (including reroute
//! delegates) writes to the same underlying state. Identity comparison via
//! `ptr_eq` lets the binder tell "the accumulator you were given" apart from a
//! freshly built value.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use pathway_core::{Verb, split_path};

use crate::settings::DispatchSettings;

// =============================================================================
// Accumulators
// =============================================================================

/// Request parameters, including values bound from named captures.
#[derive(Debug, Clone, Default)]
pub struct Params(Arc<Mutex<Map<String, Value>>>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Arc::new(Mutex::new(map)))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    /// Returns the value as a string; non-string values are rendered as JSON.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Inserts a value, returning the previous one. Last write wins.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.lock().insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Direct text output sink. Written before the text buffer in the response body.
#[derive(Debug, Clone, Default)]
pub struct TextOut(Arc<Mutex<String>>);

impl TextOut {
    pub fn write(&self, text: &str) {
        self.0.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Write for TextOut {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// Plain text accumulator. Text returned by handlers is appended here.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer(Arc<Mutex<String>>);

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, text: &str) {
        self.0.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Write for TextBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s);
        Ok(())
    }
}

/// Structured API response accumulator.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse(Arc<Mutex<Map<String, Value>>>);

impl ApiResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.lock().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    /// Merges `entries` key by key; existing keys are overwritten.
    pub fn merge(&self, entries: Map<String, Value>) {
        self.0.lock().extend(entries);
    }

    /// Merges the contents of another accumulator. Merging with itself is a no-op.
    pub fn merge_from(&self, other: &ApiResponse) {
        if self.ptr_eq(other) {
            return;
        }
        let entries = other.snapshot();
        self.merge(entries);
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// =============================================================================
// RequestContext
// =============================================================================

/// An invocation the binder skipped because the page was not an instance of
/// the operation's declaring type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCall {
    pub pattern: String,
    pub operation: &'static str,
    pub declaring: &'static str,
    pub page: &'static str,
}

/// The state of one request.
pub struct RequestContext {
    verb: Verb,
    uri: String,
    segments: Vec<String>,
    params: Params,
    out: TextOut,
    buffer: TextBuffer,
    response: ApiResponse,
    raw: Option<Arc<dyn Any + Send + Sync>>,
    status: u16,
    files: Vec<PathBuf>,
    skipped: Vec<SkippedCall>,
    settings: Arc<DispatchSettings>,
}

impl RequestContext {
    /// Creates a context for `verb uri`. Anything after `?` in the URI is ignored
    /// for routing.
    pub fn new(verb: Verb, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let path = uri.split_once('?').map_or(uri.as_str(), |(path, _)| path);
        let segments = split_path(path);
        Self {
            verb,
            uri,
            segments,
            params: Params::new(),
            out: TextOut::default(),
            buffer: TextBuffer::new(),
            response: ApiResponse::new(),
            raw: None,
            status: 200,
            files: Vec::new(),
            skipped: Vec::new(),
            settings: Arc::new(DispatchSettings::default()),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Params::from_map(params);
        self
    }

    /// Attaches the raw platform request, extractable as `RawRequest<T>`.
    pub fn with_raw<T: Any + Send + Sync>(self, raw: T) -> Self {
        self.with_raw_arc(Arc::new(raw))
    }

    pub fn with_raw_arc(mut self, raw: Arc<dyn Any + Send + Sync>) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_settings(mut self, settings: Arc<DispatchSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The normalized path segments of the whole request.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn out(&self) -> &TextOut {
        &self.out
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn response(&self) -> &ApiResponse {
        &self.response
    }

    pub fn raw(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.raw.as_ref()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Queues a file for binary transfer.
    pub fn attach_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn skipped(&self) -> &[SkippedCall] {
        &self.skipped
    }

    pub(crate) fn record_skip(&mut self, skipped: SkippedCall) {
        self.skipped.push(skipped);
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// The response body: direct output first, then the text buffer.
    pub fn body(&self) -> String {
        let mut body = self.out.contents();
        body.push_str(&self.buffer.contents());
        body
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("verb", &self.verb)
            .field("uri", &self.uri)
            .field("status", &self.status)
            .field("has_raw", &self.raw.is_some())
            .finish_non_exhaustive()
    }
}
