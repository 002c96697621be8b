//! Top-level request handling.
//!
//! [`PageServer`] is what a transport talks to: it turns a [`Request`] into a
//! [`Response`] by dispatching it on a page, and it is where errors that
//! escape dispatch end up. A halt reaches the page's halt hook, an API error
//! its API error hook, and any other failure its failure hook.

use std::any::Any;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, info_span};

use pathway_core::Verb;
use pathway_framework::{
    ApiCatalog, CatalogSettings, ClassRegistration, DispatchError, DispatchSettings, Dispatcher,
    Page, PageObject, RequestContext, Route, SkippedCall, registration,
};

use crate::config::PathwayConfig;
use crate::error::RuntimeResult;

/// An incoming request, already parsed by the transport.
#[derive(Clone)]
pub struct Request {
    pub verb: Verb,
    pub uri: String,
    pub params: Map<String, Value>,
    pub raw: Option<Arc<dyn Any + Send + Sync>>,
}

impl Request {
    pub fn new(verb: Verb, uri: impl Into<String>) -> Self {
        Self {
            verb,
            uri: uri.into(),
            params: Map::new(),
            raw: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Verb::Get, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Verb::Post, uri)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Attaches the transport's native request, available to handlers
    /// through `RawRequest<T>`.
    pub fn with_raw<T: Any + Send + Sync>(mut self, raw: T) -> Self {
        self.raw = Some(Arc::new(raw));
        self
    }

    fn into_context(self, settings: Arc<DispatchSettings>) -> RequestContext {
        let ctx = RequestContext::new(self.verb, self.uri)
            .with_params(self.params)
            .with_settings(settings);
        match self.raw {
            Some(raw) => ctx.with_raw_arc(raw),
            None => ctx,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("verb", &self.verb)
            .field("uri", &self.uri)
            .field("params", &self.params)
            .field("has_raw", &self.raw.is_some())
            .finish()
    }
}

/// Everything a request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Direct output followed by the text buffer.
    pub body: String,
    /// The API response map, `None` when nothing was written to it.
    pub json: Option<Map<String, Value>>,
    /// The last file handed to the output.
    pub file: Option<PathBuf>,
    /// How the request was routed; `None` when dispatch was cut short.
    pub route: Option<Route>,
    pub skipped: Vec<SkippedCall>,
}

impl Response {
    fn from_context(ctx: &RequestContext, route: Option<Route>) -> Self {
        let json = (!ctx.response().is_empty()).then(|| ctx.response().snapshot());
        Self {
            status: ctx.status(),
            body: ctx.body(),
            json,
            file: ctx.files().last().cloned(),
            route,
            skipped: ctx.skipped().to_vec(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Serves requests on pages.
#[derive(Debug, Clone)]
pub struct PageServer {
    dispatcher: Dispatcher,
    dispatch: Arc<DispatchSettings>,
    catalog: CatalogSettings,
}

impl Default for PageServer {
    fn default() -> Self {
        Self::new(DispatchSettings::default(), CatalogSettings::default())
    }
}

impl PageServer {
    pub fn new(dispatch: DispatchSettings, catalog: CatalogSettings) -> Self {
        Self {
            dispatcher: Dispatcher::from_settings(&dispatch),
            dispatch: Arc::new(dispatch),
            catalog,
        }
    }

    pub fn from_config(config: &PathwayConfig) -> Self {
        Self::new(config.dispatch.clone(), config.catalog.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Builds the registration of `P` and of every page reachable from it
    /// through field reroutes.
    ///
    /// Configuration defects surface here rather than on the first request
    /// that reaches the broken page.
    pub fn register<P: Page>(&self) -> RuntimeResult<Arc<ClassRegistration>> {
        let root = registration::<P>()?;

        let mut seen = HashSet::from([root.page_type()]);
        let mut pending = vec![Arc::clone(&root)];
        while let Some(current) = pending.pop() {
            for target in current.fields().iter().filter_map(|field| field.target()) {
                let nested = target.registration()?;
                if seen.insert(nested.page_type()) {
                    pending.push(nested);
                }
            }
        }

        info!(page = root.page_name(), pages = seen.len(), "Registered page tree");
        Ok(root)
    }

    /// Dispatches `request` on `page`.
    ///
    /// Only configuration defects are returned as errors; every other outcome
    /// is part of the response.
    pub fn serve(&self, page: &mut dyn PageObject, request: Request) -> RuntimeResult<Response> {
        let span = info_span!("request", verb = %request.verb, uri = %request.uri);
        let _enter = span.enter();

        let mut ctx = request.into_context(Arc::clone(&self.dispatch));

        let route = match self.dispatcher.handle(page, &mut ctx) {
            Ok(route) => {
                debug!(%route, status = ctx.status(), "Request served");
                Some(route)
            }
            Err(DispatchError::Halt(halt)) => {
                debug!(%halt, "Request halted");
                page.handle_halt(&mut ctx, &halt);
                None
            }
            Err(DispatchError::Api(api)) => {
                debug!(code = api.code(), "Api error reached the top level");
                if let Err(err) = page.handle_api_error(&mut ctx, &api) {
                    page.handle_failure(&mut ctx, &err);
                }
                None
            }
            Err(DispatchError::Registration(err)) => {
                error!(page = page.page_name(), "Page is misconfigured: {err}");
                return Err(err.into());
            }
            Err(err) => {
                page.handle_failure(&mut ctx, &err);
                None
            }
        };

        Ok(Response::from_context(&ctx, route))
    }

    /// Serves `request` on a fresh `P`.
    pub fn handle<P: Page + Default>(&self, request: Request) -> RuntimeResult<Response> {
        self.serve(&mut P::default(), request)
    }

    /// The API catalog of `P`.
    pub fn catalog<P: Page>(&self) -> RuntimeResult<ApiCatalog> {
        Ok(registration::<P>()?.catalog(&self.catalog)?)
    }

    /// Whether `uri` would reach a handler on `P`, without running anything.
    pub fn supports<P: Page>(&self, uri: &str) -> RuntimeResult<bool> {
        let registration = registration::<P>()?;
        let segments = pathway_core::split_path(uri);
        match self.dispatcher.supports_request_path(&registration, &segments) {
            Ok(supported) => Ok(supported),
            Err(DispatchError::Registration(err)) => Err(err.into()),
            Err(err) => {
                debug!(page = registration.page_name(), "Support check aborted: {err}");
                Ok(false)
            }
        }
    }
}
