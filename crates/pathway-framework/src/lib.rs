//! # Pathway Framework
//!
//! Page registration, request dispatch and parameter binding.
//!
//! This layer provides:
//! - [`RequestContext`] and the shared request accumulators
//! - Axum-style [`Handler`]s: page methods whose parameters implement
//!   [`FromContext`] and whose return type implements [`Reply`]
//! - [`TypeDescriptor`], the declared routes of a page type, normally filled
//!   by `#[page_routes]`
//! - [`ClassRegistration`], the per-type routing table, cached process-wide
//! - the [`Dispatcher`] and the binder/invoker it drives
//! - the [`ApiCatalog`] of reachable API endpoints
//!
//! ```rust,ignore
//! use pathway_framework::{Dispatcher, Page, Params, RequestContext, Verb};
//! use pathway_macros::page_routes;
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! #[page_routes]
//! impl Hello {
//!     #[request_path("hello/:name")]
//!     fn hello(&self, params: Params) -> String {
//!         format!("hello {}", params.get_str("name").unwrap_or_default())
//!     }
//! }
//!
//! impl Page for Hello {}
//!
//! let mut ctx = RequestContext::new(Verb::Get, "/hello/alice");
//! Dispatcher::new().handle(&mut Hello, &mut ctx)?;
//! assert_eq!(ctx.body(), "hello alice");
//! ```

pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod introspect;
pub mod invoke;
pub mod page;
pub mod registration;
pub mod reply;
pub mod settings;

pub use catalog::{ApiCatalog, ApiEntry};
pub use context::{ApiResponse, Params, RequestContext, SkippedCall, TextBuffer, TextOut};
pub use dispatcher::{Dispatcher, Route};
pub use error::{
    ApiError, DispatchError, DispatchResult, ExtractError, ExtractResult, Halt, RegistrationError,
};
pub use extractor::{FromContext, RawRequest};
pub use handler::{CallResult, Handler};
pub use introspect::{DeclaredField, DeclaredOperation, RouteTag, TypeDescriptor};
pub use invoke::{Invocation, bind_captures, invoke};
pub use page::{Page, PageObject, PageRoutes, PageTarget, Reroute, write_api_error, write_not_found};
pub use registration::{ClassRegistration, is_registered, registration};
pub use reply::{Outcome, Reply, ReplyKind};
pub use settings::{CatalogSettings, DEFAULT_MAX_REROUTE_DEPTH, DispatchSettings};

pub use pathway_core::{Pattern, PatternError, Verb, VerbSet, join_path, split_path};
