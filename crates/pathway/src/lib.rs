//! # Pathway
//!
//! Annotation-driven endpoint routing and dispatch for page-oriented web
//! handlers.
//!
//! ## Overview
//!
//! A *page* is a type whose methods and constants carry route attributes.
//! Pathway collects those routes once per type, matches each request path
//! against them, runs before/after interceptors around the winning handler
//! and can hand the rest of a path to another page (a *reroute*).
//!
//! ```text
//! Request ──▶ PageServer ──▶ Dispatcher ──▶ api │ path │ method reroute │ field reroute │ missing
//!                                 ▲                          │                 │
//!                                 └──────── rest of path ────┴─────────────────┘
//! ```
//!
//! - **Core**: route patterns, verbs and the ranked endpoint map
//! - **Framework**: pages, registrations, the dispatcher and parameter binding
//! - **Macros**: `#[page_routes]`
//! - **Runtime**: the page server, configuration and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pathway::prelude::*;
//!
//! #[derive(Default)]
//! struct Home;
//!
//! #[page_routes(crate = pathway::framework)]
//! impl Home {
//!     #[request_path("hello/:name")]
//!     fn hello(&self, params: Params) -> String {
//!         format!("hello {}", params.get_str("name").unwrap_or_default())
//!     }
//! }
//!
//! impl Page for Home {}
//!
//! fn main() -> RuntimeResult<()> {
//!     let server = PageServer::default();
//!     server.register::<Home>()?;
//!     let response = server.handle::<Home>(Request::get("/hello/world"))?;
//!     assert_eq!(response.body, "hello world");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use pathway_core as core;
pub use pathway_framework as framework;
pub use pathway_macros::page_routes;
pub use pathway_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pathway::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use pathway_runtime::{ConfigLoader, PageServer, Request, Response, RuntimeResult};

    // Page declaration
    pub use pathway_macros::page_routes;
    pub use pathway_framework::{Page, Reroute};

    // Extractors - for handler parameters
    pub use pathway_framework::{ApiResponse, Params, RawRequest, TextBuffer, TextOut};

    // Errors handlers may return
    pub use pathway_framework::{ApiError, Halt};

    // Lower-level dispatch
    pub use pathway_framework::{Dispatcher, RequestContext, Route, Verb};

    // Logging
    pub use pathway_runtime::prelude::*;
}
