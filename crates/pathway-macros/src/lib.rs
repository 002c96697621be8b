//! Procedural macros for the Pathway page framework.
//!
//! This crate provides:
//!
//! - `#[page_routes]` - Turns route attributes on an `impl` block into a
//!   `PageRoutes` implementation
//!
//! # Route attributes
//!
//! | Attribute | On | Meaning |
//! |-----------|----|---------|
//! | `#[request_path("a", ..)]` | method | simple path; reroute when the method returns a page |
//! | `#[api_path("a", ..)]` | method | API path; reroute when the method returns a page |
//! | `#[request_before("a", ..)]` | method | before-interceptor |
//! | `#[request_after("a", ..)]` | method | after-interceptor |
//! | `#[request_type(GET, POST)]` | method | verbs a simple path accepts (all when omitted); catalog methods for an API path |
//! | `#[required_variables("a", ..)]` | method | API catalog metadata |
//! | `#[optional_variables("a", ..)]` | method | API catalog metadata |
//! | `#[request_path("a/*")]` | `const X: Reroute<Page>` | static reroute to `Page` |
//!
//! ```rust,ignore
//! use pathway::prelude::*;
//!
//! #[derive(Default)]
//! struct Shop;
//!
//! #[page_routes]
//! impl Shop {
//!     #[request_path("admin/*")]
//!     const ADMIN: Reroute<AdminPage> = Reroute::new();
//!
//!     #[request_before("*")]
//!     fn log(&self, params: Params) {
//!         info!(?params, "incoming");
//!     }
//!
//!     #[api_path("item/:id")]
//!     #[request_type(GET)]
//!     #[required_variables("id")]
//!     fn item(&mut self, params: Params, response: ApiResponse) {
//!         response.insert("id", params.get("id"));
//!     }
//! }
//!
//! impl Page for Shop {}
//! ```
//!
//! Pages built on another page name it with `inherit`; the page must
//! implement `BorrowMut<Base>`:
//!
//! ```rust,ignore
//! #[page_routes(inherit = Shop)]
//! impl SeasonalShop {
//!     #[request_path("sale")]
//!     fn sale(&self) -> &'static str { "50% off" }
//! }
//! ```
//!
//! Generated code refers to `::pathway_framework`. Crates that only depend on
//! the facade pass `crate = pathway::framework`.

mod routes;

use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

/// Generates `PageRoutes` for the type of an inherent `impl` block.
///
/// Route attributes are removed from the block; everything else is kept
/// unchanged. See the crate documentation for the attribute table.
#[proc_macro_attribute]
pub fn page_routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);

    let result = routes::PageArgs::parse(attr.into()).and_then(|args| routes::expand(&args, item));
    match result {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
