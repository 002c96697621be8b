//! # Pathway Core
//!
//! Pattern model and endpoint registry for the Pathway page framework.
//!
//! This crate is a pure string algorithm with no knowledge of pages or
//! requests:
//!
//! - [`Pattern`] parses route templates (`hello/:name/*`) into classified
//!   [`Segment`]s and implements the per-segment matching rule.
//! - [`EndpointMap`] stores patterns with an associated handler reference and
//!   returns ranked matches for a request path.
//! - [`Verb`] and [`VerbSet`] describe per-handler verb filters.
//!
//! ## Example
//!
//! ```
//! use pathway_core::{EndpointMap, split_path};
//!
//! let mut map = EndpointMap::new();
//! map.register_endpoint_path("hello/*", "fallback").unwrap();
//! map.register_endpoint_path("hello/world", "exact").unwrap();
//!
//! let best = map.best_match(&split_path("/hello/world"), None).unwrap();
//! assert_eq!(*best.handler(), "exact");
//! ```

pub mod endpoint;
pub mod error;
pub mod pattern;
pub mod verb;

pub use endpoint::{Endpoint, EndpointMap, sort_endpoint_list};
pub use error::{PatternError, PatternResult};
pub use pattern::{Pattern, Segment, SegmentKind, is_valid_endpoint, join_path, split_path};
pub use verb::{Verb, VerbSet};
