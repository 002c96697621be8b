//! Parameter binding.
//!
//! Handlers declare what they need through their parameter types. Each type
//! implements [`FromContext`], which pulls the value out of the current
//! [`RequestContext`]. The supported set is closed:
//!
//! | Type              | Value                                   |
//! |-------------------|-----------------------------------------|
//! | [`TextOut`]       | direct text output sink                 |
//! | [`Params`]        | request parameters and named captures   |
//! | [`ApiResponse`]   | structured API response accumulator     |
//! | [`TextBuffer`]    | plain text accumulator                  |
//! | [`RawRequest<T>`] | the raw platform request, if it is a `T`|
//! | `Option<T>`       | any of the above, `None` on failure     |
//!
//! # Example
//!
//! ```rust,ignore
//! #[page_routes]
//! impl Greeter {
//!     #[api_path("greet/:name")]
//!     fn greet(&mut self, params: Params, response: ApiResponse) {
//!         response.insert("hello", params.get_str("name"));
//!     }
//! }
//! ```

use std::any::{Any, type_name};
use std::ops::Deref;
use std::sync::Arc;

use crate::context::{ApiResponse, Params, RequestContext, TextBuffer, TextOut};
use crate::error::{ExtractError, ExtractResult};

/// A trait for types that can be bound from the request context.
pub trait FromContext: Sized {
    /// Extract this type from the context.
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self>;
}

impl FromContext for Params {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        Ok(ctx.params().clone())
    }
}

impl FromContext for TextOut {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        Ok(ctx.out().clone())
    }
}

impl FromContext for TextBuffer {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        Ok(ctx.buffer().clone())
    }
}

impl FromContext for ApiResponse {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        Ok(ctx.response().clone())
    }
}

/// Optional extraction: returns `None` instead of failing.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

// =============================================================================
// RawRequest
// =============================================================================

/// The raw request object of the hosting platform.
///
/// Extraction fails with [`ExtractError::UnsupportedParameter`] when no raw
/// request is attached or when it is not a `T`. The binder turns that into a
/// recoverable API error and skips the handler.
#[derive(Debug)]
pub struct RawRequest<T>(pub Arc<T>);

impl<T> Clone for RawRequest<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for RawRequest<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Any + Send + Sync> FromContext for RawRequest<T> {
    fn from_context(ctx: &RequestContext) -> ExtractResult<Self> {
        let raw = ctx
            .raw()
            .ok_or_else(|| ExtractError::UnsupportedParameter {
                expected: type_name::<T>(),
                reason: "no platform request is attached".into(),
            })?;

        Arc::clone(raw)
            .downcast::<T>()
            .map(RawRequest)
            .map_err(|_| ExtractError::UnsupportedParameter {
                expected: type_name::<T>(),
                reason: "the platform request has a different type".into(),
            })
    }
}
