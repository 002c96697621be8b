//! Binder and invoker.
//!
//! Invoking one matched endpoint takes four steps:
//!
//! 1. named captures of the matched pattern are written into the request
//!    parameters (last write wins);
//! 2. the receiver is resolved: the page itself, or the base part of the page
//!    that declares an inherited operation;
//! 3. the operation's parameters are bound and the operation is called;
//! 4. the returned [`Outcome`] is applied to the request's accumulators.
//!
//! A page that is not an instance of the operation's declaring type gets
//! [`Invocation::Skipped`]: nothing runs, a warning is logged and the skip is
//! recorded on the context.

use std::fmt;

use tracing::{debug, trace, warn};

use pathway_core::{Endpoint, Pattern};

use crate::context::{Params, RequestContext, SkippedCall};
use crate::error::{ApiError, DispatchResult};
use crate::page::{PageObject, write_not_found};
use crate::registration::ClassRegistration;
use crate::reply::Outcome;

/// What happened when an endpoint was invoked.
pub enum Invocation {
    /// The operation ran and its outcome was applied.
    Completed,
    /// The operation returned a delegate page.
    Delegated(Box<dyn PageObject>),
    /// A parameter could not be bound. The page's API error hook has already
    /// been called and the operation did not run.
    Unbound(ApiError),
    /// The page is not an instance of the operation's declaring type.
    Skipped,
}

impl Invocation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Delegated(_) => "delegated",
            Self::Unbound(_) => "unbound",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated(page) => f.debug_tuple("Delegated").field(&page.page_name()).finish(),
            Self::Unbound(error) => f.debug_tuple("Unbound").field(error).finish(),
            other => f.write_str(other.label()),
        }
    }
}

/// Writes the values of `pattern`'s named captures into `params`.
pub fn bind_captures<S: AsRef<str>>(pattern: &Pattern, segments: &[S], params: &Params) {
    for (name, value) in pattern.captures(segments) {
        trace!(name, value, "Bound named capture");
        params.insert(name, value);
    }
}

/// Invokes the operation behind `endpoint` on `page`.
///
/// `registration` must be the registration `endpoint` belongs to. Errors
/// returned by the operation are classified, so an API error or halt buried
/// in a source chain comes back as itself.
pub fn invoke(
    registration: &ClassRegistration,
    endpoint: &Endpoint<usize>,
    page: &mut dyn PageObject,
    ctx: &mut RequestContext,
    segments: &[String],
) -> DispatchResult<Invocation> {
    bind_captures(endpoint.pattern(), segments, ctx.params());

    let operation = registration.operation(endpoint);
    let page_name = page.page_name();

    let result = match registration.receiver(page, operation.declaring_type()) {
        Some(receiver) => operation.call(receiver, ctx),
        None => None,
    };

    let Some(result) = result else {
        warn!(
            page = page_name,
            operation = operation.name(),
            declaring = operation.declaring_name(),
            pattern = %endpoint.pattern(),
            "Skipped operation: page is not an instance of the declaring type"
        );
        ctx.record_skip(SkippedCall {
            pattern: endpoint.pattern().to_string(),
            operation: operation.name(),
            declaring: operation.declaring_name(),
            page: page_name,
        });
        return Ok(Invocation::Skipped);
    };

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => return Err(err.classify()),
        Err(extract) => {
            debug!(operation = operation.name(), "Parameter binding failed: {extract}");
            let error = ApiError::from(extract);
            page.handle_api_error(ctx, &error)?;
            return Ok(Invocation::Unbound(error));
        }
    };

    trace!(operation = operation.name(), ?outcome, "Operation returned");
    apply(outcome, page, ctx)
}

fn apply(outcome: Outcome, page: &mut dyn PageObject, ctx: &mut RequestContext) -> DispatchResult<Invocation> {
    match outcome {
        Outcome::None => {}
        Outcome::File(path) => page.deliver_file(ctx, &path)?,
        Outcome::MissingFile => write_not_found(ctx),
        Outcome::Map(map) => ctx.response().merge(map),
        Outcome::Response(response) => ctx.response().merge_from(&response),
        Outcome::Buffer(buffer) => {
            if !buffer.ptr_eq(ctx.buffer()) {
                ctx.buffer().append(&buffer.contents());
            }
        }
        Outcome::Text(text) => ctx.buffer().append(&text),
        Outcome::Page(delegate) => return Ok(Invocation::Delegated(delegate)),
    }
    Ok(Invocation::Completed)
}
