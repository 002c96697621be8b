//! Pages: the handler classes the dispatcher routes into.
//!
//! A page is any `'static` type that implements:
//!
//! - [`PageRoutes`], describing its operations and reroute fields (usually
//!   generated by `#[page_routes]`);
//! - [`Page`], the output and error hooks. Every hook has a default, so an
//!   empty `impl Page for MyPage {}` is enough.
//!
//! The dispatcher works with pages through the object-safe [`PageObject`],
//! which is implemented for every [`Page`].

use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use tracing::error;

use crate::context::RequestContext;
use crate::error::{ApiError, DispatchError, Halt, RegistrationError};
use crate::introspect::TypeDescriptor;
use crate::registration::{ClassRegistration, registration};

/// Describes the routes a page declares.
pub trait PageRoutes: Sized + 'static {
    /// Records operations, fields and base types on `descriptor`.
    fn describe(descriptor: &mut TypeDescriptor<Self>);
}

/// Writes the plain not-found notice for the current request.
pub fn write_not_found(ctx: &mut RequestContext) {
    ctx.set_status(404);
    if ctx.settings().not_found_notice {
        let notice = format!(
            "<h1>404 Error</h1>\nThe requested resource is not available\n\nRequest URI : {}",
            ctx.uri()
        );
        ctx.out().write(&notice);
    }
}

/// Writes `error` into the API response under `"error"` and sets the status.
pub fn write_api_error(ctx: &mut RequestContext, error: &ApiError) {
    ctx.set_status(error.status());
    let map = error.to_map(ctx.settings().expose_error_trace);
    ctx.response().insert("error", map);
}

/// Output and error hooks of a page.
pub trait Page: PageRoutes {
    /// Called when no route matches the request.
    fn missing_route(&mut self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        write_not_found(ctx);
        Ok(())
    }

    /// Called with recoverable API errors, including unbindable parameters.
    fn api_error(&mut self, ctx: &mut RequestContext, error: &ApiError) -> Result<(), DispatchError> {
        write_api_error(ctx, error);
        Ok(())
    }

    /// Called once when a handler or interceptor halts the request.
    fn halted(&mut self, _ctx: &mut RequestContext, _halt: &Halt) {}

    /// Called with failures that are neither API errors nor halts.
    fn failure(&mut self, ctx: &mut RequestContext, error: &DispatchError) {
        error!(page = type_name::<Self>(), uri = ctx.uri(), "Request failed: {error}");
        ctx.set_status(500);
        ctx.out().write("<h1>500 Error</h1>\nThe server failed to process the request");
    }

    /// Transfers a file returned by a handler. Missing files answer 404.
    fn send_file(&mut self, ctx: &mut RequestContext, path: &Path) -> Result<(), DispatchError> {
        if path.is_file() {
            ctx.attach_file(path.to_path_buf());
        } else {
            ctx.set_status(404);
        }
        Ok(())
    }

    /// Receives state from the page that delegates to this one.
    ///
    /// The request accumulators are already shared through the context; this
    /// hook is for page-specific fields.
    fn transfer_from(&mut self, _parent: &dyn Any) {}
}

/// Object-safe view of a [`Page`].
pub trait PageObject: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn page_type(&self) -> TypeId;
    fn page_name(&self) -> &'static str;

    /// The registration of the concrete page type, built on first use.
    fn registration(&self) -> Result<Arc<ClassRegistration>, RegistrationError>;

    fn handle_missing_route(&mut self, ctx: &mut RequestContext) -> Result<(), DispatchError>;
    fn handle_api_error(&mut self, ctx: &mut RequestContext, error: &ApiError) -> Result<(), DispatchError>;
    fn handle_halt(&mut self, ctx: &mut RequestContext, halt: &Halt);
    fn handle_failure(&mut self, ctx: &mut RequestContext, error: &DispatchError);
    fn deliver_file(&mut self, ctx: &mut RequestContext, path: &Path) -> Result<(), DispatchError>;
    fn adopt_state(&mut self, parent: &dyn PageObject);
}

impl<P: Page> PageObject for P {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn page_type(&self) -> TypeId {
        TypeId::of::<P>()
    }

    fn page_name(&self) -> &'static str {
        type_name::<P>()
    }

    fn registration(&self) -> Result<Arc<ClassRegistration>, RegistrationError> {
        registration::<P>()
    }

    fn handle_missing_route(&mut self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        self.missing_route(ctx)
    }

    fn handle_api_error(&mut self, ctx: &mut RequestContext, error: &ApiError) -> Result<(), DispatchError> {
        self.api_error(ctx, error)
    }

    fn handle_halt(&mut self, ctx: &mut RequestContext, halt: &Halt) {
        self.halted(ctx, halt);
    }

    fn handle_failure(&mut self, ctx: &mut RequestContext, error: &DispatchError) {
        self.failure(ctx, error);
    }

    fn deliver_file(&mut self, ctx: &mut RequestContext, path: &Path) -> Result<(), DispatchError> {
        self.send_file(ctx, path)
    }

    fn adopt_state(&mut self, parent: &dyn PageObject) {
        self.transfer_from(parent.as_any());
    }
}

// =============================================================================
// Reroute fields
// =============================================================================

/// Declares a static reroute to page `Q`.
///
/// Used as the type of an associated constant tagged with `#[request_path]`.
/// For every matching request a fresh `Q::default()` receives the rest of the path.
///
/// ```rust,ignore
/// #[page_routes]
/// impl Root {
///     #[request_path("admin/*")]
///     const ADMIN: Reroute<AdminPage> = Reroute::new();
/// }
/// ```
pub struct Reroute<Q>(PhantomData<fn() -> Q>);

impl<Q> Reroute<Q> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<Q> Default for Reroute<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Clone for Reroute<Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q> Copy for Reroute<Q> {}

/// Type-erased handle to a delegate page type.
#[derive(Clone, Copy)]
pub struct PageTarget {
    pub(crate) name: &'static str,
    pub(crate) construct: fn() -> Box<dyn PageObject>,
    pub(crate) registration: fn() -> Result<Arc<ClassRegistration>, RegistrationError>,
}

impl PageTarget {
    pub fn of<Q: Page + Default>() -> Self {
        Self {
            name: type_name::<Q>(),
            construct: construct::<Q>,
            registration: registration::<Q>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creates a fresh instance of the delegate page.
    pub fn construct(&self) -> Box<dyn PageObject> {
        (self.construct)()
    }

    pub fn registration(&self) -> Result<Arc<ClassRegistration>, RegistrationError> {
        (self.registration)()
    }
}

impl std::fmt::Debug for PageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PageTarget").field(&self.name).finish()
    }
}

fn construct<Q: Page + Default>() -> Box<dyn PageObject> {
    Box::new(Q::default())
}
