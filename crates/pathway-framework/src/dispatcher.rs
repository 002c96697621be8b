//! Request dispatcher.
//!
//! The [`Dispatcher`] routes one request through a page's class registration.
//! Attempts are tried in a fixed order and the first that applies wins:
//!
//! 1. **api**: best match in the api map;
//! 2. **path**: best match in the path map for the request verb (the only
//!    attempt that honours declared verbs);
//! 3. **method reroute**: the best page-returning operation is called and the
//!    rest of the path is dispatched on the page it returns;
//! 4. **field reroute**: a fresh instance of the field's page type receives
//!    the rest of the path.
//!
//! When nothing applies, the page's missing-route hook runs.
//!
//! Every before-interceptor of the current page whose pattern matches runs
//! (most specific first, whatever its declared verbs) ahead of the winning
//! attempt, and every matching after-interceptor runs once it has finished. Reroutes repeat this on each layer, so
//! interceptors of outer pages wrap those of inner pages.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new();
//! let mut ctx = RequestContext::new(Verb::Get, "/users/alice/profile");
//! let route = dispatcher.handle(&mut RootPage::default(), &mut ctx)?;
//! assert!(!route.is_missing());
//! ```

use std::fmt;

use tracing::{Level, debug, span, trace};

use pathway_core::{Endpoint, EndpointMap, join_path};

use crate::context::RequestContext;
use crate::error::{ApiError, DispatchError, DispatchResult};
use crate::invoke::{Invocation, bind_captures, invoke};
use crate::page::PageObject;
use crate::registration::ClassRegistration;
use crate::settings::{DEFAULT_MAX_REROUTE_DEPTH, DispatchSettings};

/// The attempt that served a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Api { pattern: String },
    Path { pattern: String },
    MethodReroute { pattern: String, inner: Box<Route> },
    FieldReroute { pattern: String, inner: Box<Route> },
    /// Nothing matched; the missing-route hook ran.
    Missing,
}

impl Route {
    pub fn is_missing(&self) -> bool {
        matches!(self.terminal(), Self::Missing)
    }

    /// The route that ended the reroute chain.
    pub fn terminal(&self) -> &Route {
        match self {
            Self::MethodReroute { inner, .. } | Self::FieldReroute { inner, .. } => inner.terminal(),
            other => other,
        }
    }

    /// Number of reroute layers traversed.
    pub fn depth(&self) -> usize {
        match self {
            Self::MethodReroute { inner, .. } | Self::FieldReroute { inner, .. } => 1 + inner.depth(),
            _ => 0,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { pattern } => write!(f, "api({pattern})"),
            Self::Path { pattern } => write!(f, "path({pattern})"),
            Self::MethodReroute { pattern, inner } => write!(f, "method({pattern}) -> {inner}"),
            Self::FieldReroute { pattern, inner } => write!(f, "field({pattern}) -> {inner}"),
            Self::Missing => f.write_str("missing"),
        }
    }
}

/// Routes requests through class registrations.
///
/// The dispatcher holds no per-request state and can be shared freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatcher {
    max_depth: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-layer state.
struct Layer<'a> {
    registration: &'a ClassRegistration,
    segments: &'a [String],
    depth: usize,
    before_ran: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_REROUTE_DEPTH,
        }
    }

    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self::new().with_max_depth(settings.max_reroute_depth)
    }

    /// Sets the maximum number of nested reroutes.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Dispatches the whole request path of `ctx` on `page`.
    pub fn handle(&self, page: &mut dyn PageObject, ctx: &mut RequestContext) -> DispatchResult<Route> {
        let segments = ctx.segments().to_vec();
        self.handle_request(page, ctx, &segments)
    }

    /// Dispatches `segments` on `page`, using the registration of the page's type.
    pub fn handle_request(
        &self,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
        segments: &[String],
    ) -> DispatchResult<Route> {
        let registration = page.registration()?;
        self.handle_request_with(&registration, page, ctx, segments)
    }

    /// Dispatches `segments` on `page` using an explicit registration.
    ///
    /// Operations of `registration` whose declaring type `page` is not an
    /// instance of are skipped and recorded on the context.
    pub fn handle_request_with(
        &self,
        registration: &ClassRegistration,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
        segments: &[String],
    ) -> DispatchResult<Route> {
        self.dispatch(registration, page, ctx, segments, 0)
    }

    /// Returns true if `registration` can serve `segments`, following field
    /// reroutes without running any handler.
    pub fn supports_request_path(
        &self,
        registration: &ClassRegistration,
        segments: &[String],
    ) -> DispatchResult<bool> {
        self.supports(registration, segments, 0)
    }

    fn supports(&self, registration: &ClassRegistration, segments: &[String], depth: usize) -> DispatchResult<bool> {
        self.check_depth(registration, depth)?;

        if registration.path.has_match(segments) || registration.api.has_match(segments) {
            return Ok(true);
        }
        let Some(endpoint) = registration.field_reroute.best_match(segments, None) else {
            return Ok(false);
        };
        let Some(target) = registration.field(endpoint).target() else {
            return Ok(false);
        };

        let delegate = target.registration()?;
        self.supports(&delegate, endpoint.pattern().remainder(segments), depth + 1)
    }

    fn check_depth(&self, registration: &ClassRegistration, depth: usize) -> DispatchResult<()> {
        if depth > self.max_depth {
            return Err(DispatchError::RerouteDepthExceeded {
                page: registration.page_name(),
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn dispatch(
        &self,
        registration: &ClassRegistration,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
        segments: &[String],
        depth: usize,
    ) -> DispatchResult<Route> {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            page = registration.page_name(),
            path = %join_path(segments),
            depth
        );
        let _enter = span.enter();

        self.check_depth(registration, depth)?;

        let mut layer = Layer {
            registration,
            segments,
            depth,
            before_ran: false,
        };

        if let Some(route) = self.try_api(&mut layer, page, ctx)? {
            return Ok(route);
        }
        if let Some(route) = self.try_path(&mut layer, page, ctx)? {
            return Ok(route);
        }
        if let Some(route) = self.try_method_reroute(&mut layer, page, ctx)? {
            return Ok(route);
        }
        if let Some(route) = self.try_field_reroute(&mut layer, page, ctx)? {
            return Ok(route);
        }

        debug!("No route matched");
        page.handle_missing_route(ctx)?;
        Ok(Route::Missing)
    }

    fn try_api(
        &self,
        layer: &mut Layer<'_>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<Option<Route>> {
        let Some(endpoint) = layer.registration.api.best_match(layer.segments, None) else {
            return Ok(None);
        };
        debug!(pattern = %endpoint.pattern(), "Api route matched");

        match self.run_primary(layer, endpoint, page, ctx) {
            Ok(()) => Ok(Some(Route::Api {
                pattern: endpoint.pattern().to_string(),
            })),
            Err(DispatchError::Failed(source)) => Err(ApiError::from_error(&*source).into()),
            Err(err) => Err(err),
        }
    }

    fn try_path(
        &self,
        layer: &mut Layer<'_>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<Option<Route>> {
        let Some(endpoint) = layer
            .registration
            .path
            .best_match(layer.segments, Some(ctx.verb()))
        else {
            return Ok(None);
        };
        debug!(pattern = %endpoint.pattern(), "Path route matched");

        self.run_primary(layer, endpoint, page, ctx)?;
        Ok(Some(Route::Path {
            pattern: endpoint.pattern().to_string(),
        }))
    }

    fn try_method_reroute(
        &self,
        layer: &mut Layer<'_>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<Option<Route>> {
        let registration = layer.registration;
        let Some(endpoint) = registration.method_reroute.best_match(layer.segments, None) else {
            return Ok(None);
        };
        debug!(pattern = %endpoint.pattern(), "Method reroute matched");

        self.run_before(layer, page, ctx)?;
        let mut delegate = match invoke(registration, endpoint, page, ctx, layer.segments)? {
            Invocation::Delegated(delegate) => delegate,
            other => {
                debug!(result = other.label(), "Method reroute produced no page");
                return Ok(None);
            }
        };

        let rest = endpoint.pattern().remainder(layer.segments);
        let target = delegate.registration()?;
        if !self.supports(&target, rest, layer.depth + 1)? {
            debug!(delegate = target.page_name(), "Delegate page cannot serve the rest of the path");
            return Ok(None);
        }

        delegate.adopt_state(&*page);
        let inner = self.dispatch(&target, &mut *delegate, ctx, rest, layer.depth + 1)?;
        self.run_chain(&registration.after, layer, page, ctx)?;

        Ok(Some(Route::MethodReroute {
            pattern: endpoint.pattern().to_string(),
            inner: Box::new(inner),
        }))
    }

    fn try_field_reroute(
        &self,
        layer: &mut Layer<'_>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<Option<Route>> {
        let registration = layer.registration;
        let Some(endpoint) = registration.field_reroute.best_match(layer.segments, None) else {
            return Ok(None);
        };
        let Some(target) = registration.field(endpoint).target() else {
            return Ok(None);
        };
        debug!(pattern = %endpoint.pattern(), delegate = target.name(), "Field reroute matched");

        bind_captures(endpoint.pattern(), layer.segments, ctx.params());

        let rest = endpoint.pattern().remainder(layer.segments);
        let delegate_registration = target.registration()?;
        if !self.supports(&delegate_registration, rest, layer.depth + 1)? {
            debug!(delegate = target.name(), "Delegate page cannot serve the rest of the path");
            return Ok(None);
        }

        self.run_before(layer, page, ctx)?;
        let mut delegate = target.construct();
        delegate.adopt_state(&*page);
        let inner = self.dispatch(&delegate_registration, &mut *delegate, ctx, rest, layer.depth + 1)?;
        self.run_chain(&registration.after, layer, page, ctx)?;

        Ok(Some(Route::FieldReroute {
            pattern: endpoint.pattern().to_string(),
            inner: Box::new(inner),
        }))
    }

    fn run_primary(
        &self,
        layer: &mut Layer<'_>,
        endpoint: &Endpoint<usize>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<()> {
        self.run_before(layer, page, ctx)?;
        let invocation = invoke(layer.registration, endpoint, page, ctx, layer.segments)?;
        trace!(result = invocation.label(), "Primary operation finished");
        self.run_chain(&layer.registration.after, layer, page, ctx)
    }

    /// Runs the before chain unless it already ran on this layer.
    fn run_before(&self, layer: &mut Layer<'_>, page: &mut dyn PageObject, ctx: &mut RequestContext) -> DispatchResult<()> {
        if layer.before_ran {
            return Ok(());
        }
        layer.before_ran = true;
        self.run_chain(&layer.registration.before, layer, page, ctx)
    }

    fn run_chain(
        &self,
        map: &EndpointMap<usize>,
        layer: &Layer<'_>,
        page: &mut dyn PageObject,
        ctx: &mut RequestContext,
    ) -> DispatchResult<()> {
        for endpoint in map.find_valid_keys(layer.segments, None) {
            let invocation = invoke(layer.registration, endpoint, page, ctx, layer.segments)?;
            trace!(pattern = %endpoint.pattern(), result = invocation.label(), "Interceptor finished");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TextBuffer;
    use crate::error::Halt;
    use crate::introspect::{RouteTag, TypeDescriptor};
    use crate::page::{Page, PageRoutes, Reroute};
    use crate::registration::registration;
    use pathway_core::{Verb, VerbSet, split_path};

    #[derive(Default)]
    struct Inner;

    impl Inner {
        fn leaf(&self, buffer: TextBuffer) {
            buffer.append("leaf;");
        }
    }

    impl PageRoutes for Inner {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.operation("leaf", Self::leaf, vec![RouteTag::Path("leaf".into())]);
        }
    }

    impl Page for Inner {}

    #[derive(Default)]
    struct Outer;

    impl Outer {
        fn before(&self, buffer: TextBuffer) {
            buffer.append("before;");
        }

        fn after(&self, buffer: TextBuffer) {
            buffer.append("after;");
        }

        fn posted(&self, buffer: TextBuffer) {
            buffer.append("posted;");
        }

        fn dynamic(&self) -> Option<Inner> {
            Some(Inner)
        }

        fn nothing(&self) -> Option<Inner> {
            None
        }

        fn stop(&self) -> Result<(), Halt> {
            Err(Halt::with_message("stopped"))
        }
    }

    impl PageRoutes for Outer {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.operation("before", Self::before, vec![RouteTag::Before("*".into())]);
            d.operation("after", Self::after, vec![RouteTag::After("*".into())]);
            d.operation(
                "posted",
                Self::posted,
                vec![
                    RouteTag::Path("form".into()),
                    RouteTag::Verbs(VerbSet::new().with(Verb::Post)),
                ],
            );
            d.operation("dynamic", Self::dynamic, vec![RouteTag::Path("dyn/*".into())]);
            d.operation("nothing", Self::nothing, vec![RouteTag::Path("static/*".into())]);
            d.operation("stop", Self::stop, vec![RouteTag::Before("halt/*".into())]);
            d.field("STATIC", Reroute::<Inner>::new(), vec![RouteTag::Path("static/*".into())]);
            d.field("HALT", Reroute::<Inner>::new(), vec![RouteTag::Path("halt/*".into())]);
        }
    }

    impl Page for Outer {}

    fn dispatch(verb: Verb, uri: &str) -> (RequestContext, DispatchResult<Route>) {
        let mut ctx = RequestContext::new(verb, uri);
        let route = Dispatcher::new().handle(&mut Outer, &mut ctx);
        (ctx, route)
    }

    #[test]
    fn test_verb_filter_on_path() {
        let (ctx, route) = dispatch(Verb::Post, "form");
        assert_eq!(route.unwrap(), Route::Path { pattern: "form".into() });
        assert_eq!(ctx.buffer().contents(), "before;posted;after;");

        let (ctx, route) = dispatch(Verb::Get, "form");
        assert!(route.unwrap().is_missing());
        assert_eq!(ctx.status(), 404);
    }

    #[test]
    fn test_method_reroute() {
        let (ctx, route) = dispatch(Verb::Get, "dyn/leaf");
        let route = route.unwrap();
        assert_eq!(route.depth(), 1);
        assert_eq!(route.terminal(), &Route::Path { pattern: "leaf".into() });
        assert_eq!(ctx.buffer().contents(), "before;leaf;after;");
    }

    #[test]
    fn test_empty_method_reroute_falls_through_to_field() {
        let (ctx, route) = dispatch(Verb::Get, "static/leaf");
        assert!(matches!(route.unwrap(), Route::FieldReroute { ref pattern, .. } if pattern == "static/*"));
        assert_eq!(ctx.buffer().contents(), "before;leaf;after;");
    }

    #[test]
    fn test_unsupported_sub_path_is_missing() {
        let (ctx, route) = dispatch(Verb::Get, "dyn/nowhere");
        assert!(route.unwrap().is_missing());
        assert_eq!(ctx.status(), 404);
    }

    #[test]
    fn test_halt_stops_chain() {
        let (ctx, route) = dispatch(Verb::Get, "halt/leaf");
        assert!(matches!(route, Err(DispatchError::Halt(_))));
        assert!(!ctx.buffer().contents().contains("leaf;"));
        assert!(!ctx.buffer().contents().contains("after;"));
    }

    #[test]
    fn test_supports_request_path() {
        let reg = registration::<Outer>().unwrap();
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.supports_request_path(&reg, &split_path("static/leaf")).unwrap());
        assert!(!dispatcher.supports_request_path(&reg, &split_path("static/other")).unwrap());
        // method reroutes are not followed without running the operation
        assert!(!dispatcher.supports_request_path(&reg, &split_path("dyn/leaf")).unwrap());
    }

    #[derive(Default)]
    struct Audited;

    impl Audited {
        fn audit(&self, buffer: TextBuffer) {
            buffer.append("audit;");
        }

        fn sub(&self) -> Option<Inner> {
            Some(Inner)
        }
    }

    impl PageRoutes for Audited {
        fn describe(d: &mut TypeDescriptor<Self>) {
            let post_only = || RouteTag::Verbs(VerbSet::new().with(Verb::Post));
            d.operation("audit", Self::audit, vec![RouteTag::Before("*".into()), post_only()]);
            d.operation("sub", Self::sub, vec![RouteTag::Path("sub/*".into()), post_only()]);
        }
    }

    impl Page for Audited {}

    #[test]
    fn test_declared_verbs_do_not_gate_reroutes_or_interceptors() {
        let mut ctx = RequestContext::new(Verb::Get, "sub/leaf");
        let route = Dispatcher::new().handle(&mut Audited, &mut ctx).unwrap();
        assert_eq!(
            route,
            Route::MethodReroute {
                pattern: "sub/*".into(),
                inner: Box::new(Route::Path { pattern: "leaf".into() }),
            }
        );
        assert_eq!(ctx.buffer().contents(), "audit;leaf;");
    }

    #[derive(Default)]
    struct Cycle;

    impl PageRoutes for Cycle {
        fn describe(d: &mut TypeDescriptor<Self>) {
            d.field("SELF", Reroute::<Cycle>::new(), vec![RouteTag::Path("*".into())]);
        }
    }

    impl Page for Cycle {}

    #[test]
    fn test_cyclic_reroute_hits_depth_limit() {
        let mut ctx = RequestContext::new(Verb::Get, "a/b");
        let result = Dispatcher::new().with_max_depth(4).handle(&mut Cycle, &mut ctx);
        assert!(matches!(
            result,
            Err(DispatchError::RerouteDepthExceeded { limit: 4, .. })
        ));
    }
}
