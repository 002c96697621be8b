//! End-to-end routing tests for pages declared with `#[page_routes]`.

use std::borrow::{Borrow, BorrowMut};
use std::io;
use std::path::PathBuf;

use pathway_framework::{
    ApiError, ApiResponse, CatalogSettings, DispatchError, DispatchResult, Dispatcher, Halt, Page,
    PageObject, Params, RawRequest, RegistrationError, RequestContext, Reroute, Route, TextBuffer,
    TextOut, Verb, registration,
};
use pathway_macros::page_routes;
use serde_json::{Map, Value, json};

fn request(page: &mut dyn PageObject, verb: Verb, uri: &str) -> (RequestContext, DispatchResult<Route>) {
    let mut ctx = RequestContext::new(verb, uri);
    let route = Dispatcher::new().handle(page, &mut ctx);
    (ctx, route)
}

fn not_found(uri: &str) -> String {
    format!("<h1>404 Error</h1>\nThe requested resource is not available\n\nRequest URI : {uri}")
}

fn entries(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
        .collect()
}

// =============================================================================
// Multiple endpoints
// =============================================================================

#[derive(Default)]
struct HelloWorld;

#[page_routes]
impl HelloWorld {
    #[request_path("hello")]
    fn hello(&self, out: TextOut) {
        out.write("good");
    }

    #[request_path("*")]
    fn fallback(&self, out: TextOut) {
        out.write("bad");
    }
}

impl Page for HelloWorld {}

#[test]
fn test_most_specific_endpoint_wins() {
    let (ctx, route) = request(&mut HelloWorld, Verb::Get, "/hello");
    assert_eq!(route.unwrap(), Route::Path { pattern: "hello".into() });
    assert_eq!(ctx.body(), "good");

    let (ctx, _) = request(&mut HelloWorld, Verb::Get, "/something");
    assert_eq!(ctx.body(), "bad");
}

#[derive(Default)]
struct BaseEndpoint;

#[page_routes]
impl BaseEndpoint {
    #[request_path("*")]
    #[request_type(GET, POST, DELETE, PUT)]
    fn fallback(&self, out: TextOut) {
        out.write("bad");
    }
}

impl Page for BaseEndpoint {}

#[derive(Default)]
struct ExtendedEndpoints {
    base: BaseEndpoint,
}

impl Borrow<BaseEndpoint> for ExtendedEndpoints {
    fn borrow(&self) -> &BaseEndpoint {
        &self.base
    }
}

impl BorrowMut<BaseEndpoint> for ExtendedEndpoints {
    fn borrow_mut(&mut self) -> &mut BaseEndpoint {
        &mut self.base
    }
}

#[page_routes(inherit = BaseEndpoint)]
impl ExtendedEndpoints {
    #[request_path("hello")]
    #[request_type(POST)]
    fn good_result(&self, out: TextOut) {
        out.write("good");
    }

    #[request_path("various", "red", "hearings")]
    #[request_type(post)]
    fn various(&self, out: TextOut) {
        out.write("bad");
    }
}

impl Page for ExtendedEndpoints {}

#[test]
fn test_inherited_endpoints() {
    for uri in ["/hello", "/hello/"] {
        let (ctx, _) = request(&mut ExtendedEndpoints::default(), Verb::Post, uri);
        assert_eq!(ctx.body(), "good", "{uri}");
    }
    for uri in ["/something", "/something/else", "/red"] {
        let (ctx, _) = request(&mut ExtendedEndpoints::default(), Verb::Post, uri);
        assert_eq!(ctx.body(), "bad", "{uri}");
    }

    // GET falls back to the inherited wildcard
    let (ctx, _) = request(&mut ExtendedEndpoints::default(), Verb::Get, "/hello");
    assert_eq!(ctx.body(), "bad");
    assert!(ctx.skipped().is_empty());
}

// =============================================================================
// Request types
// =============================================================================

#[derive(Default)]
struct Typed;

#[page_routes]
impl Typed {
    #[request_path("type/single")]
    #[request_type(GET)]
    fn single(&self) -> &'static str {
        "world"
    }

    #[request_path("type/multiple")]
    #[request_type(GET, POST)]
    fn multiple(&self) -> &'static str {
        "world"
    }

    #[request_path("type/none")]
    fn none(&self) -> &'static str {
        "world"
    }
}

impl Page for Typed {}

#[test]
fn test_request_types() {
    for (verb, uri) in [
        (Verb::Get, "/type/single"),
        (Verb::Get, "/type/multiple"),
        (Verb::Post, "/type/multiple"),
        (Verb::Put, "/type/none"),
        (Verb::Delete, "/type/none"),
    ] {
        let (ctx, route) = request(&mut Typed, verb, uri);
        assert!(!route.unwrap().is_missing(), "{verb} {uri}");
        assert_eq!(ctx.body(), "world");
    }

    for (verb, uri) in [
        (Verb::Put, "/type/multiple"),
        (Verb::Delete, "/type/multiple"),
        (Verb::Put, "/type/single"),
    ] {
        let (ctx, route) = request(&mut Typed, verb, uri);
        assert_eq!(route.unwrap(), Route::Missing);
        assert_eq!(ctx.status(), 404);
        assert_eq!(ctx.body(), not_found(uri));
    }
}

#[derive(Default)]
struct PostOnly;

#[page_routes]
impl PostOnly {
    #[request_before("*")]
    #[request_type(POST)]
    fn audit(&self, out: TextOut) {
        out.write("audit;");
    }

    #[request_path("json")]
    fn json(&self) -> Value {
        json!("hello")
    }

    #[request_path("sub/*")]
    #[request_type(POST)]
    fn sub(&self) -> Option<Leaf> {
        Some(Leaf)
    }
}

impl Page for PostOnly {}

#[test]
fn test_request_types_only_gate_simple_paths() {
    let (ctx, route) = request(&mut PostOnly, Verb::Get, "/json");
    assert_eq!(route.unwrap(), Route::Path { pattern: "json".into() });
    assert_eq!(ctx.body(), "audit;hello");

    let (ctx, route) = request(&mut PostOnly, Verb::Get, "/sub/leaf");
    let route = route.unwrap();
    assert_eq!(route.depth(), 1);
    assert_eq!(route.terminal(), &Route::Path { pattern: "leaf".into() });
    assert_eq!(ctx.body(), "audit;inner_before leaf inner_after ");
}

// =============================================================================
// Interceptors
// =============================================================================

#[derive(Default)]
struct Intercepted;

#[page_routes]
impl Intercepted {
    #[request_before("map/*")]
    fn before(&self) -> Map<String, Value> {
        entries(&[("Before", "value")])
    }

    #[request_before("map/hello")]
    fn before2(&self) -> Map<String, Value> {
        entries(&[("Before2", "value")])
    }

    #[request_path("map/hello")]
    fn hello(&self) -> Map<String, Value> {
        entries(&[("Execution", "map")])
    }

    #[request_after("map/*")]
    fn after(&self) -> Map<String, Value> {
        entries(&[("After", "value")])
    }

    #[request_after("map/hello")]
    fn after2(&self) -> Map<String, Value> {
        entries(&[("After2", "value")])
    }

    #[request_before("sb/*")]
    fn sb_before(&self) -> TextBuffer {
        buffer("sb_before ")
    }

    #[request_before("sb/new")]
    fn sb_new_before(&self) -> TextBuffer {
        buffer("sb_new_before ")
    }

    #[request_path("sb/new")]
    fn execution_sb(&self) -> TextBuffer {
        buffer("execution_sb ")
    }

    #[request_after("sb/*")]
    fn sb_after(&self) -> TextBuffer {
        buffer("sb_after ")
    }

    #[request_after("sb/new")]
    fn sb_new_after(&self) -> TextBuffer {
        buffer("sb_new_after ")
    }
}

impl Page for Intercepted {}

fn buffer(text: &str) -> TextBuffer {
    let buffer = TextBuffer::new();
    buffer.append(text);
    buffer
}

#[test]
fn test_every_matching_interceptor_runs() {
    let (ctx, _) = request(&mut Intercepted, Verb::Get, "/map/hello");
    assert_eq!(
        Value::Object(ctx.response().snapshot()),
        json!({
            "Before": "value",
            "Before2": "value",
            "Execution": "map",
            "After": "value",
            "After2": "value",
        })
    );
}

#[test]
fn test_interceptors_run_in_ranked_order() {
    let (ctx, _) = request(&mut Intercepted, Verb::Get, "/sb/new");
    assert_eq!(
        ctx.body(),
        "sb_new_before sb_before execution_sb sb_new_after sb_after "
    );
}

// =============================================================================
// Reroutes
// =============================================================================

#[derive(Default)]
struct SecondLayer;

#[page_routes]
impl SecondLayer {
    #[api_path("/param")]
    fn param(&self, params: Params) -> Map<String, Value> {
        let mut map = Map::new();
        for key in ["nameParam", "getParam", "postParam"] {
            map.insert(key.to_owned(), params.get(key).unwrap_or(Value::Null));
        }
        map
    }
}

impl Page for SecondLayer {}

#[derive(Default)]
struct FirstLayer;

#[page_routes]
impl FirstLayer {
    #[request_path("/nested/*")]
    const SECOND: Reroute<SecondLayer> = Reroute::new();
}

impl Page for FirstLayer {}

#[derive(Default)]
struct LandingPage;

#[page_routes]
impl LandingPage {
    #[request_path("/pass/:nameParam/internal/*")]
    const FIRST: Reroute<FirstLayer> = Reroute::new();
}

impl Page for LandingPage {}

#[test]
fn test_captures_reach_nested_layers() {
    let mut ctx = RequestContext::new(Verb::Get, "/pass/testing/internal/nested/param")
        .with_params(entries(&[("getParam", "answer")]));
    let route = Dispatcher::new().handle(&mut LandingPage, &mut ctx).unwrap();

    assert_eq!(route.depth(), 2);
    assert_eq!(route.terminal(), &Route::Api { pattern: "/param".into() });
    assert_eq!(ctx.response().get("nameParam"), Some(json!("testing")));
    assert_eq!(ctx.response().get("getParam"), Some(json!("answer")));
    assert_eq!(ctx.response().get("postParam"), Some(Value::Null));
}

#[test]
fn test_unserved_sub_path_is_missing() {
    let (ctx, route) = request(&mut LandingPage, Verb::Get, "/pass/testing/internal/nested/other");
    assert_eq!(route.unwrap(), Route::Missing);
    assert_eq!(ctx.status(), 404);
}

#[derive(Default)]
struct Leaf;

#[page_routes]
impl Leaf {
    #[request_before("*")]
    fn before(&self, out: TextOut) {
        out.write("inner_before ");
    }

    #[request_path("leaf")]
    fn leaf(&self, out: TextOut) {
        out.write("leaf ");
    }

    #[request_after("*")]
    fn after(&self, out: TextOut) {
        out.write("inner_after ");
    }
}

impl Page for Leaf {}

#[derive(Default)]
struct Branch {
    visits: usize,
}

#[page_routes]
impl Branch {
    #[request_before("*")]
    fn before(&mut self, out: TextOut) {
        self.visits += 1;
        out.write("outer_before ");
    }

    #[request_path("dynamic/*")]
    fn dynamic(&self) -> Option<Leaf> {
        Some(Leaf)
    }

    #[request_path("static/*")]
    const STATIC: Reroute<Leaf> = Reroute::new();

    #[request_after("*")]
    fn after(&self, out: TextOut) {
        out.write("outer_after");
    }
}

impl Page for Branch {}

#[test]
fn test_interceptors_wrap_each_reroute_layer() {
    for uri in ["/dynamic/leaf", "/static/leaf"] {
        let mut page = Branch::default();
        let (ctx, route) = request(&mut page, Verb::Get, uri);
        assert_eq!(route.unwrap().depth(), 1);
        assert_eq!(
            ctx.body(),
            "outer_before inner_before leaf inner_after outer_after",
            "{uri}"
        );
        assert_eq!(page.visits, 1);
    }
}

// =============================================================================
// Halt
// =============================================================================

#[derive(Default)]
struct GuardedLayer;

#[page_routes]
impl GuardedLayer {
    #[request_before("/info/*")]
    fn halt(&self) -> Result<(), Halt> {
        Err(Halt::with_message("SECOND LAYER HALT"))
    }

    #[request_path("/info/*")]
    const SECOND: Reroute<SecondLayer> = Reroute::new();
}

impl Page for GuardedLayer {}

#[derive(Default)]
struct GuardedLanding;

#[page_routes]
impl GuardedLanding {
    #[request_before("/account/*")]
    fn halt_everything(&self) -> Result<(), Halt> {
        Err(Halt::with_message("FIRST LAYER HALT"))
    }

    #[request_path("/account/verify/:accountID/*")]
    const ACCOUNT: Reroute<GuardedLayer> = Reroute::new();

    #[request_path("/project/*")]
    const PROJECT: Reroute<GuardedLayer> = Reroute::new();

    #[request_after("*")]
    fn after(&self, out: TextOut) {
        out.write("after");
    }
}

impl Page for GuardedLanding {}

fn halt_message(result: DispatchResult<Route>) -> String {
    match result {
        Err(DispatchError::Halt(halt)) => halt.message().unwrap_or_default().to_owned(),
        other => panic!("expected a halt, got {other:?}"),
    }
}

#[test]
fn test_halt_in_first_layer() {
    let (ctx, route) = request(&mut GuardedLanding, Verb::Get, "/account/verify/RANDOMID/info/param");
    assert_eq!(halt_message(route), "FIRST LAYER HALT");
    assert!(ctx.response().is_empty());
    assert_eq!(ctx.body(), "");
}

#[test]
fn test_halt_in_second_layer() {
    let (ctx, route) = request(&mut GuardedLanding, Verb::Get, "/project/info/param");
    assert_eq!(halt_message(route), "SECOND LAYER HALT");
    assert!(ctx.response().is_empty());
    assert_eq!(ctx.body(), "");
}

// =============================================================================
// Errors and outcomes
// =============================================================================

struct Servlet;

#[derive(Default)]
struct Failing;

#[page_routes]
impl Failing {
    #[api_path("io")]
    fn io(&self) -> io::Result<Map<String, Value>> {
        Err(io::Error::other("disk on fire"))
    }

    #[api_path("denied")]
    fn denied(&self) -> Result<(), ApiError> {
        Err(ApiError::new("no access").with_status(403).with_code("FORBIDDEN"))
    }

    #[request_path("page")]
    fn page(&self) -> io::Result<String> {
        Err(io::Error::other("page failed"))
    }

    #[api_path("raw")]
    fn raw(&self, _raw: RawRequest<Servlet>, response: ApiResponse) {
        response.insert("ran", true);
    }

    #[request_path("missing-file")]
    fn missing_file(&self) -> PathBuf {
        PathBuf::from("/definitely/not/here.txt")
    }

    #[request_path("manifest")]
    fn manifest(&self) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml")
    }
}

impl Page for Failing {}

#[test]
fn test_api_failures_become_api_errors() {
    let (_, route) = request(&mut Failing, Verb::Get, "/io");
    let Err(DispatchError::Api(error)) = route else {
        panic!("expected an api error");
    };
    assert_eq!(error.code(), ApiError::INTERNAL);
    assert_eq!(error.message(), "disk on fire");

    let (_, route) = request(&mut Failing, Verb::Get, "/denied");
    let Err(DispatchError::Api(error)) = route else {
        panic!("expected an api error");
    };
    assert_eq!(error.status(), 403);
    assert_eq!(error.code(), "FORBIDDEN");
}

#[test]
fn test_path_failures_stay_failures() {
    let (_, route) = request(&mut Failing, Verb::Get, "/page");
    assert!(matches!(route, Err(DispatchError::Failed(_))));
}

#[test]
fn test_unbound_parameter_is_recoverable() {
    let (ctx, route) = request(&mut Failing, Verb::Get, "/raw");
    assert_eq!(route.unwrap(), Route::Api { pattern: "raw".into() });
    assert_eq!(ctx.response().get("ran"), None);
    assert_eq!(
        ctx.response().get("error").unwrap()["code"],
        ApiError::UNSUPPORTED_PARAMETER
    );

    let mut ctx = RequestContext::new(Verb::Get, "/raw").with_raw(Servlet);
    Dispatcher::new().handle(&mut Failing, &mut ctx).unwrap();
    assert_eq!(ctx.response().get("ran"), Some(json!(true)));
}

#[test]
fn test_file_outcomes() {
    let (ctx, _) = request(&mut Failing, Verb::Get, "/missing-file");
    assert_eq!(ctx.status(), 404);
    assert!(ctx.files().is_empty());

    let (ctx, _) = request(&mut Failing, Verb::Get, "/manifest");
    assert_eq!(ctx.status(), 200);
    assert_eq!(ctx.files().len(), 1);
}

#[derive(Default)]
struct Misconfigured;

#[page_routes]
impl Misconfigured {
    #[request_path("child")]
    fn child(&self) -> Option<Leaf> {
        Some(Leaf)
    }
}

impl Page for Misconfigured {}

#[test]
fn test_reroute_without_wildcard_is_rejected() {
    let (_, route) = request(&mut Misconfigured, Verb::Get, "/child");
    assert!(matches!(
        route,
        Err(DispatchError::Registration(RegistrationError::RerouteWithoutWildcard { .. }))
    ));
}

// =============================================================================
// Declaring-type guard
// =============================================================================

#[test]
fn test_foreign_registration_is_skipped_visibly() {
    let foreign = registration::<HelloWorld>().unwrap();
    let mut ctx = RequestContext::new(Verb::Get, "/hello");
    let segments = ctx.segments().to_vec();

    let route = Dispatcher::new()
        .handle_request_with(&foreign, &mut Typed, &mut ctx, &segments)
        .unwrap();

    assert_eq!(route, Route::Path { pattern: "hello".into() });
    assert_eq!(ctx.body(), "");
    assert_eq!(ctx.skipped().len(), 1);
    assert_eq!(ctx.skipped()[0].operation, "hello");
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
struct Accounts;

#[page_routes]
impl Accounts {
    #[api_path("login")]
    #[request_type(POST)]
    #[required_variables("user", "password")]
    #[optional_variables("remember")]
    fn login(&self, _params: Params) {}
}

impl Page for Accounts {}

#[derive(Default)]
struct Portal;

#[page_routes]
impl Portal {
    #[api_path("status")]
    fn status(&self) {}

    #[request_path("account/*")]
    const ACCOUNTS: Reroute<Accounts> = Reroute::new();
}

impl Page for Portal {}

#[test]
fn test_catalog_lists_nested_api() {
    let catalog = registration::<Portal>()
        .unwrap()
        .catalog(&CatalogSettings::default())
        .unwrap();

    let login = catalog.get("account/login").unwrap();
    assert_eq!(login.methods, [Verb::Post]);
    assert_eq!(login.required, ["user", "password"]);
    assert_eq!(login.optional, ["remember"]);
    assert_eq!(catalog.get("status").unwrap().methods, [Verb::Get, Verb::Post]);
    assert_eq!(catalog.len(), 2);
}
