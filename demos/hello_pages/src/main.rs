//! Hello Pages Example
//!
//! A small page tree served through [`PageServer`]:
//!
//! ```text
//! Home
//! ├── hello/:name            path
//! ├── status                 api
//! ├── users/*      ──▶ Users (field reroute)
//! │   ├── list               api
//! │   └── :id/*    ──▶ Profile (method reroute, built per user)
//! │       └── card           path
//! └── admin/*      ──▶ Admin (field reroute, halted without a token)
//!     └── stats              api
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package hello-pages -- /hello/world /users/list /users/2/card
//! cargo run --package hello-pages -- -X POST /admin/stats -p token=letmein
//! cargo run --package hello-pages -- --catalog
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pathway::prelude::*;
use pathway::runtime::logging;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

const USERS: [(&str, &str); 3] = [("1", "ada"), ("2", "grace"), ("3", "linus")];

// ============================================================================
// Pages
// ============================================================================

#[derive(Default)]
struct Home;

#[page_routes(crate = pathway::framework)]
impl Home {
    #[request_before("*")]
    fn log(&self, params: Params) {
        info!(params = params.len(), "Incoming request");
    }

    #[request_path("hello/:name")]
    #[request_type(GET)]
    fn hello(&self, params: Params) -> String {
        format!("Hello, {}!", params.get_str("name").unwrap_or_default())
    }

    #[api_path("status")]
    fn status(&self) -> Value {
        json!({ "ok": true, "users": USERS.len() })
    }

    #[request_path("users/*")]
    const USER_PAGES: Reroute<Users> = Reroute::new();

    #[request_path("admin/*")]
    const ADMIN: Reroute<Admin> = Reroute::new();
}

impl Page for Home {}

#[derive(Default)]
struct Users;

#[page_routes(crate = pathway::framework)]
impl Users {
    #[api_path("list")]
    #[request_type(GET)]
    fn list(&self, response: ApiResponse) {
        let names: Vec<_> = USERS.iter().map(|(_, name)| *name).collect();
        response.insert("users", names);
    }

    #[request_path(":id/*")]
    fn profile(&self, params: Params) -> Option<Profile> {
        let id = params.get_str("id")?;
        USERS
            .iter()
            .find(|(user_id, _)| *user_id == id)
            .map(|&(_, name)| Profile { name })
    }
}

impl Page for Users {}

#[derive(Default)]
struct Profile {
    name: &'static str,
}

#[page_routes(crate = pathway::framework)]
impl Profile {
    #[request_path("card")]
    fn card(&self, out: TextOut) {
        out.write(&format!("<div class=\"card\">{}</div>", self.name));
    }
}

impl Page for Profile {}

#[derive(Default)]
struct Admin;

#[page_routes(crate = pathway::framework)]
impl Admin {
    #[request_before("*")]
    fn guard(&self, params: Params) -> Result<(), Halt> {
        match params.get_str("token").as_deref() {
            Some("letmein") => Ok(()),
            _ => Err(Halt::with_message("admin token required")),
        }
    }

    #[api_path("stats")]
    #[request_type(POST)]
    #[required_variables("token")]
    fn stats(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("pages".into(), 4.into());
        map
    }
}

impl Page for Admin {}

// ============================================================================
// Command line
// ============================================================================

#[derive(Parser, Debug)]
#[command(about = "Serve requests on the hello pages tree")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request verb
    #[arg(short = 'X', long, default_value = "GET")]
    method: Verb,

    /// Request parameter as key=value, repeatable
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Print the API catalog instead of serving requests
    #[arg(long)]
    catalog: bool,

    /// Request URIs
    #[arg(default_values = ["/hello/world", "/status"])]
    uris: Vec<String>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let config = loader.load().context("loading configuration")?;
    logging::init_from_config(&config.logging)?;

    let server = PageServer::from_config(&config);
    server.register::<Home>()?;

    if args.catalog {
        let catalog = server.catalog::<Home>()?;
        println!("{}", serde_json::to_string_pretty(&catalog.to_json()?)?);
        return Ok(());
    }

    for uri in &args.uris {
        let request = args
            .params
            .iter()
            .fold(Request::new(args.method, uri.as_str()), |request, (key, value)| {
                request.param(key.as_str(), value.as_str())
            });

        let response = server.handle::<Home>(request)?;
        if !response.skipped.is_empty() {
            warn!(skipped = ?response.skipped, "Some handlers were skipped");
        }

        let route = response
            .route
            .as_ref()
            .map_or_else(|| "halted".to_owned(), ToString::to_string);
        println!("{} {uri} -> {} [{route}]", args.method, response.status);
        if !response.body.is_empty() {
            println!("{}", response.body);
        }
        if let Some(json) = response.json {
            println!("{}", Value::Object(json));
        }
    }

    Ok(())
}
