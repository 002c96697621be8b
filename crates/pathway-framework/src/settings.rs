//! Dispatch and catalog settings.
//!
//! These are plain serde structs so the runtime can embed them in its
//! configuration file under `[dispatch]` and `[catalog]`.

use serde::{Deserialize, Serialize};

use pathway_core::Verb;

/// Default limit for nested reroutes.
pub const DEFAULT_MAX_REROUTE_DEPTH: usize = 32;

/// Settings that affect how a request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Maximum number of reroute layers a single request may traverse.
    #[serde(default = "default_max_reroute_depth")]
    pub max_reroute_depth: usize,

    /// Include the error source chain in the `stack` entry of API error maps.
    #[serde(default = "default_true")]
    pub expose_error_trace: bool,

    /// Write the HTML not-found notice when no route matches.
    #[serde(default = "default_true")]
    pub not_found_notice: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_reroute_depth: default_max_reroute_depth(),
            expose_error_trace: true,
            not_found_notice: true,
        }
    }
}

/// Settings for the API catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Methods listed for API operations that declare no verb restriction.
    #[serde(default = "default_methods")]
    pub default_methods: Vec<Verb>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            default_methods: default_methods(),
        }
    }
}

fn default_max_reroute_depth() -> usize {
    DEFAULT_MAX_REROUTE_DEPTH
}

fn default_true() -> bool {
    true
}

fn default_methods() -> Vec<Verb> {
    vec![Verb::Get, Verb::Post]
}
