//! API catalog.
//!
//! Lists every API endpoint reachable from a page, including those of pages
//! mounted through field reroutes. Nested endpoints are listed under the
//! reroute prefix (`users/*` + `list` gives `users/list`). When the same path
//! is reachable twice, the first entry found is kept.

use std::any::TypeId;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use pathway_core::{Verb, join_path, sort_endpoint_list, split_path};

use crate::error::RegistrationError;
use crate::registration::ClassRegistration;
use crate::settings::CatalogSettings;

/// One reachable API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiEntry {
    pub path: String,
    pub methods: Vec<Verb>,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub page: &'static str,
    pub operation: &'static str,
}

/// API endpoints keyed by their full path.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ApiCatalog {
    entries: BTreeMap<String, ApiEntry>,
}

impl ApiCatalog {
    pub fn entries(&self) -> impl Iterator<Item = &ApiEntry> {
        self.entries.values()
    }

    pub fn get(&self, path: &str) -> Option<&ApiEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl ClassRegistration {
    /// Builds the API catalog of this page and every page reachable through
    /// its field reroutes.
    pub fn catalog(&self, settings: &CatalogSettings) -> Result<ApiCatalog, RegistrationError> {
        let mut catalog = ApiCatalog::default();
        let mut visiting = HashSet::new();
        self.collect_api("", settings, &mut visiting, &mut catalog)?;
        Ok(catalog)
    }

    fn collect_api(
        &self,
        prefix: &str,
        settings: &CatalogSettings,
        visiting: &mut HashSet<TypeId>,
        catalog: &mut ApiCatalog,
    ) -> Result<(), RegistrationError> {
        // A page already on the current reroute chain would list its apis again
        // under an ever longer prefix, so it is not walked a second time.
        if !visiting.insert(self.page_type) {
            return Ok(());
        }

        let mut apis: Vec<_> = self.api.iter().collect();
        sort_endpoint_list(&mut apis);
        for endpoint in apis {
            let operation = self.operation(endpoint);
            let path = prefixed(prefix, endpoint.pattern().as_str());
            let declared = endpoint.verbs();
            let methods = if declared.is_empty() {
                settings.default_methods.clone()
            } else {
                declared.iter().collect()
            };

            catalog.entries.entry(path.clone()).or_insert_with(|| ApiEntry {
                path,
                methods,
                required: operation.required(),
                optional: operation.optional(),
                page: self.page_name,
                operation: operation.name(),
            });
        }

        let mut reroutes: Vec<_> = self.field_reroute.iter().collect();
        sort_endpoint_list(&mut reroutes);
        for endpoint in reroutes {
            let Some(target) = self.field(endpoint).target() else {
                continue;
            };
            let nested = prefixed(prefix, &endpoint.pattern().consumed_prefix());
            target
                .registration()?
                .collect_api(&nested, settings, visiting, catalog)?;
        }

        visiting.remove(&self.page_type);
        Ok(())
    }
}

fn prefixed(prefix: &str, tail: &str) -> String {
    let mut segments = split_path(prefix);
    segments.extend(split_path(tail));
    segments.retain(|segment| !segment.is_empty());
    join_path(&segments)
}
