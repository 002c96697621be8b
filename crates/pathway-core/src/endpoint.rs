//! Pattern-keyed endpoint registry.
//!
//! An [`EndpointMap`] maps raw pattern text to a handler reference plus the
//! pattern's cached segment array. Lookups return every matching entry,
//! ranked most-specific first, so callers either take the head (primary
//! handlers) or walk the whole list (interceptors).
//!
//! A map is filled once and then only read. It has no interior mutability,
//! so a shared reference can be used from any number of threads.

use std::collections::HashMap;

use tracing::trace;

use crate::error::PatternResult;
use crate::pattern::Pattern;
use crate::verb::{Verb, VerbSet};

/// A registered pattern with its handler reference and accepted verbs.
#[derive(Debug, Clone)]
pub struct Endpoint<V> {
    pattern: Pattern,
    verbs: VerbSet,
    handler: V,
}

impl<V> Endpoint<V> {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn verbs(&self) -> VerbSet {
        self.verbs
    }

    pub fn handler(&self) -> &V {
        &self.handler
    }
}

/// A collection of endpoints keyed by raw pattern text.
#[derive(Debug, Clone)]
pub struct EndpointMap<V> {
    entries: HashMap<String, Endpoint<V>>,
}

impl<V> Default for EndpointMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> EndpointMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `pattern`, accepting every verb.
    ///
    /// Returns the handler previously stored under the identical pattern
    /// text, if any. The new handler replaces it.
    pub fn register_endpoint_path(&mut self, pattern: &str, handler: V) -> PatternResult<Option<V>> {
        self.register_with_verbs(pattern, VerbSet::ANY, handler)
    }

    /// Registers `handler` under `pattern` with a verb filter.
    pub fn register_with_verbs(
        &mut self,
        pattern: &str,
        verbs: VerbSet,
        handler: V,
    ) -> PatternResult<Option<V>> {
        let parsed = Pattern::parse(pattern)?;
        let previous = self.entries.insert(
            pattern.to_owned(),
            Endpoint {
                pattern: parsed,
                verbs,
                handler,
            },
        );
        Ok(previous.map(|endpoint| endpoint.handler))
    }

    /// Looks up an entry by its exact pattern text.
    pub fn get(&self, pattern: &str) -> Option<&Endpoint<V>> {
        self.entries.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint<V>> {
        self.entries.values()
    }

    /// Returns every endpoint whose pattern accepts `request`, ranked.
    ///
    /// With `verb = Some(..)`, endpoints whose verb set rejects the verb are
    /// dropped; `None` disables verb filtering.
    pub fn find_valid_keys<S: AsRef<str>>(
        &self,
        request: &[S],
        verb: Option<Verb>,
    ) -> Vec<&Endpoint<V>> {
        let mut found: Vec<&Endpoint<V>> = self
            .entries
            .values()
            .filter(|endpoint| endpoint.pattern.matches(request))
            .filter(|endpoint| verb.is_none_or(|verb| endpoint.verbs.accepts(verb)))
            .collect();
        sort_endpoint_list(&mut found);

        trace!(
            candidates = self.entries.len(),
            matched = found.len(),
            "ranked endpoint matches"
        );
        found
    }

    /// The single best-ranked match, if any.
    pub fn best_match<S: AsRef<str>>(&self, request: &[S], verb: Option<Verb>) -> Option<&Endpoint<V>> {
        self.find_valid_keys(request, verb).into_iter().next()
    }

    /// Returns true if any pattern accepts `request`, ignoring verbs.
    pub fn has_match<S: AsRef<str>>(&self, request: &[S]) -> bool {
        self.entries
            .values()
            .any(|endpoint| endpoint.pattern.matches(request))
    }
}

/// Sorts endpoints most-specific first. See [`Pattern::specificity_cmp`].
pub fn sort_endpoint_list<V>(list: &mut [&Endpoint<V>]) {
    list.sort_by(|a, b| a.pattern.specificity_cmp(&b.pattern));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::split_path;
    use proptest::prelude::*;

    fn keys<V>(found: &[&Endpoint<V>]) -> Vec<String> {
        found
            .iter()
            .map(|e| e.pattern().as_str().to_owned())
            .collect()
    }

    #[test]
    fn test_ranked_matches() {
        let mut map = EndpointMap::new();
        map.register_endpoint_path("hello/*", 1).unwrap();
        map.register_endpoint_path("hello/good/*", 2).unwrap();
        map.register_endpoint_path("hello/good/world", 3).unwrap();
        map.register_endpoint_path("bye", 4).unwrap();

        let found = map.find_valid_keys(&split_path("hello/good/world"), None);
        assert_eq!(
            keys(&found),
            ["hello/good/world", "hello/good/*", "hello/*"]
        );
        assert_eq!(*map.best_match(&split_path("hello/x"), None).unwrap().handler(), 1);
    }

    #[test]
    fn test_no_match_for_longer_request() {
        let mut map = EndpointMap::new();
        map.register_endpoint_path("hello/world", ()).unwrap();
        assert!(map.find_valid_keys(&split_path("hello/world"), None).len() == 1);
        assert!(map
            .find_valid_keys(&split_path("hello/world/again"), None)
            .is_empty());
    }

    #[test]
    fn test_reregister_replaces_handler() {
        let mut map = EndpointMap::new();
        assert_eq!(map.register_endpoint_path("a/:x", "first").unwrap(), None);
        assert_eq!(
            map.register_endpoint_path("a/:x", "second").unwrap(),
            Some("first")
        );
        assert_eq!(map.len(), 1);
        let found = map.find_valid_keys(&split_path("a/b"), None);
        assert_eq!(found.len(), 1);
        assert_eq!(*found[0].handler(), "second");
    }

    #[test]
    fn test_verb_filter() {
        let mut map = EndpointMap::new();
        map.register_with_verbs("submit", VerbSet::new().with(Verb::Post), "post")
            .unwrap();
        map.register_endpoint_path("open", "any").unwrap();

        let submit = split_path("submit");
        assert!(map.best_match(&submit, Some(Verb::Get)).is_none());
        assert!(map.best_match(&submit, Some(Verb::Post)).is_some());
        assert!(map.best_match(&submit, None).is_some());

        let open = split_path("open");
        assert!(Verb::ALL
            .iter()
            .all(|verb| map.best_match(&open, Some(*verb)).is_some()));
    }

    #[test]
    fn test_has_match_ignores_verbs() {
        let mut map = EndpointMap::new();
        map.register_with_verbs("x", VerbSet::new().with(Verb::Delete), ())
            .unwrap();
        assert!(map.has_match(&split_path("x")));
        assert!(!map.has_match(&split_path("y")));
    }

    proptest! {
        #[test]
        fn test_registered_pattern_is_found(
            request in prop::collection::vec("[a-d]{1,3}", 1..5),
            mask in prop::collection::vec(0u8..3, 1..5),
        ) {
            // Build a pattern from the request by replacing some segments.
            let pattern: Vec<String> = request
                .iter()
                .zip(mask.iter().chain(std::iter::repeat(&0)))
                .enumerate()
                .map(|(i, (segment, m))| match m {
                    0 => segment.clone(),
                    1 => format!(":p{i}"),
                    _ => "*".to_string(),
                })
                .collect();
            let raw = pattern.join("/");

            let mut map = EndpointMap::new();
            map.register_endpoint_path("zzz/never", 0).unwrap();
            map.register_endpoint_path(&raw, 1).unwrap();

            let found = map.find_valid_keys(&request, None);
            prop_assert!(found.iter().any(|e| e.pattern().as_str() == raw));
        }
    }
}
