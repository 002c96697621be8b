//! Request verbs and verb filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// An HTTP request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl Verb {
    /// Every verb, in declaration order.
    pub const ALL: [Verb; 9] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::Patch,
        Verb::Head,
        Verb::Options,
        Verb::Trace,
        Verb::Connect,
    ];

    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PatternError::UnknownVerb(s.to_owned()))
    }
}

/// The set of verbs a handler accepts.
///
/// An empty set means the handler did not restrict verbs and accepts all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VerbSet(u16);

impl VerbSet {
    /// The unrestricted set.
    pub const ANY: Self = Self(0);

    /// Creates an empty (unrestricted) set.
    pub fn new() -> Self {
        Self::ANY
    }

    /// Returns the set with `verb` added.
    pub fn with(mut self, verb: Verb) -> Self {
        self.insert(verb);
        self
    }

    pub fn insert(&mut self, verb: Verb) {
        self.0 |= verb.bit();
    }

    pub fn contains(self, verb: Verb) -> bool {
        self.0 & verb.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if a request with `verb` passes this filter.
    pub fn accepts(self, verb: Verb) -> bool {
        self.is_empty() || self.contains(verb)
    }

    /// Iterates the verbs in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Verb> {
        Verb::ALL.into_iter().filter(move |verb| self.contains(*verb))
    }
}

impl FromIterator<Verb> for VerbSet {
    fn from_iter<I: IntoIterator<Item = Verb>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}

impl Extend<Verb> for VerbSet {
    fn extend<I: IntoIterator<Item = Verb>>(&mut self, iter: I) {
        for verb in iter {
            self.insert(verb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verb() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("DELETE".parse::<Verb>().unwrap(), Verb::Delete);
        assert!(matches!(
            "FETCH".parse::<Verb>(),
            Err(PatternError::UnknownVerb(v)) if v == "FETCH"
        ));
    }

    #[test]
    fn test_empty_set_accepts_everything() {
        let any = VerbSet::ANY;
        assert!(Verb::ALL.iter().all(|v| any.accepts(*v)));
    }

    #[test]
    fn test_restricted_set() {
        let set: VerbSet = [Verb::Post, Verb::Put].into_iter().collect();
        assert!(set.accepts(Verb::Post));
        assert!(!set.accepts(Verb::Get));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Verb::Post, Verb::Put]);
    }
}
