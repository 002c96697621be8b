//! Route patterns and request path segmentation.
//!
//! A pattern is a `/`-separated template. Each segment is classified once,
//! when the pattern is parsed:
//!
//! | Text     | Kind                    | Matches                                  |
//! |----------|-------------------------|------------------------------------------|
//! | `hello`  | [`Segment::Literal`]    | `hello`, case-insensitively              |
//! | `:name`  | [`Segment::Capture`]    | exactly one segment, bound to `name`     |
//! | `*`      | [`Segment::Wildcard`]   | one segment, or the whole rest when last |
//!
//! Request paths are split with [`split_path`], which uses the same
//! normalization as pattern parsing so both sides line up index by index.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{PatternError, PatternResult};

/// Splits a path into normalized segments.
///
/// Leading and trailing separators are stripped, runs of separators collapse
/// into one, and both `/` and `\` act as separators. The root path (an empty
/// string, `/`, `//`, ...) becomes a single empty segment so that it can
/// still be matched by the `""` and `*` patterns.
///
/// ```
/// use pathway_core::split_path;
///
/// assert_eq!(split_path("//hello\\good//world/"), ["hello", "good", "world"]);
/// assert_eq!(split_path("/"), [""]);
/// ```
pub fn split_path(raw: &str) -> Vec<String> {
    let segments: Vec<String> = raw
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    if segments.is_empty() {
        vec![String::new()]
    } else {
        segments
    }
}

/// Joins segments back into a normalized path without leading separator.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(segment.as_ref());
    }
    out
}

// =============================================================================
// Segment
// =============================================================================

/// One classified pattern segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Exact text, compared case-insensitively.
    Literal(String),
    /// `:name`, binds the request segment at the same index.
    Capture(String),
    /// `*`.
    Wildcard,
}

/// Specificity class of a segment. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentKind {
    Literal,
    Capture,
    Wildcard,
}

impl Segment {
    fn classify(text: &str) -> Self {
        if text == "*" {
            Self::Wildcard
        } else if let Some(name) = text.strip_prefix(':') {
            Self::Capture(name.to_owned())
        } else {
            Self::Literal(text.to_owned())
        }
    }

    /// Returns the specificity class of this segment.
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Literal(_) => SegmentKind::Literal,
            Self::Capture(_) => SegmentKind::Capture,
            Self::Wildcard => SegmentKind::Wildcard,
        }
    }

    /// Returns true if this segment accepts `request` at the same position.
    ///
    /// Captures and wildcards accept any single segment.
    pub fn accepts(&self, request: &str) -> bool {
        match self {
            Self::Literal(text) => eq_ignore_case(text, request),
            Self::Capture(_) | Self::Wildcard => true,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Capture(name) => write!(f, ":{name}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

// =============================================================================
// Pattern
// =============================================================================

/// A parsed route pattern.
///
/// The raw text is kept as given because registries are keyed by it; the
/// segment array is the normalized, classified form used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses and classifies a pattern.
    pub fn parse(raw: &str) -> PatternResult<Self> {
        let segments: Vec<Segment> = split_path(raw)
            .iter()
            .map(|text| Segment::classify(text))
            .collect();

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Capture(name) = segment {
                if name.is_empty() {
                    return Err(PatternError::EmptyCapture {
                        pattern: raw.to_owned(),
                    });
                }
                if seen.contains(&name.as_str()) {
                    return Err(PatternError::DuplicateCapture {
                        pattern: raw.to_owned(),
                        name: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The classified segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a parsed pattern has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if the last segment is `*`.
    ///
    /// Only such patterns may delegate the rest of a path to another page.
    pub fn ends_with_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// Names of all capture segments, in order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Capture(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Checks whether `request` satisfies this pattern.
    pub fn matches<S: AsRef<str>>(&self, request: &[S]) -> bool {
        is_valid_endpoint(&self.segments, request)
    }

    /// Resolves capture segments against the request segments at the same index.
    ///
    /// The caller is expected to have checked [`Pattern::matches`] first.
    pub fn captures<'r, S: AsRef<str>>(&self, request: &'r [S]) -> Vec<(&str, &'r str)> {
        self.segments
            .iter()
            .zip(request)
            .filter_map(|(segment, value)| match segment {
                Segment::Capture(name) => Some((name.as_str(), value.as_ref())),
                _ => None,
            })
            .collect()
    }

    /// The part of `request` left over for a delegate page.
    ///
    /// For `a/b/*` against `a/b/c/d` this is `c/d`: every segment before the
    /// terminal wildcard is consumed. Patterns without a terminal wildcard
    /// consume their full length.
    pub fn remainder<'r, S>(&self, request: &'r [S]) -> &'r [S] {
        let consumed = if self.ends_with_wildcard() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        };
        request.get(consumed..).unwrap_or_default()
    }

    /// The normalized prefix consumed by this pattern, without the terminal `*`.
    pub fn consumed_prefix(&self) -> String {
        let end = if self.ends_with_wildcard() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        };
        join_path(
            &self.segments[..end]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        )
    }

    /// Orders two patterns most-specific first.
    ///
    /// 1. more segments first;
    /// 2. at the first index whose segment kinds differ, literal before
    ///    capture before wildcard;
    /// 3. raw text, lexicographically.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        other
            .segments
            .len()
            .cmp(&self.segments.len())
            .then_with(|| {
                self.segments
                    .iter()
                    .zip(&other.segments)
                    .map(|(a, b)| a.kind().cmp(&b.kind()))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The per-segment matching rule.
///
/// Evaluated left to right:
///
/// 1. a pattern longer than the request never matches;
/// 2. a `*` in last pattern position matches whatever remains;
/// 3. `*` elsewhere, or a `:name` capture, matches any one segment;
/// 4. literals compare case-insensitively;
/// 5. a request longer than a pattern without terminal `*` does not match.
pub fn is_valid_endpoint<S: AsRef<str>>(pattern: &[Segment], request: &[S]) -> bool {
    if pattern.len() > request.len() {
        return false;
    }

    let last = pattern.len().saturating_sub(1);
    for (i, segment) in pattern.iter().enumerate() {
        if i == last && *segment == Segment::Wildcard {
            return true;
        }
        if !segment.accepts(request[i].as_ref()) {
            return false;
        }
    }

    request.len() == pattern.len()
}
