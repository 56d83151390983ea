//! Component paths
//!
//! Grammar:
//!
//! ```text
//! path    := "" | segment ("/" segment)*
//! segment := name ("[" filter "]")?
//! filter  := key "=" value | digits | value
//! ```
//!
//! `key=value` matches an attribute, digits select the N-th sibling of that
//! kind, and a bare value matches the sibling's `id` or `name`. A segment
//! without a filter selects the first sibling of that kind.

use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, opt, peek};
use nom::multi::separated_list1;
use nom::sequence::{delimited, separated_pair, terminated};
use nom::{IResult, Parser};
use std::fmt;

use crate::core::error::{AiError, Result};

/// Sibling selector attached to a path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentFilter {
    /// `[key=value]`
    Attribute { key: String, value: String },
    /// `[value]`, matched against `id` then `name`
    Identity(String),
    /// `[N]`, zero-based position among siblings of the same kind
    Index(usize),
}

impl fmt::Display for SegmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentFilter::Attribute { key, value } => write!(f, "[{}={}]", key, value),
            SegmentFilter::Identity(value) => write!(f, "[{}]", value),
            SegmentFilter::Index(index) => write!(f, "[{}]", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub filter: Option<SegmentFilter>,
}

impl PathSegment {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            filter: None,
        }
    }

    pub fn with_filter(name: &str, filter: SegmentFilter) -> Self {
        Self {
            name: name.to_string(),
            filter: Some(filter),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(filter) = &self.filter {
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

/// A parsed path from the behavior root down to a component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPath {
    segments: Vec<PathSegment>,
}

impl ComponentPath {
    /// The empty path, addressing the root itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        match all_consuming(segments).parse(trimmed) {
            Ok((_, segments)) => Ok(Self { segments }),
            Err(e) => Err(AiError::path(text, format!("malformed path ({})", e))),
        }
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path with one more segment appended
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ComponentPath {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self> {
        ComponentPath::parse(s)
    }
}

// ============================================================================
// Parsers
// ============================================================================

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn filter_value(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ']' && c != '[').parse(input)
}

fn filter_body(input: &str) -> IResult<&str, SegmentFilter> {
    alt((
        map(separated_pair(name, char('='), filter_value), |(key, value)| {
            SegmentFilter::Attribute {
                key: key.to_string(),
                value: value.trim().to_string(),
            }
        }),
        map_res(terminated(digit1, peek(char(']'))), |digits: &str| {
            digits.parse::<usize>().map(SegmentFilter::Index)
        }),
        map(filter_value, |value: &str| {
            SegmentFilter::Identity(value.trim().to_string())
        }),
    ))
    .parse(input)
}

fn segment(input: &str) -> IResult<&str, PathSegment> {
    map(
        (name, opt(delimited(char('['), filter_body, char(']')))),
        |(name, filter)| PathSegment {
            name: name.to_string(),
            filter,
        },
    )
    .parse(input)
}

fn segments(input: &str) -> IResult<&str, Vec<PathSegment>> {
    separated_list1(char('/'), segment).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple_kind() {
        let path = ComponentPath::parse("aspect").unwrap();
        assert_eq!(path.segments(), &[PathSegment::new("aspect")]);
    }

    #[test]
    fn test_parse_attribute_filter() {
        let path = ComponentPath::parse("aspect[id=aggression]/facet").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::with_filter(
                    "aspect",
                    SegmentFilter::Attribute {
                        key: "id".into(),
                        value: "aggression".into()
                    }
                ),
                PathSegment::new("facet"),
            ]
        );
    }

    #[test]
    fn test_parse_index_and_bare_identity() {
        let path = ComponentPath::parse("stage[main_loop]/candidate_action[2]").unwrap();
        assert_eq!(
            path.segments()[0].filter,
            Some(SegmentFilter::Identity("main_loop".into()))
        );
        assert_eq!(path.segments()[1].filter, Some(SegmentFilter::Index(2)));
    }

    #[test]
    fn test_digits_followed_by_text_are_identity() {
        let path = ComponentPath::parse("facet[2nd]").unwrap();
        assert_eq!(
            path.segments()[0].filter,
            Some(SegmentFilter::Identity("2nd".into()))
        );
    }

    #[test]
    fn test_empty_path_is_root() {
        assert!(ComponentPath::parse("").unwrap().is_root());
        assert!(ComponentPath::parse("   ").unwrap().is_root());
    }

    #[test]
    fn test_malformed_paths_are_rejected() {
        for bad in ["aspect[", "aspect[]", "/aspect", "aspect//facet", "aspect]", "as pect"] {
            assert!(
                matches!(ComponentPath::parse(bad), Err(AiError::PathResolution { .. })),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        let text = "stage[id=main]/candidate_action[0]/x[combat]";
        assert_eq!(ComponentPath::parse(text).unwrap().to_string(), text);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(text in ".{0,40}") {
            let _ = ComponentPath::parse(&text);
        }

        #[test]
        fn prop_display_reparses(
            names in proptest::collection::vec("[a-z_]{1,8}", 1..4),
            ids in proptest::collection::vec(proptest::option::of("[a-z]{1,6}"), 1..4),
        ) {
            let segments: Vec<PathSegment> = names
                .iter()
                .zip(ids.iter().cycle())
                .map(|(name, id)| match id {
                    Some(id) => PathSegment::with_filter(name, SegmentFilter::Attribute {
                        key: "id".into(),
                        value: id.clone(),
                    }),
                    None => PathSegment::new(name),
                })
                .collect();
            let path = ComponentPath::from_segments(segments);
            let reparsed = ComponentPath::parse(&path.to_string()).unwrap();
            prop_assert_eq!(reparsed, path);
        }
    }
}
