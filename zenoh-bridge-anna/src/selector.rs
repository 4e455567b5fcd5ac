//! Path selectors over [`Element`] trees.
//!
//! A selector is an absolute path of element steps with optional filters,
//! ending in either the element text or an attribute:
//!
//! ```text
//! /appliances/appliance[name='Anna']/@id
//! /appliances/appliance[name='Anna']/logs/point_log[type='temperature']/period/measurement[1]/text()
//! /root/item[@kind='x'][2]
//! ```
//!
//! - `name[child='value']` keeps elements whose direct child has that text
//! - `name[@attr='value']` keeps elements whose attribute has that value
//! - `name[n]` keeps the n-th (1-based) remaining candidate under each parent
//! - `*` matches any element name
//! - a trailing `@attr` selects an attribute, `text()` (or `child::text()`)
//!   the element text, which is also the default
//!
//! Evaluation yields the first match, and nothing when the match is missing
//! or empty.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::document::Element;

/// Errors while parsing a selector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,

    #[error("selector '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("selector '{0}' has unbalanced brackets or quotes")]
    Unbalanced(String),

    #[error("selector '{selector}' has an empty step at position {position}")]
    EmptyStep { selector: String, position: usize },

    #[error("selector '{selector}': invalid filter '[{filter}]'")]
    InvalidFilter { selector: String, filter: String },

    #[error("selector '{selector}': '{step}' must be the last step")]
    TargetNotLast { selector: String, step: String },

    #[error("selector '{0}' selects no element")]
    NoElement(String),
}

/// What a selector reads from the matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(expected) => expected == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Position(usize),
    ChildText { child: String, value: String },
    Attribute { name: String, value: String },
}

impl Filter {
    fn keeps(&self, element: &Element) -> bool {
        match self {
            Filter::Position(_) => true,
            Filter::ChildText { child, value } => {
                element.children_named(child).any(|c| &c.text == value)
            }
            Filter::Attribute { name, value } => element.attribute(name) == Some(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: NameTest,
    filters: Vec<Filter>,
}

impl Step {
    fn apply<'a>(&self, mut candidates: Vec<&'a Element>) -> Vec<&'a Element> {
        candidates.retain(|element| self.name.matches(&element.name));
        for filter in &self.filters {
            candidates = match filter {
                Filter::Position(n) => candidates.get(n - 1).copied().into_iter().collect(),
                other => candidates.into_iter().filter(|e| other.keeps(e)).collect(),
            };
        }
        candidates
    }
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    steps: Vec<Step>,
    target: Target,
}

impl Selector {
    /// Parse a selector.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        source.parse()
    }

    /// The selector as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// What the selector reads from its match.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// All elements matched by the path part, in document order.
    pub fn matches<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Vec::new();
        };

        let mut current = first.apply(vec![root]);
        for step in rest {
            current = current
                .into_iter()
                .flat_map(|parent| step.apply(parent.children.iter().collect()))
                .collect();
        }
        current
    }

    /// First non-empty scalar value, or `None`.
    pub fn select(&self, root: &Element) -> Option<String> {
        let matches = self.matches(root);
        let value = match &self.target {
            Target::Text => matches.first().map(|element| element.text.as_str()),
            Target::Attribute(name) => matches.iter().find_map(|element| element.attribute(name)),
        }?;

        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let path = trimmed
            .strip_prefix('/')
            .ok_or_else(|| SelectorError::NotAbsolute(trimmed.to_string()))?;

        let raw_steps = split_steps(path)
            .ok_or_else(|| SelectorError::Unbalanced(trimmed.to_string()))?;

        let mut steps = Vec::new();
        let mut target = Target::Text;
        let last = raw_steps.len() - 1;

        for (position, raw) in raw_steps.iter().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(SelectorError::EmptyStep {
                    selector: trimmed.to_string(),
                    position: position + 1,
                });
            }

            let explicit_target = if let Some(name) = raw.strip_prefix('@') {
                Some(Target::Attribute(name.to_string()))
            } else if raw == "text()" || raw == "child::text()" {
                Some(Target::Text)
            } else {
                None
            };

            match explicit_target {
                Some(_) if position != last => {
                    return Err(SelectorError::TargetNotLast {
                        selector: trimmed.to_string(),
                        step: raw.to_string(),
                    });
                }
                Some(explicit) => target = explicit,
                None => steps.push(parse_step(trimmed, raw)?),
            }
        }

        if steps.is_empty() {
            return Err(SelectorError::NoElement(trimmed.to_string()));
        }

        Ok(Self {
            source: trimmed.to_string(),
            steps,
            target,
        })
    }
}

/// Split on `/` outside of brackets and quotes.
fn split_steps(path: &str) -> Option<Vec<&str>> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, '/') if depth == 0 => {
                steps.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return None;
    }
    steps.push(&path[start..]);
    Some(steps)
}

fn parse_step(selector: &str, raw: &str) -> Result<Step, SelectorError> {
    let (name, mut rest) = match raw.find('[') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };

    let name = name.trim();
    let name = match name {
        "" => {
            return Err(SelectorError::InvalidFilter {
                selector: selector.to_string(),
                filter: rest.to_string(),
            });
        }
        "*" => NameTest::Any,
        other => NameTest::Named(other.to_string()),
    };

    let mut filters = Vec::new();
    while !rest.is_empty() {
        let invalid = || SelectorError::InvalidFilter {
            selector: selector.to_string(),
            filter: rest.to_string(),
        };
        let body_start = rest.strip_prefix('[').ok_or_else(invalid)?;
        let end = closing_bracket(body_start).ok_or_else(invalid)?;
        let body = body_start[..end].trim();
        filters.push(parse_filter(body).ok_or_else(|| SelectorError::InvalidFilter {
            selector: selector.to_string(),
            filter: body.to_string(),
        })?);
        rest = body_start[end + 1..].trim_start();
    }

    Ok(Step { name, filters })
}

fn closing_bracket(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_filter(body: &str) -> Option<Filter> {
    if let Ok(position) = body.parse::<usize>() {
        return (position > 0).then_some(Filter::Position(position));
    }

    let (left, right) = body.split_once('=')?;
    let value = unquote(right.trim())?.to_string();

    match left.trim() {
        "" => None,
        left => match left.strip_prefix('@') {
            Some("") => None,
            Some(name) => Some(Filter::Attribute {
                name: name.to_string(),
                value,
            }),
            None => Some(Filter::ChildText {
                child: left.to_string(),
                value,
            }),
        },
    }
}

fn unquote(literal: &str) -> Option<&str> {
    let quote = literal.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = literal.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}
