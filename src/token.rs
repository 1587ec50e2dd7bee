//! Token definitions
//!
//! A [`Token`] is one markup rule. It owns one or two regex fragments that become named
//! alternatives of the parser's compound pattern:
//!
//!     single   (?P<{name}_start>PATTERN)
//!     paired   (?P<{name}_start>(?:START)(?=.+?(?:END)))   and   (?P<{name}_end>END)
//!
//! The lookahead on a paired start means an opening delimiter without a later closing
//! one is never markup at all; it stays literal text. Named groups inside the fragments
//! are prefixed with the token name so that many tokens can share one regex.

use crate::error::{GrammarError, GrammarResult};
use crate::markdown::TagTable;
use crate::match_group::MatchGroup;
use crate::pattern::{defined_groups, is_identifier, named_group, prefix_groups, rename_groups};
use crate::value::{Params, Value};
use fancy_regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};

/// Declared attributes of a token or tag, possibly deferred until a match is known.
pub type Attributes = BTreeMap<String, ParamValue>;

/// Which alternative of a token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// Opening delimiter of a paired token
    Start,
    /// Closing delimiter of a paired token
    End,
    /// Whole match of a single token
    Single,
}

/// An attribute (or text) value as declared on a token.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// Fixed value, copied as is
    Literal(Value),
    /// Value read from a capture group of the match
    Deferred(MatchGroup),
}

impl ParamValue {
    /// Resolve against the match of `token`.
    pub fn resolve(&self, token: &Token, captures: &Captures<'_>) -> Value {
        match self {
            ParamValue::Literal(value) => value.clone(),
            ParamValue::Deferred(group) => Value::Str(group.get_value(token, captures)),
        }
    }

    /// Returns the literal value, if this value does not depend on a match.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ParamValue::Literal(value) => Some(value),
            ParamValue::Deferred(_) => None,
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Literal(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Literal(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Literal(value.into())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Literal(value.into())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Literal(value.into())
    }
}

impl From<MatchGroup> for ParamValue {
    fn from(group: MatchGroup) -> Self {
        ParamValue::Deferred(group)
    }
}

/// Definition of a markup rule matched by the parser.
#[derive(Debug, Clone)]
pub struct Token {
    name: String,
    group_start: String,
    group_end: Option<String>,
    pattern_start: String,
    pattern_end: Option<String>,
    skip: bool,
    text: Option<ParamValue>,
    params: Attributes,
    pub(crate) tags: Option<TagTable>,
}

impl Token {
    /// Create a token. Without `pattern_end` the token is single (self-closing).
    pub fn new(name: &str, pattern_start: &str, pattern_end: Option<&str>) -> GrammarResult<Self> {
        if !is_identifier(name) {
            return Err(GrammarError::InvalidTokenName {
                name: name.to_string(),
            });
        }

        let group_start = format!("{}_start", name);
        let (group_end, pattern_start, pattern_end) = match pattern_end {
            None => (
                None,
                named_group(&group_start, &prefix_groups(pattern_start, name)),
                None,
            ),
            Some("") => {
                return Err(GrammarError::MissingEnd {
                    name: name.to_string(),
                })
            }
            Some(end) => {
                let group_end = format!("{}_end", name);
                let required = format!(
                    "(?:{})(?=.+?(?:{}))",
                    prefix_groups(pattern_start, name),
                    lookahead_copy(end, name),
                );
                (
                    Some(group_end.clone()),
                    named_group(&group_start, &required),
                    Some(named_group(&group_end, &prefix_groups(end, name))),
                )
            }
        };

        let token = Self {
            name: name.to_string(),
            group_start,
            group_end,
            pattern_start,
            pattern_end,
            skip: false,
            text: None,
            params: Attributes::new(),
            tags: None,
        };
        token.check_groups()?;
        token.check_patterns()?;
        Ok(token)
    }

    /// Create a single token matched by one pattern.
    pub fn single(name: &str, pattern: &str) -> GrammarResult<Self> {
        Self::new(name, pattern, None)
    }

    /// Create a paired token with opening and closing patterns.
    pub fn paired(name: &str, pattern_start: &str, pattern_end: &str) -> GrammarResult<Self> {
        Self::new(name, pattern_start, Some(pattern_end))
    }

    /// Mark the token as a skip token: its content is not interpreted.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Attach an attribute to every segment produced under this token.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replace the text of a single token's segment (the whole match by default).
    pub fn with_text(mut self, text: impl Into<ParamValue>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_start(&self) -> &str {
        &self.group_start
    }

    pub fn group_end(&self) -> Option<&str> {
        self.group_end.as_deref()
    }

    /// Rewritten start pattern, enclosed in its named group.
    pub fn pattern_start(&self) -> &str {
        &self.pattern_start
    }

    /// Rewritten end pattern, enclosed in its named group.
    pub fn pattern_end(&self) -> Option<&str> {
        self.pattern_end.as_deref()
    }

    pub fn is_single(&self) -> bool {
        self.group_end.is_none()
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn params(&self) -> &Attributes {
        &self.params
    }

    pub fn text(&self) -> Option<&ParamValue> {
        self.text.as_ref()
    }

    /// All capture-group names this token contributes to the compound pattern.
    pub(crate) fn derived_groups(&self) -> Vec<String> {
        let mut groups = defined_groups(&self.pattern_start);
        if let Some(end) = &self.pattern_end {
            groups.extend(defined_groups(end));
        }
        groups
    }

    /// Resolve `attributes` against a match of this token.
    pub(crate) fn resolve(&self, attributes: &Attributes, captures: &Captures<'_>) -> Params {
        attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.resolve(self, captures)))
            .collect()
    }

    fn check_groups(&self) -> GrammarResult<()> {
        let mut seen = HashSet::new();
        for group in self.derived_groups() {
            if !seen.insert(group.clone()) {
                return Err(GrammarError::GroupCollision { group });
            }
        }
        Ok(())
    }

    fn check_patterns(&self) -> GrammarResult<()> {
        let patterns = std::iter::once(&self.pattern_start).chain(self.pattern_end.as_ref());
        for pattern in patterns {
            Regex::new(pattern).map_err(|e| GrammarError::InvalidPattern {
                token: self.name.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Copy of an end pattern for the start's lookahead.
///
/// Groups defined by the end pattern get their own `{name}_ahead_` prefix so they do not
/// collide with the real end alternative; references to anything else point at the
/// token's regular groups.
fn lookahead_copy(end: &str, name: &str) -> String {
    let own: HashSet<String> = defined_groups(end).into_iter().collect();
    rename_groups(end, |group| {
        if own.contains(group) {
            format!("{}_ahead_{}", name, group)
        } else {
            format!("{}_{}", name, group)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_token_pattern() {
        let token = Token::single("br", r"\n|\r\n").unwrap();
        assert!(token.is_single());
        assert_eq!(token.pattern_start(), r"(?P<br_start>\n|\r\n)");
        assert_eq!(token.group_end(), None);
        assert_eq!(token.pattern_end(), None);
    }

    #[test]
    fn test_paired_token_requires_end() {
        let token = Token::paired("b", r"\*\*", r"\*\*").unwrap();
        assert!(!token.is_single());
        assert_eq!(token.group_start(), "b_start");
        assert_eq!(token.group_end(), Some("b_end"));
        assert_eq!(token.pattern_start(), r"(?P<b_start>(?:\*\*)(?=.+?(?:\*\*)))");
        assert_eq!(token.pattern_end(), Some(r"(?P<b_end>\*\*)"));
    }

    #[test]
    fn test_inner_groups_prefixed() {
        let token = Token::single("link", r"\[(?P<text>.+?)\]").unwrap();
        assert_eq!(token.pattern_start(), r"(?P<link_start>\[(?P<link_text>.+?)\])");
        assert_eq!(
            token.derived_groups(),
            vec!["link_start".to_string(), "link_text".to_string()]
        );
    }

    #[test]
    fn test_end_groups_in_lookahead_do_not_collide() {
        let token = Token::paired("tag", r"<(?P<open>\w+)>", r"</(?P<close>\w+)>").unwrap();
        let groups = token.derived_groups();
        assert!(groups.contains(&"tag_open".to_string()));
        assert!(groups.contains(&"tag_ahead_close".to_string()));
        assert!(groups.contains(&"tag_close".to_string()));
    }

    #[test]
    fn test_same_group_in_start_and_end_collides() {
        let err = Token::paired("t", r"(?P<x>a)", r"(?P<x>b)").unwrap_err();
        assert!(matches!(err, GrammarError::GroupCollision { .. }));
    }

    #[test]
    fn test_invalid_name() {
        let err = Token::single("bold-italic", "x").unwrap_err();
        assert_eq!(
            err,
            GrammarError::InvalidTokenName {
                name: "bold-italic".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Token::single("broken", "(unclosed").unwrap_err();
        assert!(matches!(err, GrammarError::InvalidPattern { ref token, .. } if token == "broken"));
    }

    #[test]
    fn test_empty_end_pattern() {
        let err = Token::new("t", "a", Some("")).unwrap_err();
        assert!(matches!(err, GrammarError::MissingEnd { .. }));
    }

    #[test]
    fn test_builder_attributes() {
        let token = Token::paired("code", "`", "`")
            .unwrap()
            .with_skip(true)
            .with_param("is_code", true)
            .with_param("lang", "rust");
        assert!(token.skip());
        assert_eq!(token.params().len(), 2);
        assert_eq!(
            token.params()["is_code"].as_literal(),
            Some(&Value::Bool(true))
        );
    }
}
