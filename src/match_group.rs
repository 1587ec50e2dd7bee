//! Deferred capture extraction
//!
//! Attributes are declared before any text is parsed, so a value that depends on the
//! match (a link target, the link label) is declared as a [`MatchGroup`]: the name of a
//! capture group inside the token's own pattern, plus an optional transform. It is
//! resolved once the token and the match are known.

use crate::token::Token;
use fancy_regex::Captures;
use std::fmt;
use std::sync::Arc;

/// Function applied to a captured value before it is stored.
pub type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Reference to a named capture group of the owning token's pattern.
#[derive(Clone)]
pub struct MatchGroup {
    group: String,
    transform: Option<Transform>,
}

impl MatchGroup {
    /// Refer to the capture group `group` as written in the token's pattern.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            transform: None,
        }
    }

    /// Apply `transform` to the captured text on resolution.
    pub fn with_transform(
        mut self,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Group name as written in the token's pattern (without the token prefix).
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Resolve the captured value for `token` in `captures`.
    ///
    /// A group that did not take part in the match resolves to an empty string
    /// (before the transform is applied).
    pub fn get_value(&self, token: &Token, captures: &Captures<'_>) -> String {
        let name = format!("{}_{}", token.name(), self.group);
        let raw = captures.name(&name).map(|m| m.as_str()).unwrap_or("");
        match &self.transform {
            Some(transform) => transform(raw),
            None => raw.to_string(),
        }
    }
}

impl fmt::Debug for MatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchGroup")
            .field("group", &self.group)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
