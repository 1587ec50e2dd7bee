//! Parser output

use crate::token::{Attributes, ParamValue, Token};
use crate::value::{Params, Value};
use fancy_regex::Captures;
use serde::Serialize;

/// One fragment of parsed text with the attributes active over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub params: Params,
}

impl Segment {
    /// Create a segment from already resolved parts.
    pub fn new(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Create a segment for a match of `token`, resolving deferred text and attributes.
    ///
    /// `inherited` are the attributes of the enclosing open tokens; `attributes` are
    /// applied on top of them.
    pub fn from_match(
        text: &ParamValue,
        inherited: Params,
        attributes: &Attributes,
        token: &Token,
        captures: &Captures<'_>,
    ) -> Self {
        let mut params = inherited;
        params.extend(token.resolve(attributes, captures));
        Self {
            text: text.resolve(token, captures).into_text(),
            params,
        }
    }

    /// Look up one attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Returns `true` when no attribute applies to this segment.
    pub fn is_plain(&self) -> bool {
        self.params.is_empty()
    }
}
