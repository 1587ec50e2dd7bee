//! Open paired tokens during one scan
//!
//! The stack holds one [`Frame`] per opened paired token, outermost first. Frames carry
//! attributes that were already resolved against their opening match, so merging them
//! for a text run is a plain map union.

use crate::token::MatchType;
use crate::value::Params;

/// Identity of a rule within one parser: a token, or one tag of a markdown group token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId {
    /// Index of the token in the parser's token list
    pub token: usize,
    /// Index of the tag inside the token's tag table, for markdown groups
    pub tag: Option<usize>,
}

impl RuleId {
    pub fn token(token: usize) -> Self {
        Self { token, tag: None }
    }

    pub fn tag(token: usize, tag: usize) -> Self {
        Self {
            token,
            tag: Some(tag),
        }
    }
}

/// One open paired token.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: RuleId,
    pub skip: bool,
    pub params: Params,
}

impl Frame {
    pub fn new(id: RuleId, skip: bool, params: Params) -> Self {
        Self { id, skip, params }
    }
}

/// Stack of currently open paired tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenStack {
    frames: Vec<Frame>,
}

impl TokenStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a newly opened token.
    pub fn add(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Close the most recent open instance of `id`.
    ///
    /// Closing a token that is not on top removes the nearest instance and keeps the
    /// order of the rest. Returns `false` when `id` is not open at all.
    pub fn remove(&mut self, id: RuleId) -> bool {
        if self.frames.last().map(|frame| frame.id) == Some(id) {
            self.frames.pop();
            return true;
        }

        match self.frames.iter().rposition(|frame| frame.id == id) {
            Some(index) => {
                self.frames.remove(index);
                true
            }
            None => false,
        }
    }

    /// Merge the attributes of all open tokens, inner values overriding outer ones.
    pub fn get_params(&self) -> Params {
        let mut params = Params::new();
        for frame in &self.frames {
            params.extend(frame.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        params
    }

    /// Should a match of `id` be ignored because a skip region is open?
    ///
    /// Inside a skip region only the closing match of the innermost skip token is
    /// interpreted.
    pub fn skip_token(&self, id: RuleId, match_type: MatchType) -> bool {
        match self.frames.last() {
            Some(top) if top.skip => top.id != id || match_type != MatchType::End,
            _ => false,
        }
    }

    /// Innermost open token.
    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Returns `true` when the innermost open token is a skip token.
    pub fn in_skip(&self) -> bool {
        self.frames.last().map_or(false, |frame| frame.skip)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn frame(token: usize, skip: bool, key: &str, value: Value) -> Frame {
        let mut params = Params::new();
        params.insert(key.to_string(), value);
        Frame::new(RuleId::token(token), skip, params)
    }

    #[test]
    fn test_add_and_remove_top() {
        let mut stack = TokenStack::new();
        stack.add(frame(0, false, "is_bold", Value::Bool(true)));
        assert_eq!(stack.len(), 1);
        assert!(stack.remove(RuleId::token(0)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_remove_missing() {
        let mut stack = TokenStack::new();
        assert!(!stack.remove(RuleId::token(3)));
        stack.add(frame(0, false, "a", Value::Bool(true)));
        assert!(!stack.remove(RuleId::token(3)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_remove_nearest_out_of_order() {
        let mut stack = TokenStack::new();
        stack.add(frame(0, false, "a", Value::Int(1)));
        stack.add(frame(1, false, "b", Value::Int(2)));
        stack.add(frame(0, false, "a", Value::Int(3)));
        stack.add(frame(2, false, "c", Value::Int(4)));

        assert!(stack.remove(RuleId::token(0)));
        let ids: Vec<_> = stack
            .frames
            .iter()
            .map(|f| (f.id.token, f.params.values().next().cloned()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (0, Some(Value::Int(1))),
                (1, Some(Value::Int(2))),
                (2, Some(Value::Int(4))),
            ]
        );
    }

    #[test]
    fn test_params_inner_wins() {
        let mut stack = TokenStack::new();
        stack.add(frame(0, false, "color", Value::from("red")));
        stack.add(frame(1, false, "is_bold", Value::Bool(true)));
        stack.add(frame(2, false, "color", Value::from("blue")));

        let params = stack.get_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params["color"], Value::from("blue"));
        assert_eq!(params["is_bold"], Value::Bool(true));
    }

    #[test]
    fn test_skip_token_rules() {
        let mut stack = TokenStack::new();
        assert!(!stack.skip_token(RuleId::token(0), MatchType::Start));

        stack.add(frame(0, false, "a", Value::Bool(true)));
        assert!(!stack.skip_token(RuleId::token(1), MatchType::Start));

        stack.add(frame(1, true, "code", Value::Bool(true)));
        assert!(stack.in_skip());
        // Anything but the closing match of the open skip token is suppressed
        assert!(stack.skip_token(RuleId::token(0), MatchType::End));
        assert!(stack.skip_token(RuleId::token(2), MatchType::Single));
        assert!(stack.skip_token(RuleId::token(1), MatchType::Start));
        assert!(!stack.skip_token(RuleId::token(1), MatchType::End));
        // A different skip token does not close the region
        assert!(stack.skip_token(RuleId::tag(1, 0), MatchType::End));
    }
}
