//! Regex-driven inline parser
//!
//! The parser compiles every token into one alternation, in declaration order:
//!
//!     (?s)(?P<a_start>..)|(?P<a_end>..)|(?P<b_start>..)|...
//!
//! and a group table mapping each top-level group name back to its token and
//! [`MatchType`]. Declaration order is also priority order: when two tokens could match
//! at the same position, the one listed first wins.
//!
//! [`Parser::parse`] then performs a single forward scan over the successive matches:
//!
//! 1. find which token fired through the matched group name
//! 2. take the attributes of the open tokens before touching the stack
//! 3. drop the match if an open skip region suppresses it
//! 4. for a closing match, pop the token; an unbalanced closer is dropped
//! 5. emit the literal text between the previous match and this one
//! 6. push an opening match, or emit a segment for a single match
//! 7. continue after the match
//!
//! and finally emits any trailing text with whatever attributes are still open.
//! Dropped matches are not lost: their text becomes part of the next literal run.
//! Zero-length matches of single tokens are not events at all. A search that runs out
//! of backtracking budget is retried one character further on.
//!
//! The compiled regex and group table never change after construction, so one parser
//! can serve any number of concurrent scans; each scan owns its [`TokenStack`].

use crate::error::{GrammarError, GrammarResult};
use crate::markdown::MarkdownTag;
use crate::segment::Segment;
use crate::stack::{Frame, RuleId, TokenStack};
use crate::token::{Attributes, MatchType, ParamValue, Token};
use fancy_regex::{Captures, Regex, RegexBuilder};
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Text hooks around a scan.
///
/// Both default to the identity.
pub trait TextProcessor {
    /// Called once on the whole input before scanning.
    fn preprocess<'t>(&self, text: &'t str) -> Cow<'t, str> {
        Cow::Borrowed(text)
    }

    /// Called on every literal text run before it is emitted.
    ///
    /// Not called for text inside a skip region.
    fn postprocess<'t>(&self, text: &'t str) -> Cow<'t, str> {
        Cow::Borrowed(text)
    }
}

impl<T: TextProcessor + ?Sized> TextProcessor for Box<T> {
    fn preprocess<'t>(&self, text: &'t str) -> Cow<'t, str> {
        (**self).preprocess(text)
    }

    fn postprocess<'t>(&self, text: &'t str) -> Cow<'t, str> {
        (**self).postprocess(text)
    }
}

/// Processor that leaves text untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbatim;

impl TextProcessor for Verbatim {}

/// Top-level group of the compound regex.
#[derive(Debug, Clone)]
struct GroupEntry {
    name: String,
    token: usize,
    match_type: MatchType,
}

/// Compiled set of tokens.
#[derive(Debug)]
pub struct Parser<P = Verbatim> {
    tokens: Vec<Token>,
    pattern: String,
    regex: Option<Regex>,
    groups: Vec<GroupEntry>,
    backtrack_limit: usize,
    processor: P,
}

impl Parser<Verbatim> {
    /// Compile `tokens` into a parser without text processing.
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> GrammarResult<Self> {
        Self::with_processor(tokens, Verbatim)
    }
}

impl<P: TextProcessor> Parser<P> {
    /// Backtracking budget of a single regex search.
    ///
    /// Every candidate opener of a paired token looks ahead for its closer, so the cost
    /// of one search grows with the square of the remaining text. This budget covers
    /// inputs of several hundred kilobytes.
    pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000_000;

    /// Compile `tokens` into a parser using `processor` as text hooks.
    pub fn with_processor(
        tokens: impl IntoIterator<Item = Token>,
        processor: P,
    ) -> GrammarResult<Self> {
        let tokens: Vec<Token> = tokens.into_iter().collect();
        let groups = Self::build_groups(&tokens)?;
        let (pattern, regex) = Self::build_regex(&tokens, Self::DEFAULT_BACKTRACK_LIMIT)?;
        debug!(
            tokens = tokens.len(),
            groups = groups.len(),
            "compiled inline grammar"
        );

        Ok(Self {
            tokens,
            pattern,
            regex,
            groups,
            backtrack_limit: Self::DEFAULT_BACKTRACK_LIMIT,
            processor,
        })
    }

    /// Recompile with a different backtracking budget per search.
    ///
    /// A search that exhausts the budget is retried one character further on, so a low
    /// limit trades markup recognition near pathological input for bounded work.
    pub fn with_backtrack_limit(mut self, limit: usize) -> GrammarResult<Self> {
        let (pattern, regex) = Self::build_regex(&self.tokens, limit)?;
        self.pattern = pattern;
        self.regex = regex;
        self.backtrack_limit = limit;
        Ok(self)
    }

    /// Build the compound pattern; `None` when there is nothing to match.
    fn build_regex(tokens: &[Token], limit: usize) -> GrammarResult<(String, Option<Regex>)> {
        let mut patterns = Vec::new();
        for token in tokens {
            patterns.push(token.pattern_start());
            if let Some(end) = token.pattern_end() {
                patterns.push(end);
            }
        }

        if patterns.is_empty() {
            return Ok((String::new(), None));
        }

        let pattern = format!("(?s){}", patterns.join("|"));
        let regex = RegexBuilder::new(&pattern)
            .backtrack_limit(limit)
            .build()
            .map_err(|e| GrammarError::InvalidPattern {
            token: tokens
                .iter()
                .map(Token::name)
                .collect::<Vec<_>>()
                .join("|"),
            message: e.to_string(),
        })?;
        Ok((pattern, Some(regex)))
    }

    /// Map every top-level group to its token, rejecting colliding group names.
    fn build_groups(tokens: &[Token]) -> GrammarResult<Vec<GroupEntry>> {
        let mut seen = HashSet::new();
        for group in tokens.iter().flat_map(Token::derived_groups) {
            if !seen.insert(group.clone()) {
                return Err(GrammarError::GroupCollision { group });
            }
        }

        let mut groups = Vec::new();
        for (index, token) in tokens.iter().enumerate() {
            match token.group_end() {
                Some(end) => {
                    groups.push(GroupEntry {
                        name: token.group_start().to_string(),
                        token: index,
                        match_type: MatchType::Start,
                    });
                    groups.push(GroupEntry {
                        name: end.to_string(),
                        token: index,
                        match_type: MatchType::End,
                    });
                }
                None => groups.push(GroupEntry {
                    name: token.group_start().to_string(),
                    token: index,
                    match_type: MatchType::Single,
                }),
            }
        }
        Ok(groups)
    }

    /// Parse `text` into segments.
    ///
    /// The returned iterator is lazy and independent of any other scan.
    pub fn parse<'p, 't>(&'p self, text: &'t str) -> Segments<'p, 't, P> {
        Segments {
            parser: self,
            text: self.processor.preprocess(text),
            scan: Scan::default(),
        }
    }

    /// Tokens in declaration order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The compound pattern (empty when the parser has no tokens).
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn backtrack_limit(&self) -> usize {
        self.backtrack_limit
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Find which rule fired for `captures`.
    ///
    /// For markdown groups the matched delimiter selects the tag. A symmetric skip
    /// delimiter cannot tell opening from closing by pattern alone, so it is read as a
    /// closing match whenever its own tag is the innermost open token.
    fn get_matched_token<'p>(
        &'p self,
        captures: &Captures<'_>,
        stack: &TokenStack,
    ) -> Option<Matched<'p>> {
        let entry = self
            .groups
            .iter()
            .find(|entry| captures.name(&entry.name).is_some())?;
        let token = &self.tokens[entry.token];
        let mut matched = Matched {
            token_index: entry.token,
            token,
            tag: None,
            match_type: entry.match_type,
            group: &entry.name,
        };

        if let Some(table) = &token.tags {
            let delimiter = captures.name(&entry.name).map_or("", |m| m.as_str());
            let Some((index, tag)) = table.get(delimiter) else {
                trace!(delimiter, group = %entry.name, "unknown markdown delimiter");
                return None;
            };
            matched.tag = Some((index, tag));
            if tag.skip() && stack.last().map(|frame| frame.id) == Some(matched.id()) {
                matched.match_type = MatchType::End;
            }
        }

        Some(matched)
    }
}

/// A match attributed to its rule.
struct Matched<'p> {
    token_index: usize,
    token: &'p Token,
    tag: Option<(usize, &'p MarkdownTag)>,
    match_type: MatchType,
    group: &'p str,
}

impl<'p> Matched<'p> {
    fn id(&self) -> RuleId {
        match self.tag {
            Some((tag, _)) => RuleId::tag(self.token_index, tag),
            None => RuleId::token(self.token_index),
        }
    }

    fn skip(&self) -> bool {
        match self.tag {
            Some((_, tag)) => tag.skip(),
            None => self.token.skip(),
        }
    }

    fn params(&self) -> &'p Attributes {
        match self.tag {
            Some((_, tag)) => tag.params(),
            None => self.token.params(),
        }
    }
}

/// Lazy sequence of segments produced by [`Parser::parse`].
pub struct Segments<'p, 't, P> {
    parser: &'p Parser<P>,
    text: Cow<'t, str>,
    scan: Scan,
}

impl<'p, 't, P: TextProcessor> Iterator for Segments<'p, 't, P> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        self.scan.step(self.parser, &self.text)
    }
}

/// Mutable state of one scan.
#[derive(Debug, Default)]
struct Scan {
    stack: TokenStack,
    /// Where the next regex search starts
    search_pos: usize,
    /// End of the last match that was interpreted
    last_pos: usize,
    pending: Option<Segment>,
    /// A search already ran out of backtracking budget
    degraded: bool,
    finished: bool,
}

impl Scan {
    fn step<P: TextProcessor>(&mut self, parser: &Parser<P>, text: &str) -> Option<Segment> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        loop {
            if self.finished {
                return None;
            }
            let Some(regex) = &parser.regex else {
                return self.finish(parser, text);
            };
            if self.search_pos > text.len() {
                return self.finish(parser, text);
            }

            let captures = match regex.captures_from_pos(text, self.search_pos) {
                Ok(Some(captures)) => captures,
                Ok(None) => return self.finish(parser, text),
                Err(err) => {
                    if self.degraded {
                        trace!(error = %err, position = self.search_pos, "inline search retried");
                    } else {
                        warn!(
                            error = %err,
                            position = self.search_pos,
                            "inline search failed, retrying at the next character"
                        );
                        self.degraded = true;
                    }
                    self.search_pos = next_boundary(text, self.search_pos);
                    continue;
                }
            };
            let Some(whole) = captures.get(0) else {
                return self.finish(parser, text);
            };
            self.search_pos = if whole.end() > whole.start() {
                whole.end()
            } else {
                next_boundary(text, whole.end())
            };

            let Some(matched) = parser.get_matched_token(&captures, &self.stack) else {
                continue;
            };
            let Some(group) = captures.name(matched.group) else {
                continue;
            };

            if matched.match_type == MatchType::Single && group.as_str().is_empty() {
                continue;
            }

            let params = self.stack.get_params();

            if self.stack.skip_token(matched.id(), matched.match_type) {
                trace!(
                    group = matched.group,
                    position = group.start(),
                    "suppressed in skip region"
                );
                continue;
            }

            let verbatim = self.stack.in_skip();

            if matched.match_type == MatchType::End && !self.stack.remove(matched.id()) {
                trace!(
                    group = matched.group,
                    position = group.start(),
                    "closing match without opener"
                );
                continue;
            }

            let preceding = if group.start() > self.last_pos {
                let run = &text[self.last_pos..group.start()];
                let run = if verbatim {
                    run.to_string()
                } else {
                    parser.processor.postprocess(run).into_owned()
                };
                Some(Segment::new(run, params.clone()))
            } else {
                None
            };

            let emitted = match matched.match_type {
                MatchType::Start => {
                    let resolved = matched.token.resolve(matched.params(), &captures);
                    self.stack
                        .add(Frame::new(matched.id(), matched.skip(), resolved));
                    None
                }
                MatchType::Single => {
                    let text_value = matched
                        .token
                        .text()
                        .cloned()
                        .unwrap_or_else(|| ParamValue::from(group.as_str()));
                    Some(Segment::from_match(
                        &text_value,
                        params,
                        matched.params(),
                        matched.token,
                        &captures,
                    ))
                }
                MatchType::End => None,
            };

            self.last_pos = group.end();

            match (preceding, emitted) {
                (Some(preceding), emitted) => {
                    self.pending = emitted;
                    return Some(preceding);
                }
                (None, Some(emitted)) => return Some(emitted),
                (None, None) => continue,
            }
        }
    }

    /// Emit whatever text is left after the last interpreted match.
    fn finish<P: TextProcessor>(&mut self, parser: &Parser<P>, text: &str) -> Option<Segment> {
        self.finished = true;
        if self.last_pos >= text.len() {
            return None;
        }

        let run = &text[self.last_pos..];
        self.last_pos = text.len();
        let run = if self.stack.in_skip() {
            run.to_string()
        } else {
            parser.processor.postprocess(run).into_owned()
        };
        Some(Segment::new(run, self.stack.get_params()))
    }
}

/// Byte offset of the character after `pos`, or past the end.
fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |ch| pos + ch.len_utf8())
}
