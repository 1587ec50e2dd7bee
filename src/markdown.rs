//! Markdown-flavored tags
//!
//! Markdown delimiters (`**`, `_`, `` ` ``) make poor token names, and declaring one
//! token per delimiter means one regex alternative each. A [`MarkdownGroup`] instead
//! folds any number of [`MarkdownTag`]s into a single paired token:
//!
//!     start   COMMON_START(tags) | SKIP_START(skip tags)
//!     end     COMMON_END(tags)   | SKIP_END(skip tags)
//!
//! After the group fires, the parser looks up the matched delimiter in the group's tag
//! table to find out which tag it was, and from then on treats the tag like a token of
//! its own.
//!
//! Boundary rules for the common (formatting) tags:
//! - an opening delimiter is not preceded by an alphanumeric character or a backslash,
//!   is not followed by whitespace or by itself, and needs a matching closing
//!   delimiter further on;
//! - a closing delimiter is not preceded by whitespace or a backslash, and is not
//!   followed by an alphanumeric character.
//!
//! Skip tags (code spans) only require that the delimiter is not escaped and that it
//! appears again later.

use crate::error::{GrammarError, GrammarResult};
use crate::parser::{Parser, TextProcessor};
use crate::token::{Attributes, ParamValue, Token};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

/// Not preceded by an alphanumeric character, or at the start of the text.
const B_LEFT: &str = r"(?:(?<=[^a-zA-Z0-9])|^)";
/// Not followed by an alphanumeric character, or at the end of the text.
const B_RIGHT: &str = r"(?:(?=[^a-zA-Z0-9])|$)";

static RE_CLEAN_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

static URL_PROTOCOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[a-z][\w-]+:/{1,3}").unwrap());

fn common_start(tags: &str) -> String {
    format!(
        r"{left}(?<!\\)(?P<tag>{tags})(?!\s)(?!(?P=tag))(?=.+?(?<![\s\\])(?P=tag){right})",
        left = B_LEFT,
        tags = tags,
        right = B_RIGHT,
    )
}

fn common_end(tags: &str) -> String {
    format!(r"(?<![\s\\])(?:{}){}", tags, B_RIGHT)
}

fn skip_start(tags: &str) -> String {
    format!(
        r"(?<!\\)(?P<skip_tag>{tags})(?!(?P=skip_tag))(?=.+?(?<!\\)(?P=skip_tag))",
        tags = tags,
    )
}

fn skip_end(tags: &str) -> String {
    format!(r"(?<!\\)(?:{})", tags)
}

/// A single markdown delimiter and the attributes it applies.
#[derive(Debug, Clone)]
pub struct MarkdownTag {
    delimiter: String,
    skip: bool,
    params: Attributes,
}

impl MarkdownTag {
    /// Formatting tag for a literal delimiter such as `**`.
    ///
    /// The delimiter is plain text, not a regex fragment: it is escaped when the group
    /// pattern is built, and matched delimiters are looked up by this exact string.
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            skip: false,
            params: Attributes::new(),
        }
    }

    /// Skip tag: content between the delimiters is kept verbatim.
    pub fn skipping(delimiter: impl Into<String>) -> Self {
        Self::new(delimiter).with_skip(true)
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn params(&self) -> &Attributes {
        &self.params
    }
}

/// Delimiter lookup of a markdown group token.
#[derive(Debug, Clone, Default)]
pub(crate) struct TagTable {
    tags: Vec<MarkdownTag>,
    index: HashMap<String, usize>,
}

impl TagTable {
    fn new(tags: Vec<MarkdownTag>) -> Self {
        let index = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| (tag.delimiter.clone(), i))
            .collect();
        Self { tags, index }
    }

    /// Tag for a matched delimiter, with its position in the table.
    pub(crate) fn get(&self, delimiter: &str) -> Option<(usize, &MarkdownTag)> {
        let index = *self.index.get(delimiter)?;
        Some((index, &self.tags[index]))
    }
}

/// Markdown tags compiled into one paired token.
#[derive(Debug, Clone)]
pub struct MarkdownGroup {
    token: Token,
}

impl MarkdownGroup {
    pub const DEFAULT_NAME: &'static str = "markdown";

    /// Group `tags` under the default token name.
    pub fn new(tags: Vec<MarkdownTag>) -> GrammarResult<Self> {
        Self::with_name(Self::DEFAULT_NAME, tags)
    }

    /// Group `tags` under the token name `name`.
    ///
    /// Tags are tried in the order given, so longer delimiters sharing a prefix with
    /// shorter ones (`***` before `**` before `*`) must come first.
    pub fn with_name(name: &str, tags: Vec<MarkdownTag>) -> GrammarResult<Self> {
        if tags.is_empty() {
            return Err(GrammarError::EmptyGroup {
                name: name.to_string(),
            });
        }
        if tags.iter().any(|tag| tag.delimiter.is_empty()) {
            return Err(GrammarError::InvalidPattern {
                token: name.to_string(),
                message: "empty markdown delimiter".to_string(),
            });
        }

        let alternation = |skip: bool| {
            tags.iter()
                .filter(|tag| tag.skip == skip)
                .map(|tag| fancy_regex::escape(&tag.delimiter).into_owned())
                .collect::<Vec<_>>()
                .join("|")
        };
        let common = alternation(false);
        let skipped = alternation(true);

        let mut pattern_start = Vec::new();
        let mut pattern_end = Vec::new();
        if !common.is_empty() {
            pattern_start.push(common_start(&common));
            pattern_end.push(common_end(&common));
        }
        if !skipped.is_empty() {
            pattern_start.push(skip_start(&skipped));
            pattern_end.push(skip_end(&skipped));
        }

        let mut token = Token::paired(name, &pattern_start.join("|"), &pattern_end.join("|"))?;
        token.tags = Some(TagTable::new(tags));
        Ok(Self { token })
    }

    /// Tag registered for a literal delimiter.
    pub fn get_tag(&self, delimiter: &str) -> Option<&MarkdownTag> {
        self.token
            .tags
            .as_ref()
            .and_then(|table| table.get(delimiter))
            .map(|(_, tag)| tag)
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn into_token(self) -> Token {
        self.token
    }
}

/// Entry of a mixed markdown grammar.
#[derive(Debug, Clone)]
pub enum Definition {
    Token(Token),
    Tag(MarkdownTag),
}

impl From<Token> for Definition {
    fn from(token: Token) -> Self {
        Definition::Token(token)
    }
}

impl From<MarkdownTag> for Definition {
    fn from(tag: MarkdownTag) -> Self {
        Definition::Tag(tag)
    }
}

impl From<MarkdownGroup> for Definition {
    fn from(group: MarkdownGroup) -> Self {
        Definition::Token(group.into_token())
    }
}

/// Turn a mixed list of tokens and tags into parser tokens.
///
/// Tokens keep their order; all tags are wrapped into one [`MarkdownGroup`] appended
/// last, named `markdown` unless a token already uses that name (then `markdownG`,
/// `markdownGG`, ...).
pub fn wrap_definitions(
    definitions: impl IntoIterator<Item = Definition>,
) -> GrammarResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut tags = Vec::new();
    for definition in definitions {
        match definition {
            Definition::Token(token) => tokens.push(token),
            Definition::Tag(tag) => tags.push(tag),
        }
    }

    if !tags.is_empty() {
        let mut name = MarkdownGroup::DEFAULT_NAME.to_string();
        while tokens.iter().any(|token| token.name() == name) {
            name.push('G');
        }
        tokens.push(MarkdownGroup::with_name(&name, tags)?.into_token());
    }
    Ok(tokens)
}

/// Collapses runs of spaces and tabs in literal text to one space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseWhitespace;

impl TextProcessor for CollapseWhitespace {
    fn postprocess<'t>(&self, text: &'t str) -> Cow<'t, str> {
        RE_CLEAN_WHITESPACE.replace_all(text, " ")
    }
}

/// Markdown parser over a mixed list of tokens and tags, with whitespace collapsing.
pub fn markdown_parser(
    definitions: impl IntoIterator<Item = Definition>,
) -> GrammarResult<Parser<CollapseWhitespace>> {
    Parser::with_processor(wrap_definitions(definitions)?, CollapseWhitespace)
}

/// Prefix `http://` to a URL that has no scheme.
pub fn url_complete(url: &str) -> String {
    if URL_PROTOCOL.is_match(url) {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}
