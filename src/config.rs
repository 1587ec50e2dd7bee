//! Grammars declared in configuration files
//!
//! `defaults/markdown.default.toml` is embedded so the stock Markdown grammar needs no
//! files on disk. Applications layer their own TOML files over it with [`Loader`] and
//! turn the result into a parser with [`GrammarConfig::build`].
//!
//! A file lists `[[tags]]` (markdown delimiters, wrapped into one group token) and
//! `[[tokens]]` (regex rules). Attribute values are scalars, or a table referring to a
//! capture group of the token's own pattern:
//!
//!     params = { link_target = { group = "url", transform = "url_complete" } }
//!
//! Transforms are picked by name from [`TransformName`].

use crate::error::GrammarResult;
use crate::markdown::{
    url_complete, wrap_definitions, CollapseWhitespace, Definition, MarkdownTag,
};
use crate::match_group::MatchGroup;
use crate::parser::{Parser, TextProcessor, Verbatim};
use crate::token::{ParamValue, Token};
use crate::value::Value;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const DEFAULT_TOML: &str = include_str!("../defaults/markdown.default.toml");

/// Parser whose text processing is chosen at runtime.
pub type DynParser = Parser<Box<dyn TextProcessor + Send + Sync>>;

/// Top-level grammar description.
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarConfig {
    /// Collapse whitespace runs in literal text
    #[serde(default)]
    pub collapse_whitespace: bool,
    /// Backtracking budget per regex search, see [`Parser::DEFAULT_BACKTRACK_LIMIT`]
    #[serde(default)]
    pub backtrack_limit: Option<usize>,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// A regex token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub text: Option<ParamConfig>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamConfig>,
}

/// A markdown delimiter.
#[derive(Debug, Clone, Deserialize)]
pub struct TagConfig {
    pub delimiter: String,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub params: BTreeMap<String, ParamConfig>,
}

/// Attribute value as written in a grammar file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParamConfig {
    Group {
        group: String,
        #[serde(default)]
        transform: Option<TransformName>,
    },
    Literal(Value),
}

/// Named transforms available to capture groups in grammar files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformName {
    UrlComplete,
    Trim,
    Lowercase,
    Uppercase,
}

impl TransformName {
    pub fn apply(self, value: &str) -> String {
        match self {
            TransformName::UrlComplete => url_complete(value),
            TransformName::Trim => value.trim().to_string(),
            TransformName::Lowercase => value.to_lowercase(),
            TransformName::Uppercase => value.to_uppercase(),
        }
    }
}

impl ParamConfig {
    pub fn to_param(&self) -> ParamValue {
        match self {
            ParamConfig::Literal(value) => ParamValue::Literal(value.clone()),
            ParamConfig::Group { group, transform } => {
                let group = MatchGroup::new(group.clone());
                match *transform {
                    Some(name) => group.with_transform(move |value| name.apply(value)).into(),
                    None => group.into(),
                }
            }
        }
    }
}

impl TokenConfig {
    pub fn to_token(&self) -> GrammarResult<Token> {
        let mut token =
            Token::new(&self.name, &self.start, self.end.as_deref())?.with_skip(self.skip);
        if let Some(text) = &self.text {
            token = token.with_text(text.to_param());
        }
        for (key, value) in &self.params {
            token = token.with_param(key.clone(), value.to_param());
        }
        Ok(token)
    }
}

impl TagConfig {
    pub fn to_tag(&self) -> MarkdownTag {
        self.params.iter().fold(
            MarkdownTag::new(self.delimiter.clone()).with_skip(self.skip),
            |tag, (key, value)| tag.with_param(key.clone(), value.to_param()),
        )
    }
}

impl GrammarConfig {
    /// Tokens in file order, followed by the tags.
    pub fn definitions(&self) -> GrammarResult<Vec<Definition>> {
        let mut definitions = Vec::with_capacity(self.tokens.len() + self.tags.len());
        for token in &self.tokens {
            definitions.push(Definition::Token(token.to_token()?));
        }
        definitions.extend(self.tags.iter().map(|tag| Definition::Tag(tag.to_tag())));
        Ok(definitions)
    }

    /// Compile the grammar.
    pub fn build(&self) -> GrammarResult<DynParser> {
        let processor: Box<dyn TextProcessor + Send + Sync> = if self.collapse_whitespace {
            Box::new(CollapseWhitespace)
        } else {
            Box::new(Verbatim)
        };
        let parser = Parser::with_processor(wrap_definitions(self.definitions()?)?, processor)?;
        match self.backtrack_limit {
            Some(limit) => parser.with_backtrack_limit(limit),
            None => Ok(parser),
        }
    }
}

/// Helper for layering grammar files over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded Markdown grammar.
    pub fn new() -> Self {
        Self::empty().with_str(DEFAULT_TOML)
    }

    /// Start a loader without any grammar.
    pub fn empty() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Layer a grammar given as TOML text.
    pub fn with_str(mut self, toml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(toml, FileFormat::Toml));
        self
    }

    /// Layer a grammar file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional grammar file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting grammar.
    pub fn build(self) -> Result<GrammarConfig, ConfigError> {
        let grammar: GrammarConfig = self.builder.build()?.try_deserialize()?;
        debug!(
            tokens = grammar.tokens.len(),
            tags = grammar.tags.len(),
            collapse_whitespace = grammar.collapse_whitespace,
            "loaded inline grammar"
        );
        Ok(grammar)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the default grammar.
pub fn load_defaults() -> Result<GrammarConfig, ConfigError> {
    Loader::new().build()
}
