//! # segmark
//!
//! A declarative, regex-based lexer for inline text markup.
//!
//! A grammar is an ordered list of [`Token`]s. Each token contributes one (single) or two
//! (paired) named alternatives to a compound regular expression, and [`Parser::parse`]
//! walks the input once, yielding a flat sequence of [`Segment`]s: text plus the
//! attributes active at that point. No tree is built; nesting is tracked on a
//! [`TokenStack`] during the scan and flattened into attribute sets.
//!
//! Layout
//!
//!     value / match_group / token / segment    data model
//!     pattern                                 named-group rewriting for the compound regex
//!     stack                                   open paired tokens and skip regions
//!     parser                                  regex compilation and the scan loop
//!     markdown                                single-delimiter tags sharing one token
//!     config                                  grammars declared in TOML
//!
//! Malformed markup never fails a parse: unbalanced delimiters fall through to literal
//! text. Only a misconfigured grammar is an error, reported once by the constructor.

pub mod config;
pub mod error;
pub mod markdown;
pub mod match_group;
pub mod parser;
mod pattern;
pub mod segment;
pub mod stack;
pub mod token;
pub mod value;

pub use error::{GrammarError, GrammarResult};
pub use markdown::{
    markdown_parser, url_complete, wrap_definitions, CollapseWhitespace, Definition,
    MarkdownGroup, MarkdownTag,
};
pub use match_group::{MatchGroup, Transform};
pub use parser::{Parser, Segments, TextProcessor, Verbatim};
pub use segment::Segment;
pub use stack::{Frame, RuleId, TokenStack};
pub use token::{Attributes, MatchType, ParamValue, Token};
pub use value::{Params, Value};
