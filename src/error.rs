//! Error types for grammar construction
//!
//! Parsing itself never fails; every error here is raised while a [`Parser`](crate::Parser)
//! or one of its tokens is being built.

use std::fmt;

/// Errors that can occur while compiling a grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// Token name cannot be used as a capture-group prefix
    InvalidTokenName { name: String },
    /// Two derived capture groups ended up with the same name
    GroupCollision { group: String },
    /// A pattern failed to compile
    InvalidPattern { token: String, message: String },
    /// A markdown group was built without any tags
    EmptyGroup { name: String },
    /// A paired token was given an empty end pattern
    MissingEnd { name: String },
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::InvalidTokenName { name } => {
                write!(f, "Invalid token name {:?}: expected an identifier", name)
            }
            GrammarError::GroupCollision { group } => {
                write!(f, "Capture group {:?} is defined more than once", group)
            }
            GrammarError::InvalidPattern { token, message } => {
                write!(f, "Invalid pattern for token {:?}: {}", token, message)
            }
            GrammarError::EmptyGroup { name } => {
                write!(f, "Markdown group {:?} has no tags", name)
            }
            GrammarError::MissingEnd { name } => {
                write!(f, "Paired token {:?} has an empty end pattern", name)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// Type alias for grammar construction results
pub type GrammarResult<T> = Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_culprit() {
        let err = GrammarError::InvalidPattern {
            token: "bold".to_string(),
            message: "unclosed group".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid pattern for token \"bold\": unclosed group"
        );

        let err = GrammarError::GroupCollision {
            group: "b_start".to_string(),
        };
        assert!(err.to_string().contains("b_start"));
    }
}
