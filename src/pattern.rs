//! Named-group rewriting
//!
//! Every token's patterns end up as alternatives of one compound regex, so the capture
//! groups a user writes (`(?P<url>...)`) must be made unique per token. This module
//! rewrites group definitions and backreferences in a pattern string without parsing the
//! full regex syntax: escapes are skipped, everything else is left untouched.
//!
//! Recognized forms:
//!
//!     (?P<name>...)  (?<name>...)    definitions
//!     (?P=name)      \k<name>        backreferences

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Escapes, group definitions and group references, in matching priority order.
static GROUP_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)\\k<(?P<kref>[A-Za-z_][A-Za-z0-9_]*)>",
        r"|\\.",
        r"|\(\?P?<(?P<def>[A-Za-z_][A-Za-z0-9_]*)>",
        r"|\(\?P=(?P<pref>[A-Za-z_][A-Za-z0-9_]*)\)",
    ))
    .unwrap()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Returns `true` when `name` can be used inside a capture-group name.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Names of all capture groups defined in `pattern`, in order of appearance.
pub(crate) fn defined_groups(pattern: &str) -> Vec<String> {
    GROUP_SYNTAX
        .captures_iter(pattern)
        .filter_map(|caps| caps.name("def").map(|m| m.as_str().to_string()))
        .collect()
}

/// Rename every group definition and backreference in `pattern` through `rename`.
pub(crate) fn rename_groups(pattern: &str, rename: impl Fn(&str) -> String) -> String {
    GROUP_SYNTAX
        .replace_all(pattern, |caps: &Captures<'_>| {
            if let Some(name) = caps.name("def") {
                let opener = &caps[0][..caps[0].len() - name.as_str().len() - 1];
                format!("{}{}>", opener, rename(name.as_str()))
            } else if let Some(name) = caps.name("pref") {
                format!("(?P={})", rename(name.as_str()))
            } else if let Some(name) = caps.name("kref") {
                format!("\\k<{}>", rename(name.as_str()))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Prefix every group in `pattern` with `prefix_`.
pub(crate) fn prefix_groups(pattern: &str, prefix: &str) -> String {
    rename_groups(pattern, |group| format!("{}_{}", prefix, group))
}

/// Enclose `pattern` in a named group.
pub(crate) fn named_group(group: &str, pattern: &str) -> String {
    format!("(?P<{}>{})", group, pattern)
}
