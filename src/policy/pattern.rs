//! Path pattern compiler.
//! `+` stands for exactly one path segment, a single trailing `*` for any remaining suffix.
//! Compiled matchers are anchored at the end only, so a pattern behaves as a suffix test
//! against the candidate path.

use regex::Regex;

use crate::error::{AuditError, AuditResult};

pub const SEPARATOR: char = '/';
pub const SEGMENT_WILDCARD: char = '+';
pub const GLOB: char = '*';

/// Compiled form of one path pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
}

impl PathMatcher {
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }
}

/// Reject patterns that use `*` anywhere but the final character, or more than once.
pub fn validate(pattern: &str) -> AuditResult<()> {
    if pattern.is_empty() {
        return Err(AuditError::invalid_pattern(pattern, "pattern is empty"));
    }
    let globs = pattern.matches(GLOB).count();
    if globs > 1 {
        return Err(AuditError::invalid_pattern(pattern, "at most one `*` is allowed"));
    }
    if globs == 1 && !pattern.ends_with(GLOB) {
        return Err(AuditError::invalid_pattern(pattern, "`*` is only allowed as the final character"));
    }
    Ok(())
}

/// Translate a pattern into regex source. Literal characters are escaped,
/// `+` becomes `[^/]+`, the trailing `*` becomes `.*`, and `$` closes the expression.
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            SEGMENT_WILDCARD => out.push_str("[^/]+"),
            GLOB => out.push_str(".*"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

pub fn compile(pattern: &str) -> AuditResult<PathMatcher> {
    validate(pattern)?;
    let regex = Regex::new(&pattern_to_regex(pattern))
        .map_err(|e| AuditError::invalid_pattern(pattern, e.to_string()))?;
    Ok(PathMatcher { regex })
}

/// One-shot match. A pattern that cannot be compiled never matches.
pub fn matches(pattern: &str, candidate: &str) -> bool {
    match compile(pattern) {
        Ok(m) => m.is_match(candidate),
        Err(e) => {
            tracing::debug!(target: "secretpaths", "pattern {:?} treated as non-match: {}", pattern, e);
            false
        }
    }
}

/// Character offset of the first `+` or `*`, if any.
pub fn first_wildcard_offset(pattern: &str) -> Option<usize> {
    pattern.chars().position(|c| c == SEGMENT_WILDCARD || c == GLOB)
}
