use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::pattern::{self, PathMatcher, GLOB, SEGMENT_WILDCARD};
use crate::error::AuditResult;

/// Capability token. The vocabulary is open; unknown tokens are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    Create,
    Read,
    Update,
    Patch,
    Delete,
    List,
    Sudo,
    Deny,
    Other(String),
}

impl Capability {
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Create => "create",
            Capability::Read => "read",
            Capability::Update => "update",
            Capability::Patch => "patch",
            Capability::Delete => "delete",
            Capability::List => "list",
            Capability::Sudo => "sudo",
            Capability::Deny => "deny",
            Capability::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "create" => Capability::Create,
            "read" => Capability::Read,
            "update" => Capability::Update,
            "patch" => Capability::Patch,
            "delete" => Capability::Delete,
            "list" => Capability::List,
            "sudo" => Capability::Sudo,
            "deny" => Capability::Deny,
            other => Capability::Other(other.to_string()),
        }
    }
}

impl From<String> for Capability {
    fn from(s: String) -> Self { Capability::from(s.as_str()) }
}

impl From<Capability> for String {
    fn from(c: Capability) -> Self { c.as_str().to_string() }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One decoded `(path pattern, capabilities)` pair, before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRule {
    pub path: String,
    pub capabilities: Vec<String>,
}

impl RawRule {
    pub fn new<P: Into<String>, C: Into<String>>(path: P, capabilities: impl IntoIterator<Item = C>) -> Self {
        Self { path: path.into(), capabilities: capabilities.into_iter().map(Into::into).collect() }
    }
}

/// Specificity of a pattern. Larger keys are consulted first; the derived ordering
/// compares fields top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    /// Offset of the first wildcard, `usize::MAX` when there is none.
    first_wildcard: usize,
    no_trailing_glob: bool,
    segment_wildcards: Reverse<usize>,
    length: usize,
    pattern: String,
}

impl PriorityKey {
    pub fn for_pattern(p: &str) -> Self {
        PriorityKey {
            first_wildcard: pattern::first_wildcard_offset(p).unwrap_or(usize::MAX),
            no_trailing_glob: !p.ends_with(GLOB),
            segment_wildcards: Reverse(p.chars().filter(|c| *c == SEGMENT_WILDCARD).count()),
            length: p.chars().count(),
            pattern: p.to_string(),
        }
    }
}

/// A compiled rule. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    path: String,
    capabilities: Vec<Capability>,
    #[serde(skip)]
    matcher: PathMatcher,
    #[serde(skip)]
    priority: PriorityKey,
}

impl Rule {
    pub fn new<C: Into<Capability>>(path: impl Into<String>, capabilities: impl IntoIterator<Item = C>) -> AuditResult<Self> {
        let path = path.into();
        let matcher = pattern::compile(&path)?;
        let mut caps: Vec<Capability> = Vec::new();
        for c in capabilities.into_iter().map(Into::into) {
            if !caps.contains(&c) { caps.push(c); }
        }
        let priority = PriorityKey::for_pattern(&path);
        Ok(Rule { path, capabilities: caps, matcher, priority })
    }

    pub fn from_raw(raw: &RawRule) -> AuditResult<Self> {
        Rule::new(raw.path.clone(), raw.capabilities.iter().map(String::as_str))
    }

    pub fn path(&self) -> &str { &self.path }
    pub fn capabilities(&self) -> &[Capability] { &self.capabilities }
    pub fn priority_key(&self) -> &PriorityKey { &self.priority }

    pub fn is_deny(&self) -> bool { self.capabilities.contains(&Capability::Deny) }

    /// Pattern matches and the rule does not carry `deny`.
    pub fn grants(&self, path: &str) -> bool {
        self.matcher.is_match(path) && !self.is_deny()
    }

    /// A `deny` rule only blocks the path it names literally.
    pub fn denies_exactly(&self, path: &str) -> bool {
        self.path == path && self.is_deny()
    }

    /// True when `self` is consulted before `other`.
    pub fn is_higher_priority_than(&self, other: &Rule) -> bool {
        self.priority > other.priority
    }
}
