//! Policy model: a named set of compiled rules ordered most-specific first,
//! and the allow/deny evaluation run against concrete secret paths.

pub mod pattern;
pub mod rule;

pub use pattern::{compile, matches, PathMatcher};
pub use rule::{Capability, PriorityKey, RawRule, Rule};

use serde::Serialize;

use crate::error::AuditResult;

#[derive(Debug, Clone, Serialize)]
pub struct Policy {
    name: String,
    rules: Vec<Rule>,
}

impl Policy {
    /// Sorts `rules` by descending priority. The sort is stable, so duplicate
    /// patterns keep their document order.
    pub fn new(name: impl Into<String>, mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority_key().cmp(a.priority_key()));
        Policy { name: name.into(), rules }
    }

    /// Compile every raw rule; the first invalid pattern rejects the whole policy.
    pub fn compile(name: impl Into<String>, raw: &[RawRule]) -> AuditResult<Self> {
        let rules = raw.iter().map(Rule::from_raw).collect::<AuditResult<Vec<_>>>()?;
        Ok(Policy::new(name, rules))
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn rules(&self) -> &[Rule] { &self.rules }
    pub fn rule_count(&self) -> usize { self.rules.len() }

    /// Walk rules in priority order. The first rule that grants decides `true`;
    /// a `deny` rule whose pattern is literally `path` decides `false`.
    pub fn evaluate(&self, path: &str) -> bool {
        for rule in self.rules.iter() {
            if rule.grants(path) {
                return true;
            }
            if rule.denies_exactly(path) {
                return false;
            }
        }
        false
    }

    pub fn contains_deny(&self) -> bool {
        self.rules.iter().any(Rule::is_deny)
    }

    /// Render in the store's policy syntax, one `path` block per rule.
    pub fn to_hcl(&self) -> String {
        let mut out = String::new();
        for rule in self.rules.iter() {
            let caps = rule
                .capabilities()
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("path \"{}\" {{\n  capabilities = [{}]\n}}\n\n", rule.path(), caps));
        }
        out
    }
}

pub fn compile_policy(name: impl Into<String>, raw: &[RawRule]) -> AuditResult<Policy> {
    Policy::compile(name, raw)
}
