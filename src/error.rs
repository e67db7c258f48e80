//! Error model for policy loading, tree enumeration and refresh cycles.
//! Only `Cancelled`, `DeadlineExceeded` and `Outage` abort a refresh; every other
//! variant is isolated to one policy or one subtree and surfaces as a `RefreshIssue`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditError {
    /// Nothing stored at `path`. Callers treat this as zero children.
    #[error("nothing stored at {path}")]
    NotFound { path: String },
    /// Network, auth or listing failure against the backing store.
    #[error("backend error at {scope}: {message}")]
    Backend { scope: String, message: String },
    #[error("policy {policy} could not be decoded: {message}")]
    MalformedPolicyDocument { policy: String, message: String },
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("refresh cancelled")]
    Cancelled,
    #[error("refresh exceeded its deadline of {after_ms}ms")]
    DeadlineExceeded { after_ms: u64 },
    #[error("backend unavailable: {message}")]
    Outage { message: String },
}

impl AuditError {
    pub fn not_found<S: Into<String>>(path: S) -> Self { AuditError::NotFound { path: path.into() } }
    pub fn backend<S: Into<String>, M: Into<String>>(scope: S, message: M) -> Self {
        AuditError::Backend { scope: scope.into(), message: message.into() }
    }
    pub fn malformed<S: Into<String>, M: Into<String>>(policy: S, message: M) -> Self {
        AuditError::MalformedPolicyDocument { policy: policy.into(), message: message.into() }
    }
    pub fn invalid_pattern<S: Into<String>, M: Into<String>>(pattern: S, reason: M) -> Self {
        AuditError::InvalidPattern { pattern: pattern.into(), reason: reason.into() }
    }
    pub fn outage<M: Into<String>>(message: M) -> Self { AuditError::Outage { message: message.into() } }

    pub fn code_str(&self) -> &'static str {
        match self {
            AuditError::NotFound { .. } => "not_found",
            AuditError::Backend { .. } => "transient_backend_error",
            AuditError::MalformedPolicyDocument { .. } => "malformed_policy_document",
            AuditError::InvalidPattern { .. } => "invalid_pattern",
            AuditError::Cancelled => "cancelled",
            AuditError::DeadlineExceeded { .. } => "deadline_exceeded",
            AuditError::Outage { .. } => "outage",
        }
    }

    /// True when the whole refresh must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::Cancelled | AuditError::DeadlineExceeded { .. } | AuditError::Outage { .. })
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

/// What an isolated failure was attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum IssueScope {
    Policy(String),
    Subtree(String),
}

impl std::fmt::Display for IssueScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueScope::Policy(name) => write!(f, "policy:{}", name),
            IssueScope::Subtree(path) => write!(f, "subtree:{}", path),
        }
    }
}

/// A failure that was isolated instead of aborting the refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshIssue {
    pub scope: IssueScope,
    pub code: String,
    pub message: String,
}

impl RefreshIssue {
    pub fn new(scope: IssueScope, err: &AuditError) -> Self {
        Self { scope, code: err.code_str().to_string(), message: err.to_string() }
    }
}
