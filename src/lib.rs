pub mod error;
pub mod config;
pub mod cancel;
pub mod backend;
pub mod memory;
pub mod policy;
pub mod tree;
pub mod annotate;
pub mod refresh;

pub use annotate::{annotate, AnnotatedSecret, Annotation};
pub use backend::{JsonPolicyDecoder, PolicyDecoder, PolicySource, SecretLister};
pub use cancel::CancelToken;
pub use config::AuditConfig;
pub use error::{AuditError, AuditResult, IssueScope, RefreshIssue};
pub use memory::MemoryStore;
pub use policy::{compile_policy, Policy, RawRule, Rule};
pub use refresh::{Auditor, Snapshot};
pub use tree::{CompressedNode, DepthLimit, TreeNode};
