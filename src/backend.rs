//! Collaborator seams consumed by a refresh: policy listing/reading, hierarchy listing,
//! and decoding of a stored policy document into raw rules.

use std::future::Future;

use serde::Deserialize;

use crate::error::{AuditError, AuditResult};
use crate::policy::RawRule;

pub trait PolicySource: Send + Sync {
    /// Policy names in store order.
    fn list_policies(&self) -> impl Future<Output = AuditResult<Vec<String>>> + Send;
    fn read_policy_document(&self, name: &str) -> impl Future<Output = AuditResult<Vec<u8>>> + Send;
}

pub trait SecretLister: Send + Sync {
    /// Child names of `path` within `mount`, in listing order. Directories carry a
    /// trailing `/`. An empty or missing path yields `AuditError::NotFound`.
    fn list_children(&self, path: &str, mount: &str) -> impl Future<Output = AuditResult<Vec<String>>> + Send;
}

pub trait PolicyDecoder: Send + Sync {
    fn decode(&self, policy: &str, document: &[u8]) -> AuditResult<Vec<RawRule>>;
}

/// Decodes the JSON policy syntax:
/// `{"path": {"secret/foo": {"capabilities": ["read"]}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPolicyDecoder;

#[derive(Deserialize)]
struct JsonDocument {
    #[serde(default)]
    path: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonPathBlock {
    #[serde(default)]
    capabilities: Vec<String>,
}

impl PolicyDecoder for JsonPolicyDecoder {
    fn decode(&self, policy: &str, document: &[u8]) -> AuditResult<Vec<RawRule>> {
        let doc: JsonDocument = serde_json::from_slice(document)
            .map_err(|e| AuditError::malformed(policy, e.to_string()))?;
        let mut out = Vec::with_capacity(doc.path.len());
        for (pattern, block) in doc.path.into_iter() {
            let block: JsonPathBlock = serde_json::from_value(block)
                .map_err(|e| AuditError::malformed(policy, format!("path {:?}: {}", pattern, e)))?;
            out.push(RawRule { path: pattern, capabilities: block.capabilities });
        }
        Ok(out)
    }
}
