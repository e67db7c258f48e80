use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AuditError, AuditResult};

/// Cooperative cancellation flag shared between a refresh and whoever may abort it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    /// Token that observes `self` but can also be cancelled on its own.
    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.flag.clone());
        CancelToken { flag: Arc::new(AtomicBool::new(false)), ancestors }
    }

    pub fn cancel(&self) { self.flag.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.ancestors.iter().any(|a| a.load(Ordering::SeqCst))
    }

    pub fn check(&self) -> AuditResult<()> {
        if self.is_cancelled() { Err(AuditError::Cancelled) } else { Ok(()) }
    }
}
