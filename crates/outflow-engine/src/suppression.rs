//! The suppression filter: addresses excluded from any send.
//!
//! Consulted by the scheduler; entries are written by the (external)
//! verification subsystem through the store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use outflow_core::UserId;
use outflow_store::Store;

use crate::error::Result;

/// Read access to the suppression set for one user.
#[async_trait]
pub trait SuppressionFilter: Send + Sync {
    /// All suppressed emails visible to `user_id` (global + user-specific),
    /// normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    async fn list_suppressed(&self, user_id: &UserId) -> Result<HashSet<String>>;
}

/// Store-backed suppression filter.
pub struct StoreSuppressionFilter {
    store: Arc<dyn Store>,
}

impl StoreSuppressionFilter {
    /// Create a filter over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SuppressionFilter for StoreSuppressionFilter {
    async fn list_suppressed(&self, user_id: &UserId) -> Result<HashSet<String>> {
        Ok(self.store.suppressed_emails(user_id)?)
    }
}
