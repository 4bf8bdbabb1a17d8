//! No-op store used when no vector store is configured.
//!
//! Keeps the pipelines runnable in environments without retrieval: every
//! search returns empty and the generate nodes work without evidence.

use cp_domain::error::Result;

use crate::engine::{SearchMode, VectorSearch};
use crate::item::RetrievedItem;

pub struct OfflineStore;

#[async_trait::async_trait]
impl VectorSearch for OfflineStore {
    async fn search(
        &self,
        _query: &str,
        _mode: SearchMode,
        _k: usize,
        _category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        Ok(Vec::new())
    }

    async fn sample_categories(&self, _limit: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
