//! Search composites over the vector-store primitives.
//!
//! The store exposes three primitives (dense, sparse, hybrid) through
//! [`VectorSearch`]; everything smarter (cross-mode fusion, category
//! staging, minimum-inclusion guarantees) is built here so it works
//! identically against the HTTP store and the in-memory test fakes.

use std::collections::HashMap;
use std::sync::Arc;

use cp_domain::error::Result;

use crate::fusion::rrf_fuse;
use crate::item::RetrievedItem;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Primitives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Dense similarity only.
    Dense,
    /// Sparse (keyword) only.
    Sparse,
    /// Store-side hybrid of both vectors.
    Hybrid,
}

/// The retrieval seam. Implemented by [`crate::QdrantStore`] in
/// production and by scripted fakes in tests.
#[async_trait::async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>>;

    /// Sample distinct `metadata.category` values present in the
    /// collection, so staged search never filters on a value that does
    /// not exist.
    async fn sample_categories(&self, limit: usize) -> Result<Vec<String>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Staged query parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parameters for a staged category search.
#[derive(Debug, Clone)]
pub struct StagedQuery {
    pub query: String,
    pub final_k: usize,
    pub per_category_k: usize,
    pub categories: Vec<String>,
    /// Per-category fusion weights; categories not listed get 1.0.
    pub weights: HashMap<String, f64>,
    /// Minimum item counts per category in the final result.
    pub always_include: HashMap<String, usize>,
}

impl StagedQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            final_k: 10,
            per_category_k: 6,
            categories: ["marketing", "guideline", "principle", "terms"]
                .into_iter()
                .map(String::from)
                .collect(),
            weights: [
                ("marketing", 1.45),
                ("guideline", 1.15),
                ("principle", 1.05),
                ("terms", 1.0),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            always_include: [("terms".to_string(), 2)].into_iter().collect(),
        }
    }

    pub fn final_k(mut self, k: usize) -> Self {
        self.final_k = k;
        self
    }

    pub fn per_category_k(mut self, k: usize) -> Self {
        self.per_category_k = k;
        self
    }

    pub fn categories<I: IntoIterator<Item = S>, S: Into<String>>(mut self, cats: I) -> Self {
        self.categories = cats.into_iter().map(Into::into).collect();
        self
    }

    pub fn weights<I: IntoIterator<Item = (S, f64)>, S: Into<String>>(mut self, ws: I) -> Self {
        self.weights = ws.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    pub fn always_include<I: IntoIterator<Item = (S, usize)>, S: Into<String>>(
        mut self,
        mins: I,
    ) -> Self {
        self.always_include = mins.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Search composites bound to one collection.
pub struct SearchEngine {
    store: Arc<dyn VectorSearch>,
    existing_categories: Vec<String>,
}

impl SearchEngine {
    /// Connect to the store, sampling its categories once at startup.
    pub async fn connect(store: Arc<dyn VectorSearch>) -> Result<Self> {
        let existing_categories = store.sample_categories(250).await?;
        tracing::info!(categories = ?existing_categories, "retrieval engine ready");
        Ok(Self {
            store,
            existing_categories,
        })
    }

    /// Build an engine with a known category list (tests, warm restarts).
    pub fn with_categories(store: Arc<dyn VectorSearch>, categories: Vec<String>) -> Self {
        Self {
            store,
            existing_categories: categories,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.existing_categories
    }

    pub async fn semantic(
        &self,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        self.store.search(query, SearchMode::Dense, k, category).await
    }

    pub async fn keyword(
        &self,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        self.store.search(query, SearchMode::Sparse, k, category).await
    }

    pub async fn hybrid(
        &self,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        self.store.search(query, SearchMode::Hybrid, k, category).await
    }

    /// Fuse all three primitives for one (query, category) pair.
    /// Hybrid gets a small edge since it already blends both signals.
    pub async fn fused_search(
        &self,
        query: &str,
        final_k: usize,
        k_each: usize,
        category: Option<&str>,
    ) -> Result<Vec<RetrievedItem>> {
        let sem = self.semantic(query, k_each, category).await?;
        let kw = self.keyword(query, k_each, category).await?;
        let hy = self.hybrid(query, k_each, category).await?;
        Ok(rrf_fuse(&[sem, kw, hy], &[1.0, 1.0, 1.2], final_k))
    }

    /// Staged category search: fused search per category, fused again
    /// across categories with per-category weights, then minimum-inclusion
    /// enforcement for the categories named in `always_include`.
    ///
    /// Categories missing from the collection are dropped up front; when
    /// none survive the search degrades to a single unfiltered fusion.
    pub async fn staged_category_search(&self, q: &StagedQuery) -> Result<Vec<RetrievedItem>> {
        let cats: Vec<&String> = q
            .categories
            .iter()
            .filter(|c| self.existing_categories.contains(*c))
            .collect();

        if cats.is_empty() {
            return self
                .fused_search(&q.query, q.final_k, q.per_category_k.max(6), None)
                .await;
        }

        let mut per_category = Vec::with_capacity(cats.len());
        let mut weights = Vec::with_capacity(cats.len());
        for cat in &cats {
            per_category.push(
                self.fused_search(&q.query, q.per_category_k, q.per_category_k, Some(cat.as_str()))
                    .await?,
            );
            weights.push(q.weights.get(cat.as_str()).copied().unwrap_or(1.0));
        }

        // The pool is widened by the inclusion floor so the forced
        // minimums are still present even when final_k is small.
        let floor: usize = q.always_include.values().sum();
        let merged = rrf_fuse(&per_category, &weights, q.final_k + floor);

        // Force the minimum counts to the front, then fill from the
        // merged ranking, deduplicating as we go.
        let mut forced: Vec<&RetrievedItem> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for (cat, n) in &q.always_include {
            if !self.existing_categories.contains(cat) {
                continue;
            }
            for item in merged.iter().filter(|i| i.category() == cat.as_str()).take(*n) {
                let key = item.dedupe_key();
                if !seen.contains(&key) {
                    seen.push(key);
                    forced.push(item);
                }
            }
        }

        let mut final_items: Vec<RetrievedItem> = Vec::new();
        let mut final_seen: Vec<String> = Vec::new();
        for item in forced.into_iter().chain(merged.iter()) {
            let key = item.dedupe_key();
            if final_seen.contains(&key) {
                continue;
            }
            final_seen.push(key);
            final_items.push(item.clone());
            if final_items.len() >= q.final_k {
                break;
            }
        }

        for (i, item) in final_items.iter_mut().enumerate() {
            item.doc_id = format!("DOC{}", i + 1);
        }
        Ok(final_items)
    }
}
