use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vector store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the remote vector store backing the retrieval client.
///
/// The collection is expected to carry `metadata.category` payloads and
/// two named vectors (`dense`, `sparse`) so the client can run dense-only,
/// sparse-only and hybrid queries against the same points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub url: String,
    /// Environment variable holding the store API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_collection")]
    pub collection: String,
    #[serde(default = "d_dense")]
    pub dense_vector: String,
    #[serde(default = "d_sparse")]
    pub sparse_vector: String,
    /// Payload key used for category filtering.
    #[serde(default = "d_category_key")]
    pub category_key: String,
    /// Server-side inference model for the dense vector.
    #[serde(default = "d_dense_model")]
    pub dense_model: String,
    /// Server-side inference model for the sparse vector.
    #[serde(default = "d_sparse_model")]
    pub sparse_model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "d_timeout")]
    pub timeout_sec: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key_env: d_api_key_env(),
            collection: d_collection(),
            dense_vector: d_dense(),
            sparse_vector: d_sparse(),
            category_key: d_category_key(),
            dense_model: d_dense_model(),
            sparse_model: d_sparse_model(),
            timeout_sec: d_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_api_key_env() -> String {
    "VECTOR_STORE_API_KEY".into()
}
fn d_collection() -> String {
    "cs_guideline".into()
}
fn d_dense() -> String {
    "dense".into()
}
fn d_sparse() -> String {
    "sparse".into()
}
fn d_category_key() -> String {
    "metadata.category".into()
}
fn d_dense_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".into()
}
fn d_sparse_model() -> String {
    "Qdrant/bm25".into()
}
fn d_timeout() -> u64 {
    15
}
