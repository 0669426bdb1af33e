use async_trait::async_trait;

use crate::error::RetrieverError;

/// Optional reranking pass over retrieved candidates. Not invoked by the
/// default `Retriever::search` path in §4.4, but exposed as a port so a
/// concrete deployment can plug one in ahead of quality boosting.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<(String, String)>) -> Result<Vec<(String, f64)>, RetrieverError>;
}
