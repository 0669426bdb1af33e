use async_trait::async_trait;

use crate::error::RetrieverError;

/// `Embed`/`EmbedSingle`/`Dimension`/`Name` per §6.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError>;

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, RetrieverError> {
        let mut out = self.embed(std::slice::from_ref(&text.to_string())).await?;
        Ok(out.pop().unwrap_or_default())
    }

    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}
