//! Text Embeddings
//!
//! Vector retrieval needs an embedding backend; both providers in this crate
//! can serve as one.

use async_trait::async_trait;
use relay_core::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
