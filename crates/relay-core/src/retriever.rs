//! Context Retrieval
//!
//! Similarity search over stored per-user snippets. Implementations absorb
//! their own failures: a broken vector store means "no context", never an
//! aborted conversation. Writes go through [`DocumentStore`], which does
//! report its failures.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Number of snippets requested per message
pub const DEFAULT_CONTEXT_LIMIT: usize = 3;

/// Separator placed between retrieved snippets
pub const SNIPPET_SEPARATOR: &str = "\n\n";

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Return up to `limit` snippets relevant to `query` for `user_id`,
    /// joined with [`SNIPPET_SEPARATOR`]. Empty on no match or on failure.
    async fn search(&self, query: &str, user_id: &str, limit: usize) -> String;
}

/// Write side of the knowledge base
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `text` for `user_id` with extra payload fields. Returns the new
    /// document id.
    async fn add_document(
        &self,
        user_id: &str,
        text: &str,
        metadata: Map<String, Value>,
    ) -> Result<String>;
}

/// Join snippet texts the way every retriever reports them
pub fn join_snippets<I, S>(snippets: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    snippets
        .into_iter()
        .map(|s| s.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(SNIPPET_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_snippets() {
        assert_eq!(join_snippets(["a", "b", "c"]), "a\n\nb\n\nc");
        assert_eq!(join_snippets(Vec::<String>::new()), "");
    }
}
