//! Qdrant Knowledge Base
//!
//! Per-user snippet store on top of Qdrant's REST API. Documents are embedded
//! on the way in; searches embed the query and filter on the `userId` payload
//! key so one customer never sees another's context.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    AgentError, Result,
    retriever::{ContextRetriever, DocumentStore, join_snippets},
};
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::http::{build_client, json_body, transport_error};

const SERVICE: &str = "Qdrant";

/// Qdrant connection settings
#[derive(Clone, Debug)]
pub struct QdrantConfig {
    /// REST endpoint
    pub url: String,

    /// Optional API key (sent as `api-key`)
    pub api_key: Option<String>,

    /// Collection holding customer snippets
    pub collection: String,

    /// Embedding dimension; must match the embedder
    pub vector_size: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            api_key: None,
            collection: "customer_data".into(),
            vector_size: 1536,
            timeout_secs: 30,
        }
    }
}

/// Vector-backed context retriever
pub struct QdrantKnowledgeBase {
    client: Client,
    config: QdrantConfig,
    embedder: Arc<dyn Embedder>,
}

impl QdrantKnowledgeBase {
    pub fn new(config: QdrantConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        json_body(SERVICE, response)
            .await
            .map_err(|e| AgentError::KnowledgeBase(e.to_string()))
    }

    /// Create the collection if it does not exist yet. Returns `true` when it
    /// was created by this call.
    pub async fn ensure_collection(&self) -> Result<bool> {
        let body = self.send(self.client.get(self.url("collections"))).await?;

        let exists = body["result"]["collections"]
            .as_array()
            .is_some_and(|cols| {
                cols.iter()
                    .any(|c| c["name"].as_str() == Some(self.config.collection.as_str()))
            });

        if exists {
            return Ok(false);
        }

        let path = format!("collections/{}", self.config.collection);
        self.send(self.client.put(self.url(&path)).json(&json!({
            "vectors": {
                "size": self.config.vector_size,
                "distance": "Cosine",
            }
        })))
        .await?;

        tracing::info!(collection = %self.config.collection, "Created vector collection");
        Ok(true)
    }

    async fn try_search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<String>> {
        let vector = self.embedder.embed(query).await?;

        let path = format!("collections/{}/points/search", self.config.collection);
        let body = self
            .send(self.client.post(self.url(&path)).json(&json!({
                "vector": vector,
                "filter": {
                    "must": [{ "key": "userId", "match": { "value": user_id } }]
                },
                "limit": limit,
                "with_payload": true,
            })))
            .await?;

        Ok(body["result"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit["payload"]["text"].as_str())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContextRetriever for QdrantKnowledgeBase {
    async fn search(&self, query: &str, user_id: &str, limit: usize) -> String {
        match self.try_search(query, user_id, limit).await {
            Ok(snippets) => join_snippets(snippets),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Context search failed");
                String::new()
            }
        }
    }
}

#[async_trait]
impl DocumentStore for QdrantKnowledgeBase {
    /// Embed and store a snippet for a user. Returns the new point id.
    async fn add_document(
        &self,
        user_id: &str,
        text: &str,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.config.vector_size {
            return Err(AgentError::KnowledgeBase(format!(
                "Embedding has {} dimensions, collection expects {}",
                vector.len(),
                self.config.vector_size
            )));
        }

        let mut payload = metadata;
        payload.insert("text".into(), json!(text));
        payload.insert("userId".into(), json!(user_id));
        payload.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));

        let id = Uuid::new_v4().to_string();
        let path = format!("collections/{}/points?wait=true", self.config.collection);
        self.send(self.client.put(self.url(&path)).json(&json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": payload,
            }]
        })))
        .await?;

        tracing::info!(user_id, point = %id, "Document added to knowledge base");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AgentError::ProviderUnavailable("embedder down".into()))
        }
    }

    fn knowledge_base(
        mock_server: &MockServer,
        embedder: Arc<dyn Embedder>,
    ) -> QdrantKnowledgeBase {
        QdrantKnowledgeBase::new(
            QdrantConfig {
                url: mock_server.uri(),
                api_key: Some("secret".into()),
                vector_size: 2,
                ..Default::default()
            },
            embedder,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_filters_by_user_and_joins() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/customer_data/points/search"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({
                "limit": 3,
                "filter": { "must": [{ "key": "userId", "match": { "value": "u-1" } }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {
                        "id": "a", "score": 0.9,
                        "payload": { "text": "Compró un portátil", "userId": "u-1" }
                    },
                    {
                        "id": "b", "score": 0.8,
                        "payload": { "text": "Vive en Madrid", "userId": "u-1" }
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.1, 0.2])));
        let context = kb.search("pedido", "u-1", 3).await;
        assert_eq!(context, "Compró un portátil\n\nVive en Madrid");
    }

    #[tokio::test]
    async fn test_search_swallows_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/customer_data/points/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.1, 0.2])));
        assert_eq!(kb.search("pedido", "u-1", 3).await, "");

        let kb = knowledge_base(&mock_server, Arc::new(BrokenEmbedder));
        assert_eq!(kb.search("pedido", "u-1", 3).await, "");
    }

    #[tokio::test]
    async fn test_search_no_hits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/customer_data/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.1, 0.2])));
        assert_eq!(kb.search("pedido", "u-1", 3).await, "");
    }

    #[tokio::test]
    async fn test_ensure_collection_creates_when_missing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "collections": [{ "name": "other" }] }
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/customer_data"))
            .and(body_partial_json(json!({ "vectors": { "size": 2, "distance": "Cosine" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.1, 0.2])));
        assert!(kb.ensure_collection().await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_collection_existing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "collections": [{ "name": "customer_data" }] }
            })))
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.1, 0.2])));
        assert!(!kb.ensure_collection().await.unwrap());
    }

    #[tokio::test]
    async fn test_add_document() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/customer_data/points"))
            .and(body_partial_json(json!({
                "points": [{
                    "vector": [0.5, 0.25],
                    "payload": { "text": "Cliente VIP", "userId": "u-1", "source": "crm" }
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": { "status": "completed" } })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.5, 0.25])));
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!("crm"));

        let id = kb.add_document("u-1", "Cliente VIP", metadata).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_add_document_dimension_mismatch() {
        let mock_server = MockServer::start().await;
        let kb = knowledge_base(&mock_server, Arc::new(FixedEmbedder(vec![0.5, 0.25, 0.1])));

        let err = kb.add_document("u-1", "texto", Map::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::KnowledgeBase(_)));
    }
}
