//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::{
    payload::{build_payload, current_timestamp_rfc3339, generate_point_id},
    types::{ChunkPoint, QdrantError, QueryPoint, QueryResponse, QueryResponseResult,
        RetrievedChunk},
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        let client = Client::builder().user_agent("fournil/0.1").build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Drop and re-create a collection so the index starts empty.
    ///
    /// The corpus is rebuilt from the document directory on every process start, so any
    /// points left over from a previous run are discarded here.
    pub async fn reset_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        self.delete_collection(collection_name).await?;
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Delete a collection; missing collections are not an error.
    pub async fn delete_collection(&self, collection_name: &str) -> Result<(), QdrantError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Failed to delete collection");
                Err(error)
            }
        }
    }

    /// Upload chunk vectors to the given collection. Each point receives a fresh UUID.
    pub async fn upsert_chunks(
        &self,
        collection_name: &str,
        points: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = points
            .iter()
            .map(|point| {
                json!({
                    "id": generate_point_id(),
                    "vector": point.vector,
                    "payload": build_payload(point, &now),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Chunks indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search, returning chunks inside the relevance gate.
    ///
    /// Qdrant reports cosine similarity; results are converted to distances
    /// (`1 - score`), anything at or beyond `max_distance` is dropped, and the
    /// survivors are ordered by ascending distance. An empty collection simply
    /// yields an empty vector.
    pub async fn search_chunks(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
        max_distance: f32,
    ) -> Result<Vec<RetrievedChunk>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let mut results: Vec<RetrievedChunk> = points
            .into_iter()
            .filter_map(map_query_point)
            .filter(|chunk| chunk.distance < max_distance)
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(results)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn map_query_point(point: QueryPoint) -> Option<RetrievedChunk> {
    let QueryPoint { id, score, payload } = point;
    let mut map = payload?;

    let text = match map.remove("text") {
        Some(Value::String(text)) if !text.trim().is_empty() => text,
        _ => return None,
    };
    let source = match map.remove("source") {
        Some(Value::String(source)) => Some(source),
        _ => None,
    };
    let chunk_index = map
        .remove("chunk_index")
        .and_then(|value| value.as_u64())
        .map(|value| value as usize);
    let label = match map.remove("chunk_label") {
        Some(Value::String(label)) => Some(label),
        _ => None,
    };

    Some(RetrievedChunk {
        id: stringify_point_id(id),
        distance: 1.0 - score,
        text,
        source,
        chunk_index,
        label,
    })
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use reqwest::Client;

    fn test_service(server: &MockServer) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("fournil-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn search_gates_results_by_distance_and_orders_ascending() {
        let server = MockServer::start_async().await;

        // Scores 0.9 / 0.5 / 0.75 map to distances 0.1 / 0.5 / 0.25; the middle one
        // falls outside the 0.4 gate.
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/recipes/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "chunk-1",
                            "score": 0.9,
                            "payload": { "text": "Flour and water", "source": "bread.txt", "chunk_index": 0, "chunk_label": "bread.txt_0" }
                        },
                        {
                            "id": "chunk-2",
                            "score": 0.5,
                            "payload": { "text": "Unrelated aside", "source": "bread.txt", "chunk_index": 3, "chunk_label": "bread.txt_3" }
                        },
                        {
                            "id": "chunk-3",
                            "score": 0.75,
                            "payload": { "text": "Knead the dough", "source": "bread.txt", "chunk_index": 1, "chunk_label": "bread.txt_1" }
                        }
                    ]
                }));
            })
            .await;

        let service = test_service(&server);
        let results = service
            .search_chunks("recipes", vec![0.1, 0.2], 5, 0.4)
            .await
            .expect("search request");

        mock.assert();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "chunk-1");
        assert_eq!(results[1].id, "chunk-3");
        assert!(results[0].distance <= results[1].distance);
        for chunk in &results {
            assert!(chunk.distance < 0.4);
        }
        assert_eq!(results[0].source.as_deref(), Some("bread.txt"));
        assert_eq!(results[1].chunk_index, Some(1));
    }

    #[tokio::test]
    async fn search_on_empty_collection_returns_empty_results() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/recipes/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": []
                }));
            })
            .await;

        let service = test_service(&server);
        let results = service
            .search_chunks("recipes", vec![0.1, 0.2], 5, 0.4)
            .await
            .expect("search request");

        mock.assert();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn upsert_skips_request_for_no_points() {
        let server = MockServer::start_async().await;
        let service = test_service(&server);

        let count = service
            .upsert_chunks("recipes", Vec::new())
            .await
            .expect("upsert");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn search_error_surfaces_status_and_body() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/recipes/points/query");
                then.status(500).body("boom");
            })
            .await;

        let service = test_service(&server);
        let error = service
            .search_chunks("recipes", vec![0.1], 5, 0.4)
            .await
            .unwrap_err();
        assert!(matches!(error, QdrantError::UnexpectedStatus { .. }));
        assert!(error.to_string().contains("boom"));
    }
}
