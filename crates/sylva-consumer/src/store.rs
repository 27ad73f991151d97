//! HTTP graph store client speaking the SPARQL update protocol.
//!
//! Renders ground statements as N-Triples inside `DELETE DATA` /
//! `INSERT DATA` blocks against the configured update endpoint. Both
//! operations have set semantics server-side, which is what makes replay
//! after an aborted run convergent.

use std::time::Duration;

use async_trait::async_trait;

use sylva_core::{Error as CoreError, GraphStore, GraphUri, Result as CoreResult, Statement};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SPARQL_UPDATE_MEDIA_TYPE: &str = "application/sparql-update";

/// SPARQL-update-backed implementation of [`GraphStore`].
#[derive(Debug, Clone)]
pub struct SparqlGraphStore {
    endpoint: String,
    client: reqwest::Client,
}

impl SparqlGraphStore {
    /// Creates a client targeting the given SPARQL update endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    async fn execute(&self, update: String) -> CoreResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, SPARQL_UPDATE_MEDIA_TYPE)
            .body(update)
            .send()
            .await
            .map_err(|e| {
                CoreError::store_with_source(
                    format!("sparql update request to {} failed", self.endpoint),
                    e,
                )
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(CoreError::store(format!(
            "sparql update rejected ({status}): {}",
            body.trim()
        )))
    }
}

/// Builds a `DELETE DATA` or `INSERT DATA` update for ground statements in
/// a named graph.
fn update_data_query(operation: &str, statements: &[Statement], graph: &GraphUri) -> String {
    let mut query = String::new();
    query.push_str(operation);
    query.push_str(" DATA {\n  GRAPH <");
    query.push_str(graph.as_str());
    query.push_str("> {\n");
    for statement in statements {
        query.push_str("    ");
        query.push_str(&statement.to_string());
        query.push('\n');
    }
    query.push_str("  }\n}");
    query
}

#[async_trait]
impl GraphStore for SparqlGraphStore {
    async fn delete(&self, statements: &[Statement], graph: &GraphUri) -> CoreResult<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.execute(update_data_query("DELETE", statements, graph))
            .await
    }

    async fn insert(&self, statements: &[Statement], graph: &GraphUri) -> CoreResult<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.execute(update_data_query("INSERT", statements, graph))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use sylva_core::Term;

    fn statements() -> Vec<Statement> {
        vec![
            Statement::new(
                "http://example.org/s1",
                "http://example.org/p1",
                Term::named_node("http://example.org/o1"),
            ),
            Statement::new(
                "http://example.org/s2",
                "http://example.org/p2",
                Term::lang_literal("une \"citation\"", "fr"),
            ),
        ]
    }

    #[test]
    fn insert_update_renders_graph_block() {
        let query = update_data_query(
            "INSERT",
            &statements(),
            &GraphUri::new("http://example.org/graphs/landing"),
        );

        assert!(query.starts_with("INSERT DATA {"));
        assert!(query.contains("GRAPH <http://example.org/graphs/landing> {"));
        assert!(query.contains(
            "<http://example.org/s1> <http://example.org/p1> <http://example.org/o1> ."
        ));
        // Literal escaping survives into the update body.
        assert!(query.contains("\"une \\\"citation\\\"\"@fr"));
    }

    #[test]
    fn delete_update_uses_delete_keyword() {
        let query = update_data_query(
            "DELETE",
            &statements(),
            &GraphUri::new("http://example.org/graphs/landing"),
        );
        assert!(query.starts_with("DELETE DATA {"));
    }

    async fn spawn_capture_server() -> (String, Arc<Mutex<Vec<String>>>) {
        use axum::extract::State;
        use axum::routing::post;
        use axum::Router;

        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/sparql",
                post(|State(captured): State<Arc<Mutex<Vec<String>>>>, body: String| async move {
                    captured.lock().expect("lock").push(body);
                    axum::http::StatusCode::OK
                }),
            )
            .with_state(Arc::clone(&captured));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}/sparql"), captured)
    }

    #[tokio::test]
    async fn updates_are_posted_to_the_endpoint() {
        let (endpoint, captured) = spawn_capture_server().await;
        let store = SparqlGraphStore::new(endpoint);
        let graph = GraphUri::new("http://example.org/graphs/landing");

        store.insert(&statements(), &graph).await.expect("insert");
        store.delete(&statements(), &graph).await.expect("delete");

        let captured = captured.lock().expect("lock");
        assert_eq!(captured.len(), 2);
        assert!(captured[0].starts_with("INSERT DATA"));
        assert!(captured[1].starts_with("DELETE DATA"));
    }

    #[tokio::test]
    async fn empty_batches_skip_the_network() {
        // No server at this endpoint: an accidental request would error.
        let store = SparqlGraphStore::new("http://127.0.0.1:9/sparql");
        let graph = GraphUri::new("http://example.org/graphs/landing");

        store.insert(&[], &graph).await.expect("insert");
        store.delete(&[], &graph).await.expect("delete");
    }

    #[tokio::test]
    async fn rejected_update_surfaces_status_and_body() {
        use axum::routing::post;
        use axum::Router;

        let app = Router::new().route(
            "/sparql",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "parse error") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let store = SparqlGraphStore::new(format!("http://{addr}/sparql"));
        let graph = GraphUri::new("http://example.org/graphs/landing");
        let err = store.insert(&statements(), &graph).await.unwrap_err();

        let CoreError::Store { message, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("400"));
        assert!(message.contains("parse error"));
    }
}
