//! Memory API — search, ingest, and document introspection over the
//! in-process hybrid (lexical + vector) store (see [`wd_memory`]).

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use wd_domain::memory::MemoryScope;
use wd_memory::{hybrid_search, MemoryContextBuilder};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> impl IntoResponse {
    let limit = body.limit.unwrap_or(10);
    match hybrid_search(&state.memory, &body.query, limit, body.user_id.as_deref()).await {
        Ok(hits) => {
            let rendered = MemoryContextBuilder::new(8000).build(&hits);
            let results: Vec<_> = hits
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "chunk_id": h.chunk.id,
                        "path": h.chunk.path,
                        "source": h.chunk.source,
                        "score": h.score,
                        "personal": h.personal,
                        "text": h.chunk.text,
                    })
                })
                .collect();
            Json(serde_json::json!({
                "query": body.query,
                "count": results.len(),
                "results": results,
                "context": rendered,
            }))
            .into_response()
        }
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> impl IntoResponse {
    let scope = match body.scope.as_deref() {
        Some("personal") => MemoryScope::Personal,
        _ => MemoryScope::Global,
    };
    let source = body.source.unwrap_or_else(|| "api".into());
    let size = body.content.len() as u64;

    match state
        .memory
        .ingest_document(&body.path, &source, scope, body.user_id, &body.content, size)
        .await
    {
        Ok(Some(n)) => Json(serde_json::json!({ "chunks_indexed": n })).into_response(),
        Ok(None) => Json(serde_json::json!({ "chunks_indexed": 0, "note": "content unchanged, skipped" })).into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn about_user(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "document_count": state.memory.document_count(),
        "chunk_count": state.memory.chunk_count(),
        "has_embedder": state.memory.has_embedder(),
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "document_count": state.memory.document_count(),
        "chunk_count": state.memory.chunk_count(),
    }))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<IngestBody>,
) -> impl IntoResponse {
    let scope = match body.scope.as_deref() {
        Some("personal") => MemoryScope::Personal,
        _ => MemoryScope::Global,
    };
    let source = body.source.unwrap_or_else(|| "api".into());
    let size = body.content.len() as u64;

    match state
        .memory
        .ingest_document(&path, &source, scope, body.user_id, &body.content, size)
        .await
    {
        Ok(n) => Json(serde_json::json!({ "chunks_indexed": n.unwrap_or(0) })).into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn delete_entry(State(state): State<AppState>, Path(path): Path<String>) -> impl IntoResponse {
    let removed = state.memory.delete_path(&path);
    Json(serde_json::json!({ "deleted_chunks": removed }))
}
