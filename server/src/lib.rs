use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use search_core::builder::{build, parse_doc_id, BuildOptions, DEFAULT_BATCH_SIZE};
use search_core::persist::{load_index, save_index, IndexPaths};
use search_core::query::{evaluate, parse_limit, NormalizedLookup, QueryMode};
use search_core::store::{DocumentStore, NewDocument};
use search_core::{DocId, InvertedIndex, SearchError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything the router needs, collected by the binary from flags and env.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    pub store_path: Option<PathBuf>,
    pub batch_size: usize,
    pub admin_token: Option<String>,
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            store_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            admin_token: None,
            cors_allow_origin: None,
        }
    }

    /// Fill `admin_token` and `cors_allow_origin` from `ADMIN_TOKEN` and
    /// `CORS_ALLOW_ORIGIN`.
    pub fn with_env(mut self) -> Self {
        self.admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        self.cors_allow_origin = std::env::var("CORS_ALLOW_ORIGIN").ok();
        self
    }
}

/// The index currently being served. Swapped wholesale on rebuild; readers
/// clone the inner `Arc` and never hold the lock while evaluating.
pub type LiveIndex = Arc<RwLock<Option<Arc<InvertedIndex>>>>;

#[derive(Clone)]
pub struct AppState {
    pub index: LiveIndex,
    pub store: Option<Arc<DocumentStore>>,
    pub index_paths: IndexPaths,
    pub batch_size: usize,
    pub admin_token: Option<String>,
}

impl AppState {
    fn current_index(&self) -> Result<Arc<InvertedIndex>, ApiError> {
        self.index.read().clone().ok_or_else(|| SearchError::IndexNotLoaded.into())
    }

    fn store(&self) -> Result<&Arc<DocumentStore>, ApiError> {
        self.store
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable("store_not_configured", "no document store configured".into()))
    }
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    let store = match &config.store_path {
        Some(path) => Some(Arc::new(DocumentStore::open(path)?)),
        None => None,
    };
    build_app_with_store(config, store)
}

/// Like [`build_app`], but with an already opened store.
pub fn build_app_with_store(config: ServerConfig, store: Option<Arc<DocumentStore>>) -> Result<Router> {
    let index_paths = IndexPaths::new(&config.index_dir);
    let index = if index_paths.exists() {
        let index = load_index(&index_paths)?;
        tracing::info!(num_docs = index.doc_count, num_terms = index.term_count(), "index loaded");
        Some(Arc::new(index))
    } else {
        tracing::warn!(dir = %config.index_dir.display(), "no index found; /search is unavailable until a rebuild");
        None
    };

    let state = AppState {
        index: Arc::new(RwLock::new(index)),
        store,
        index_paths,
        batch_size: config.batch_size,
        admin_token: config.admin_token.clone(),
    };
    Ok(router(state, cors_layer(config.cors_allow_origin.as_deref())))
}

fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let any = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let Some(val) = allow_origin else { return any };
    let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
    if origins.is_empty() {
        any
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "ok": true })) }))
        .route("/search", get(search_handler))
        .route("/documents", post(create_document))
        .route("/documents/batch", post(create_documents_batch))
        .route("/documents/:id", get(get_document))
        .route("/index/rebuild", post(rebuild_index))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    NotFound,
    Unauthorized(String),
    Unavailable(&'static str, String),
    Internal(String),
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::InvalidMode(_) => Self::BadRequest("invalid_mode", "mode must be and|or".into()),
            SearchError::InvalidLimit(_) => {
                Self::BadRequest("invalid_limit", "limit must be a non-negative integer".into())
            }
            SearchError::MalformedDocId(_) => Self::BadRequest("invalid_id", err.to_string()),
            SearchError::IndexNotLoaded => Self::Unavailable("index_not_loaded", err.to_string()),
            e if e.is_validation() => Self::BadRequest("bad_request", err.to_string()),
            _ => {
                tracing::error!(error = %err, "request failed");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(code, msg) => (StatusCode::BAD_REQUEST, code, msg),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found", "not found".to_string()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Unavailable(code, msg) => (StatusCode::SERVICE_UNAVAILABLE, code, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_server_error", msg),
        };
        (status, Json(serde_json::json!({ "error": code, "message": message }))).into_response()
    }
}

// --- Search ---

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub mode: Option<String>,
    pub limit: Option<String>,
    pub include: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub q: String,
    pub mode: QueryMode,
    pub terms: Vec<String>,
    pub count: usize,
    pub doc_ids: Vec<DocId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchHit>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub doc_id: DocId,
    pub snippet: Option<String>,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let mode = QueryMode::from_param(params.mode.as_deref())?;
    let limit = parse_limit(params.limit.as_deref())?;
    let index = state.current_index()?;

    let query = search_core::Query::parse(&params.q, mode, limit);
    let result = evaluate(&query, &NormalizedLookup::new(&index));

    let results = if params.include.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("snippet")) {
        let mut hits = Vec::with_capacity(result.doc_ids.len());
        for &doc_id in &result.doc_ids {
            let text = match &state.store {
                Some(store) => store.get(doc_id).map_err(ApiError::from)?.map(|d| d.content),
                None => None,
            };
            let snippet = text.and_then(|t| snippet_for(&t, &result.terms));
            hits.push(SearchHit { doc_id, snippet });
        }
        Some(hits)
    } else {
        None
    };

    Ok(Json(SearchResponse {
        q: params.q,
        mode: result.mode,
        count: result.doc_ids.len(),
        terms: result.terms,
        doc_ids: result.doc_ids,
        results,
    }))
}

const SNIPPET_BEFORE: usize = 40;
const SNIPPET_AFTER: usize = 80;

/// Window around the earliest case-insensitive occurrence of any term.
pub fn snippet_for(text: &str, terms: &[String]) -> Option<String> {
    let (idx, term) = terms
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| find_case_insensitive(text, t).map(|i| (i, t)))
        .min_by_key(|(i, _)| *i)?;

    let start = floor_char_boundary(text, idx.saturating_sub(SNIPPET_BEFORE));
    let end = ceil_char_boundary(text, idx + term.len() + SNIPPET_AFTER);
    Some(text[start..end].to_string())
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        let mut rest = haystack[i..].chars().flat_map(char::to_lowercase);
        needle.iter().all(|c| rest.next() == Some(*c))
    })
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while !s.is_char_boundary(i) { i -= 1; }
    i
}

fn ceil_char_boundary(s: &str, i: usize) -> usize {
    let mut i = i.min(s.len());
    while !s.is_char_boundary(i) { i += 1; }
    i
}

// --- Documents ---

pub async fn get_document(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_doc_id(&raw_id)?;
    match state.store()?.get(id)? {
        Some(doc) => Ok(Json(serde_json::json!({ "document": doc }))),
        None => Err(ApiError::NotFound),
    }
}

async fn create_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(doc): Json<NewDocument>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(&state, &headers)?;
    let stored = state.store()?.insert(doc)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "document": stored }))))
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(alias = "docs")]
    documents: Vec<NewDocument>,
}

async fn create_documents_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BatchBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(&state, &headers)?;
    let stored = state.store()?.insert_batch(body.documents)?;
    let count = stored.len();
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "documents": stored, "count": count }))))
}

// --- Index admin ---

/// Rebuild from the store, persist, then swap the live index. On any failure
/// the previous index keeps serving.
async fn rebuild_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let store = state.store()?.clone();
    let paths = state.index_paths.clone();
    let options = BuildOptions::default().with_batch_size(state.batch_size);

    let index = tokio::task::spawn_blocking(move || -> Result<InvertedIndex, SearchError> {
        let index = build(&*store, &options)?;
        save_index(&paths, &index)?;
        Ok(index)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let body = serde_json::json!({ "docCount": index.doc_count, "termCount": index.term_count() });
    *state.index.write() = Some(Arc::new(index));
    tracing::info!(%body, "live index replaced");
    Ok(Json(body))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}
