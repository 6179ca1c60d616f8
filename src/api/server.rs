//! HTTP API server with SSE support

use super::events::{Event, EventBroadcaster};
use crate::error::CalliopeError;
use crate::highlight::{display_content, DisplayFragment};
use crate::pipeline::GenerationOrchestrator;
use crate::storage::{ContentStore, UserEdit};
use crate::types::{
    AnnotationContext, ContentId, ContentItem, GenerationSpec, HighlightStatus, LifecycleStatus,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive},
        IntoResponse, Sse,
    },
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio_stream::{wrappers::BroadcastStream, StreamExt as _};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Whether item views use annotated markup when available
    pub highlights_enabled: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 3000).into(),
            event_capacity: 1000,
            highlights_enabled: true,
        }
    }
}

/// API server state
#[derive(Clone)]
struct AppState {
    /// Content store
    store: Arc<dyn ContentStore>,
    /// Generation and annotation driver
    orchestrator: Arc<GenerationOrchestrator>,
    /// Event broadcaster
    events: EventBroadcaster,
    /// Display gate for annotated views
    highlights_enabled: bool,
}

/// Error wrapper mapping pipeline errors onto HTTP statuses
#[derive(Debug)]
struct ApiError(CalliopeError);

impl From<CalliopeError> for ApiError {
    fn from(e: CalliopeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            CalliopeError::ContentNotFound(_) => StatusCode::NOT_FOUND,
            CalliopeError::InvalidContentId(_) | CalliopeError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            CalliopeError::AlreadyExists(_) => StatusCode::CONFLICT,
            CalliopeError::AgentApi(_) | CalliopeError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_id(raw: &str) -> Result<ContentId, ApiError> {
    ContentId::from_string(raw).map_err(|e| ApiError(CalliopeError::InvalidContentId(e)))
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create new API server around an assembled pipeline
    pub fn new(
        config: ApiServerConfig,
        store: Arc<dyn ContentStore>,
        orchestrator: Arc<GenerationOrchestrator>,
        events: EventBroadcaster,
    ) -> Self {
        let state = AppState {
            store,
            orchestrator,
            events,
            highlights_enabled: config.highlights_enabled,
        };
        Self { config, state }
    }

    /// Get event broadcaster
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.state.events
    }

    /// Build the router; public so tests can drive it without a socket
    pub fn router(&self) -> Router {
        Router::new()
            // Content lifecycle
            .route("/content/generate", post(generate_handler))
            .route("/content", get(list_content_handler))
            .route("/content/:id", get(get_content_handler))
            .route("/content/:id", put(save_content_handler))
            .route("/content/:id/refine", post(refine_handler))
            .route("/content/:id/annotate", post(annotate_handler))
            .route("/content/:id/approve", post(approve_handler))
            // Event streaming
            .route("/events", get(events_handler))
            // Health check
            .route("/health", get(health_handler))
            // State
            .with_state(self.state.clone())
            // Middleware
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the process stops
    pub async fn serve(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;
        info!("Content API listening on http://{}", self.config.addr);
        axum::serve(listener, router).await?;
        Ok(())
    }
}

/// Generate handler: draft a new item and start its annotation pass
async fn generate_handler(
    State(state): State<AppState>,
    Json(spec): Json<GenerationSpec>,
) -> ApiResult<(StatusCode, Json<ContentItem>)> {
    let item = state.orchestrator.generate(spec).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Refine handler: revise an item against feedback
#[derive(Debug, Deserialize)]
struct RefineRequest {
    instruction: String,
    #[serde(default)]
    context: AnnotationContext,
}

async fn refine_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RefineRequest>,
) -> ApiResult<Json<ContentItem>> {
    let id = parse_id(&id)?;
    let item = state
        .orchestrator
        .refine(id, &req.instruction, req.context)
        .await?;
    Ok(Json(item))
}

/// Annotate handler: start a fresh annotation job
#[derive(Debug, Default, Deserialize)]
struct AnnotateRequest {
    #[serde(default)]
    context: AnnotationContext,
}

async fn annotate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<AnnotateRequest>>,
) -> ApiResult<(StatusCode, Json<ContentItem>)> {
    let id = parse_id(&id)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let item = state.orchestrator.request_annotation(id, req.context).await?;
    Ok((StatusCode::ACCEPTED, Json(item)))
}

/// Item view: the stored fields plus the decoded display form
#[derive(Debug, Serialize)]
struct ContentView {
    #[serde(flatten)]
    item: ContentItem,
    display: DisplayFragment,
}

async fn get_content_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContentView>> {
    let id = parse_id(&id)?;
    let item = state.store.get(id).await?;
    let display = display_content(&item, state.highlights_enabled);
    Ok(Json(ContentView { item, display }))
}

async fn list_content_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let items = state.store.list().await?;
    Ok(Json(items))
}

/// Save handler: persist a user edit, invalidating annotations
#[derive(Debug, Deserialize)]
struct SaveContentRequest {
    content: String,
    #[serde(default)]
    structured_content: Option<serde_json::Value>,
    #[serde(default)]
    lifecycle_status: Option<LifecycleStatus>,
}

async fn save_content_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SaveContentRequest>,
) -> ApiResult<Json<ContentItem>> {
    let id = parse_id(&id)?;
    let edit = UserEdit {
        content: req.content,
        structured_content: req.structured_content,
        lifecycle_status: req.lifecycle_status,
    };
    let item = state.store.save_user_edit(id, edit).await?;
    let _ = state.events.broadcast(Event::content_saved(id));
    Ok(Json(item))
}

/// Approve handler
///
/// With a body, the content is saved first (user-edit semantics) so whatever
/// the reviewer sees is what gets approved. Without one, only the lifecycle
/// moves.
async fn approve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<SaveContentRequest>>,
) -> ApiResult<Json<ContentItem>> {
    let id = parse_id(&id)?;
    let item = match body {
        Some(Json(req)) => {
            let edit = UserEdit {
                content: req.content,
                structured_content: req.structured_content,
                lifecycle_status: Some(LifecycleStatus::Approved),
            };
            state.store.save_user_edit(id, edit).await?
        }
        None => {
            state
                .store
                .set_lifecycle(id, LifecycleStatus::Approved)
                .await?
        }
    };
    let _ = state.events.broadcast(Event::content_approved(id));
    Ok(Json(item))
}

/// SSE events handler
///
/// Provides a snapshot for late-connecting clients:
/// 1. Immediately replays synthetic events for annotation jobs still in flight
/// 2. Then streams real-time events
async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    debug!("New SSE client connected, sending state snapshot");

    // Synthetic events for jobs the client would otherwise never hear about
    let mut snapshot_events = Vec::new();
    if let Ok(items) = state.store.list().await {
        for item in items {
            if item.highlighting_status == HighlightStatus::InProgress {
                let event = Event::annotation_started(item.id, item.annotation_epoch);
                if let Ok(data) = serde_json::to_string(&event) {
                    snapshot_events.push(Ok(SseEvent::default().data(data).id(event.id)));
                }
            }
        }
    }

    debug!("Sending {} snapshot events to new client", snapshot_events.len());

    // Subscribe to live event stream
    let rx = state.events.subscribe();
    let live_stream = BroadcastStream::new(rx);

    let live_event_stream = live_stream.filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).ok()?;
            Some(Ok(SseEvent::default().data(data).id(event.id)))
        }
        Err(_) => None, // Skip lagged messages
    });

    // Combine snapshot + live events
    let snapshot_stream = tokio_stream::iter(snapshot_events);
    let combined_stream = snapshot_stream.chain(live_event_stream);

    Sse::new(combined_stream).keep_alive(KeepAlive::default())
}

/// Health check handler
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    subscribers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.events.subscriber_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AnnotatorService, CompletionBackend};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, _prompt: &str) -> crate::error::Result<String> {
            Ok(r#"{"content": "drafted"}"#.to_string())
        }
    }

    fn test_state() -> AppState {
        let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
        let backend = Arc::new(EchoBackend);
        let events = EventBroadcaster::default();
        let annotator = Arc::new(AnnotatorService::new(backend.clone()));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            store.clone(),
            backend,
            annotator,
            events.clone(),
        ));
        AppState {
            store,
            orchestrator,
            events,
            highlights_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.0.status, "ok");
    }

    #[tokio::test]
    async fn test_get_returns_view_with_display() {
        let state = test_state();
        let mut item = ContentItem::new("Meet the VP".to_string(), None);
        item.highlighted_markup = Some("Meet the <persona>VP</persona>".to_string());
        item.highlighting_status = HighlightStatus::Completed;
        let stored = state.store.insert(item).await.unwrap();

        let view = get_content_handler(State(state), Path(stored.id.to_string()))
            .await
            .unwrap();
        assert_eq!(view.0.item.raw_content, "Meet the VP");
        assert_eq!(view.0.display.spans.len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_item_maps_to_not_found() {
        let err = get_content_handler(State(test_state()), Path(ContentId::new().to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err.0, CalliopeError::ContentNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_id_maps_to_bad_request() {
        let err = get_content_handler(State(test_state()), Path("not-a-uuid".to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err.0, CalliopeError::InvalidContentId(_)));
    }

    #[tokio::test]
    async fn test_save_broadcasts_and_invalidates() {
        let state = test_state();
        let mut rx = state.events.subscribe();
        let stored = state
            .store
            .insert(ContentItem::new("original".to_string(), None))
            .await
            .unwrap();

        let saved = save_content_handler(
            State(state),
            Path(stored.id.to_string()),
            Json(SaveContentRequest {
                content: "edited".to_string(),
                structured_content: None,
                lifecycle_status: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(saved.0.raw_content, "edited");
        assert_eq!(saved.0.highlighting_status, HighlightStatus::UserEdited);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.event,
            super::super::events::ContentEvent::ContentSaved { .. }
        ));
    }

    #[tokio::test]
    async fn test_approve_with_body_saves_then_approves() {
        let state = test_state();
        let stored = state
            .store
            .insert(ContentItem::new("draft copy".to_string(), None))
            .await
            .unwrap();

        let approved = approve_handler(
            State(state),
            Path(stored.id.to_string()),
            Some(Json(SaveContentRequest {
                content: "final copy".to_string(),
                structured_content: None,
                lifecycle_status: None,
            })),
        )
        .await
        .unwrap();

        assert_eq!(approved.0.raw_content, "final copy");
        assert_eq!(approved.0.lifecycle_status, LifecycleStatus::Approved);
        assert_eq!(approved.0.highlighting_status, HighlightStatus::UserEdited);
    }

    #[tokio::test]
    async fn test_approve_without_body_keeps_content() {
        let state = test_state();
        let stored = state
            .store
            .insert(ContentItem::new("draft copy".to_string(), None))
            .await
            .unwrap();

        let approved = approve_handler(State(state), Path(stored.id.to_string()), None)
            .await
            .unwrap();

        assert_eq!(approved.0.raw_content, "draft copy");
        assert_eq!(approved.0.lifecycle_status, LifecycleStatus::Approved);
    }
}
