//! HTTP server wiring, grounded on wkmp-ap's `api/server.rs::run`
//! (`AppContext` + `axum::Router` + CORS/trace layers).

use super::handlers;
use crate::audio::sink::SinkFactory;
use crate::config::Config;
use crate::error::Result;
use crate::library::SnippetLibrary;
use crate::segment::AudioFormat;
use crate::session::{Session, SessionRegistry};
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state, cloned into every handler. Each field is
/// itself cheaply cloneable so the struct as a whole stays `Clone`
/// without wrapping the entire context behind one extra `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<Config>,
    pub library: Arc<SnippetLibrary>,
    pub sessions: Arc<RwLock<HashMap<u32, Arc<Session>>>>,
    pub output_format: AudioFormat,
    pub viz_worker_count: usize,
    pub sink_factory: Arc<dyn SinkFactory>,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/session", post(handlers::start_session))
        .route("/session/:id/transition_spec", post(handlers::update_transition_spec))
        .route("/session/:id/chunk", get(handlers::get_chunk))
        .route("/session/:id/position", get(handlers::get_position))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Bind and serve until the process is terminated. Grounded on wkmp-ap's
/// `main.rs`/`api/server.rs` use of `axum::serve` over a `TcpListener`.
pub async fn run(ctx: AppContext) -> Result<()> {
    let addr = format!("0.0.0.0:{}", ctx.config.port);
    let listener = TcpListener::bind(&addr).await.map_err(crate::error::Error::Io)?;
    info!(%addr, "listening");
    axum::serve(listener, router(ctx))
        .await
        .map_err(|e| crate::error::Error::Internal(format!("server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::CapturingSinkFactory;
    use crate::classifier::Tolerances;
    use crate::mix_planner::PlannerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_ctx() -> AppContext {
        AppContext {
            registry: Arc::new(SessionRegistry::default()),
            config: Arc::new(Config {
                library_path: "songs".into(),
                log_path: "log".into(),
                port: 0,
                tolerances: Tolerances::default(),
                planner: PlannerConfig::default(),
                audio_device: None,
            }),
            library: Arc::new(SnippetLibrary::from_phase_files(vec![]).unwrap()),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            output_format: AudioFormat::default(),
            viz_worker_count: 2,
            sink_factory: Arc::new(CapturingSinkFactory),
        }
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let app = router(test_ctx());
        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn start_session_then_get_position() {
        let ctx = test_ctx();
        let app = router(ctx);
        let response = app
            .clone()
            .oneshot(Request::builder().method("POST").uri("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let session_id = parsed["session_id"].as_u64().unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/session/{session_id}/position"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn get_position_unknown_session_returns_404() {
        let app = router(test_ctx());
        let response = app
            .oneshot(Request::builder().uri("/session/999/position").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
