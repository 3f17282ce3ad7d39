use axum::{
    extract::State,
    http::Method,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::api_key_middleware;
use crate::metrics;

use super::{sessions, state::AppState, tasks};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/tasks",
            get(tasks::list_tasks_handler).post(tasks::create_task_handler),
        )
        .route("/tasks/:task_id", get(tasks::get_task_handler))
        .route("/tasks/:task_id/steps", get(tasks::task_steps_handler))
        .route("/tasks/:task_id/logs", get(tasks::task_logs_handler))
        .route("/execute", post(tasks::execute_handler))
        .route("/sessions", post(sessions::open_session_handler))
        .route(
            "/sessions/:session_id",
            axum::routing::delete(sessions::close_session_handler),
        )
        .route(
            "/sessions/:session_id/actions",
            post(sessions::execute_action_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            api_key_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.gateway.runner_name(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
