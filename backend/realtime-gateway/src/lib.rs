use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Authenticates inside the handler, before the upgrade
        .route("/ws", get(handlers::gateway::ws_handler))
        .merge(
            api_routes(app_state.clone())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(
                    middlewares::metrics::metrics_middleware,
                )),
        )
}

fn api_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let supervisor_routes = Router::new()
        .route("/api/v1/presence", get(handlers::presence::list_online))
        .route(
            "/api/v1/broadcasts/notification",
            post(handlers::broadcasts::push_notification),
        )
        .route(
            "/api/v1/broadcasts/quiz",
            post(handlers::broadcasts::push_quiz_event),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::supervisor_guard_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/v1/broadcasts/announcement",
            post(handlers::broadcasts::push_announcement),
        )
        .route(
            "/api/v1/broadcasts/dashboard",
            post(handlers::broadcasts::push_dashboard_update),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ));

    Router::new()
        .route(
            "/api/v1/presence/{user_id}",
            get(handlers::presence::user_presence),
        )
        .merge(supervisor_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
