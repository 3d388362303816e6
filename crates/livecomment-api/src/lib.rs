pub mod cache;
pub mod error;
mod handler;
pub mod hydrate;
pub mod livecomments;
pub mod middleware;
pub mod moderation;
pub mod service;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use error::Error;
pub use state::{AppState, AppStateInner};

/// All livecomment routes, behind session verification.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/streams/{livestream_id}/comments",
            get(livecomments::get_livecomments).post(livecomments::post_livecomment),
        )
        .route(
            "/streams/{livestream_id}/comments/{livecomment_id}/report",
            post(livecomments::report_livecomment),
        )
        .route("/streams/{livestream_id}/moderate", post(moderation::moderate))
        .route("/streams/{livestream_id}/ngwords", get(moderation::get_ng_words))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
