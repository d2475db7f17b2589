//! Route configuration.
//!
//! # Endpoints
//!
//! - `GET /` - health check
//! - `GET /media-stream` - WebSocket upgrade for the telephony media
//!   stream; `language` and `voice` query parameters select the
//!   conversation profile
//!
//! # Protocol
//!
//! After the WebSocket upgrade, the telephony side sends JSON frames
//! (`connected`, `start`, `media`, `mark`, `stop`) and receives `media`,
//! `mark`, and `clear` frames back; one media bridge runs per connection.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the application router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::health_check))
        .route("/media-stream", get(handlers::media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
