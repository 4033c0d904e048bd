//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod orders;

/// Returns the full application router, without middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
}
