pub mod health;
pub mod index;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(index::router())
        .merge(health::router())
        .merge(crate::gateway::server::router())
}
