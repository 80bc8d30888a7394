use crate::state::AppState;
use axum::Router;

pub mod client;
mod dto;
pub mod handlers;
pub mod pipeline;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
