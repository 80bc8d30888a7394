use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod model;
pub mod quota;
pub mod rollover;
pub mod store;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
