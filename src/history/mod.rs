use crate::state::AppState;
use axum::Router;

pub mod archive;
pub mod handlers;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
