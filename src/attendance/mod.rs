mod dto;
pub mod handlers;
pub mod ordering;
pub mod partition;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::professor_routes())
        .merge(handlers::student_routes())
}
