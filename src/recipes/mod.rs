mod dto;
pub mod handlers;
pub mod images;
pub mod model;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::tag_routes())
        .merge(handlers::ingredient_routes())
        .merge(handlers::recipe_routes())
}
