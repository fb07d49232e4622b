use axum::Router;

use crate::state::AppState;

mod claims;
pub mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::protected_routes())
}
