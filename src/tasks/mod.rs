pub mod handlers;
pub mod model;
pub mod repo;
mod store;

use crate::state::AppState;
use axum::Router;

pub use store::TaskStore;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
