pub mod aggregator;
pub mod catalog;
mod dto;
pub mod handlers;
pub mod model;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub use store::{EntryOp, EntryOutcome, FoodEntryStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
