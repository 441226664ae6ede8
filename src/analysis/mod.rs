mod client;
pub mod extract;
pub mod handlers;
pub mod vision;

use axum::Router;
use serde::Serialize;

use crate::nutrition::model::{FoodAnalysis, FoodEntry};
use crate::state::AppState;

pub use client::{ImageAnalysisClient, ImagePayload, ANALYSIS_INSTRUCTION};

/// One analysis in both of its shapes: a candidate ledger entry and the
/// multi-item record kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub entry: FoodEntry,
    pub analysis: FoodAnalysis,
}

pub fn router(max_image_bytes: usize) -> Router<AppState> {
    handlers::routes(max_image_bytes)
}
