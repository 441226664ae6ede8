use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::model::StoredFoodAnalysis;
use crate::{
    errors::{reject, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyses", get(list_analyses))
        .route("/analyses/:id", delete(delete_analysis))
}

#[instrument(skip(state))]
pub async fn list_analyses(State(state): State<AppState>) -> Json<Vec<StoredFoodAnalysis>> {
    Json(state.history.list().await)
}

#[instrument(skip(state))]
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.history.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod handlers_tests {
    use super::*;
    use crate::app::build_app;
    use crate::nutrition::model::{FoodAnalysis, MacroTotals};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn list_then_delete() {
        let state = AppState::fake();
        let rec = state
            .history
            .add(FoodAnalysis {
                food_items: vec!["kiwi".into()],
                macros: MacroTotals {
                    calories: 42.0,
                    ..MacroTotals::default()
                },
            })
            .await
            .unwrap();

        let res = build_app(state.clone())
            .oneshot(Request::get("/api/v1/analyses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let list: Vec<StoredFoodAnalysis> =
            serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(list, vec![rec.clone()]);

        let res = build_app(state.clone())
            .oneshot(
                Request::delete(format!("/api/v1/analyses/{}", rec.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(state.history.list().await.is_empty());
    }
}
