use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    aggregator::{self, NutritionSummary},
    catalog,
    dto::{FoodEntryInput, LedgerResponse},
    model::FoodEntry,
    store::{CategoryGroup, EntryOutcome, FoodEntryStore},
};
use crate::{
    errors::{reject, AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods))
        .route("/foods/grouped", get(grouped_foods))
        .route("/foods/summary", get(food_summary))
        .route("/foods/catalog", get(food_catalog))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", post(add_food))
        .route("/foods/quick-add/:catalog_id", post(quick_add))
        .route("/foods/:id/decrement", post(decrement_food))
        .route("/foods/:id", delete(remove_food))
}

fn ledger(store: &FoodEntryStore) -> LedgerResponse {
    LedgerResponse {
        entries: store.entries().to_vec(),
        totals: store.totals(),
    }
}

fn missing(id: &str) -> (StatusCode, String) {
    reject(AppError::NotFound(format!("food entry {id} not found")))
}

#[instrument(skip(state))]
pub async fn list_foods(State(state): State<AppState>) -> Json<LedgerResponse> {
    let foods = state.foods.read().await;
    Json(ledger(&foods))
}

#[instrument(skip(state))]
pub async fn grouped_foods(State(state): State<AppState>) -> Json<Vec<CategoryGroup>> {
    let foods = state.foods.read().await;
    Json(foods.group_by_category())
}

#[instrument(skip(state))]
pub async fn food_summary(State(state): State<AppState>) -> Json<NutritionSummary> {
    let foods = state.foods.read().await;
    Json(aggregator::summary(foods.entries()))
}

pub async fn food_catalog() -> Json<Vec<FoodEntry>> {
    Json(catalog::common_foods())
}

#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn add_food(
    State(state): State<AppState>,
    Json(input): Json<FoodEntryInput>,
) -> AppResult<(StatusCode, Json<LedgerResponse>)> {
    let entry = FoodEntry::from(input).validated().map_err(reject)?;
    let mut foods = state.foods.write().await;
    let outcome = foods.add_manual(entry);
    let status = match outcome {
        EntryOutcome::Inserted => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(ledger(&foods))))
}

#[instrument(skip(state))]
pub async fn quick_add(
    State(state): State<AppState>,
    Path(catalog_id): Path<String>,
) -> AppResult<Json<LedgerResponse>> {
    let template = catalog::find(&catalog_id)
        .ok_or_else(|| reject(AppError::NotFound(format!("no catalog food {catalog_id}"))))?;
    let mut foods = state.foods.write().await;
    let outcome = foods.quick_add(&template);
    info!(%catalog_id, ?outcome, "quick add");
    Ok(Json(ledger(&foods)))
}

#[instrument(skip(state))]
pub async fn decrement_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LedgerResponse>> {
    let mut foods = state.foods.write().await;
    match foods.remove_one_unit(&id) {
        EntryOutcome::Missing => Err(missing(&id)),
        _ => Ok(Json(ledger(&foods))),
    }
}

#[instrument(skip(state))]
pub async fn remove_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LedgerResponse>> {
    let mut foods = state.foods.write().await;
    match foods.remove(&id) {
        EntryOutcome::Missing => Err(missing(&id)),
        _ => Ok(Json(ledger(&foods))),
    }
}

#[cfg(test)]
mod handlers_tests {
    use super::*;
    use crate::app::build_app;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(state: &AppState, req: Request<Body>) -> Response {
        build_app(state.clone()).oneshot(req).await.unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn quick_add_twice_then_decrement() {
        let state = AppState::fake();
        send(&state, empty("POST", "/api/v1/foods/quick-add/banana")).await;
        let res = send(&state, empty("POST", "/api/v1/foods/quick-add/banana")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["quantity"], 2.0);
        assert_eq!(body["totals"]["calories"], 210.0);

        send(&state, empty("POST", "/api/v1/foods/banana/decrement")).await;
        let res = send(&state, empty("POST", "/api/v1/foods/banana/decrement")).await;
        let body = body_json(res).await;
        assert!(body["entries"].as_array().unwrap().is_empty());

        let res = send(&state, empty("POST", "/api/v1/foods/banana/decrement")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_catalog_id_is_404() {
        let res = send(&AppState::fake(), empty("POST", "/api/v1/foods/quick-add/pizza")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_add_snaps_quantity_and_edits_in_place() {
        let state = AppState::fake();
        let res = send(
            &state,
            post(
                "/api/v1/foods",
                json!({"id": "oats", "name": " Oatmeal ", "calories": 150, "quantity": 1.3, "category": "Breakfast"}),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["entries"][0]["name"], "Oatmeal");
        assert_eq!(body["entries"][0]["quantity"], 1.25);

        let res = send(
            &state,
            post(
                "/api/v1/foods",
                json!({"id": "oats", "name": "Oatmeal", "calories": 180, "quantity": 1, "category": "Breakfast"}),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["totals"]["calories"], 180.0);
    }

    #[tokio::test]
    async fn invalid_manual_entry_is_400() {
        let res = send(
            &AppState::fake(),
            post(
                "/api/v1/foods",
                json!({"name": "Ghost", "calories": -5, "category": "Lunch"}),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn grouped_view_follows_meal_order() {
        let state = AppState::fake();
        for id in ["salmon", "egg", "banana"] {
            send(&state, empty("POST", &format!("/api/v1/foods/quick-add/{id}"))).await;
        }
        let body = body_json(send(&state, empty("GET", "/api/v1/foods/grouped")).await).await;
        let order: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["category"].as_str().unwrap())
            .collect();
        assert_eq!(order, vec!["Breakfast", "Dinner", "Snack"]);
    }

    #[tokio::test]
    async fn summary_reports_progress_and_remaining() {
        let state = AppState::fake();
        send(&state, empty("POST", "/api/v1/foods/quick-add/chicken-breast")).await;
        let body = body_json(send(&state, empty("GET", "/api/v1/foods/summary")).await).await;
        assert_eq!(body["totals"]["protein"], 31.0);
        assert!((body["progress"]["protein"].as_f64().unwrap() - 62.0).abs() < 1e-9);
        assert_eq!(body["remainingCalories"], 1835.0);
        assert_eq!(body["goals"]["calories"], 2000.0);
    }

    #[tokio::test]
    async fn delete_entry() {
        let state = AppState::fake();
        send(&state, empty("POST", "/api/v1/foods/quick-add/egg")).await;
        let res = send(&state, empty("DELETE", "/api/v1/foods/egg")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(&state, empty("DELETE", "/api/v1/foods/egg")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
