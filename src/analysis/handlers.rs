use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::{AnalysisOutcome, ImagePayload};
use crate::{
    errors::{reject, AppResult, ValidationError},
    history::model::StoredFoodAnalysis,
    nutrition::{model::MacroTotals, EntryOp},
    state::AppState,
};

/// Multipart overhead allowed on top of the image limit, so an oversize image
/// still reaches validation and gets a size-specific error.
const BODY_SLACK: usize = 1024 * 1024;

pub fn routes(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/analysis", post(analyze_image))
        .layer(DefaultBodyLimit::max(max_image_bytes.saturating_mul(2) + BODY_SLACK))
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub record: StoredFoodAnalysis,
    pub totals: MacroTotals,
}

async fn read_image(mut mp: Multipart) -> AppResult<ImagePayload> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| reject(ValidationError::field("image", e.body_text())))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let media_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| reject(ValidationError::field("image", e.body_text())))?;
        return Ok(ImagePayload::new(bytes, media_type));
    }
    Err(reject(ValidationError::field("image", "multipart field is missing")))
}

/// Analyzes an uploaded photo, records it in history and merges the candidate
/// entry into the day's ledger.
#[instrument(skip(state, mp))]
pub async fn analyze_image(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<AnalysisResponse>)> {
    let image = read_image(mp).await?;
    let outcome = state.analyzer.analyze(&image).await.map_err(reject)?;

    let record = state
        .history
        .add(outcome.analysis.clone())
        .await
        .map_err(reject)?;

    let totals = {
        let mut foods = state.foods.write().await;
        foods.apply(EntryOp::Upsert(outcome.entry.clone()));
        foods.totals()
    };
    info!(entry_id = %outcome.entry.id, record_id = %record.id, "analysis merged");

    Ok((
        StatusCode::CREATED,
        Json(AnalysisResponse {
            outcome,
            record,
            totals,
        }),
    ))
}

#[cfg(test)]
mod handlers_tests {
    use super::*;
    use crate::app::build_app;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "lifebalance-test-boundary";

    fn upload(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"meal\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::post("/api/v1/analysis")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn analysis_lands_in_ledger_and_history() {
        let state = AppState::fake();
        let res = build_app(state.clone())
            .oneshot(upload("image", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value =
            serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["entry"]["name"], "Apple");
        assert_eq!(body["analysis"]["foodItems"][0], "apple");
        assert_eq!(body["totals"]["calories"], 95.0);

        assert_eq!(state.foods.read().await.entries().len(), 1);
        let history = state.history.list().await;
        assert_eq!(history.len(), 1);
        assert_eq!(body["record"]["id"], history[0].id.to_string());
    }

    #[tokio::test]
    async fn oversize_upload_is_400_and_changes_nothing() {
        let state = AppState::fake();
        let big = vec![0u8; state.config.analysis.max_image_bytes + 1];
        let res = build_app(state.clone())
            .oneshot(upload("image", "image/png", &big))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
        assert!(text.contains("limit"));
        assert!(state.foods.read().await.entries().is_empty());
        assert!(state.history.list().await.is_empty());
    }

    #[tokio::test]
    async fn wrong_type_and_missing_field_are_400() {
        let state = AppState::fake();
        let res = build_app(state.clone())
            .oneshot(upload("image", "image/gif", b"GIF89a"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = build_app(state)
            .oneshot(upload("photo", "image/png", b"png"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
