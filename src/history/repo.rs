use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::StoredFoodAnalysis;
use crate::errors::PersistenceError;
use crate::nutrition::model::MacroTotals;

#[derive(Debug, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_items: Vec<String>,
    pub macros: Json<MacroTotals>,
    pub created_at: OffsetDateTime,
}

impl From<AnalysisRow> for StoredFoodAnalysis {
    fn from(r: AnalysisRow) -> Self {
        Self {
            id: r.id,
            food_items: r.food_items,
            macros: r.macros.0,
            created_at: r.created_at,
            user_id: Some(r.user_id),
        }
    }
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<StoredFoodAnalysis>, PersistenceError> {
    let rows = sqlx::query_as::<_, AnalysisRow>(
        r#"
        SELECT id, user_id, food_items, macros, created_at
        FROM food_analyses
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    a: &StoredFoodAnalysis,
) -> Result<(), PersistenceError> {
    sqlx::query(
        r#"
        INSERT INTO food_analyses (id, user_id, food_items, macros, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(a.id)
    .bind(user_id)
    .bind(&a.food_items)
    .bind(Json(a.macros))
    .bind(a.created_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
    sqlx::query("DELETE FROM food_analyses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}
