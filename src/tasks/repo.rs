use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewTask, Recurring, Task, TaskCategory, TaskPatch, TaskPriority};
use crate::errors::PersistenceError;

/// Row as stored; enums are kept as text columns.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: String,
    pub time_allocation: Option<i32>,
    pub due_date: Option<OffsetDateTime>,
    pub recurring: String,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TaskRow> for Task {
    type Error = PersistenceError;

    fn try_from(r: TaskRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let bad = |col: &str, v: &str| {
            PersistenceError::Remote(format!("task {id}: bad {col} {v:?}"))
        };
        Ok(Task {
            category: TaskCategory::parse(&r.category).ok_or_else(|| bad("category", &r.category))?,
            priority: TaskPriority::parse(&r.priority).ok_or_else(|| bad("priority", &r.priority))?,
            recurring: Recurring::parse(&r.recurring)
                .ok_or_else(|| bad("recurring", &r.recurring))?,
            id: r.id,
            name: r.name,
            description: r.description,
            time_allocation: r.time_allocation,
            due_date: r.due_date,
            completed: r.completed,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<Task>, PersistenceError> {
    let rows = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT id, name, description, category, priority, time_allocation,
               due_date, recurring, completed, created_at, updated_at
        FROM tasks
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Task::try_from).collect()
}

pub async fn insert(db: &PgPool, user_id: Uuid, t: &NewTask) -> Result<Task, PersistenceError> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks (user_id, name, description, category, priority,
                           time_allocation, due_date, recurring, completed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, name, description, category, priority, time_allocation,
                  due_date, recurring, completed, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(&t.name)
    .bind(&t.description)
    .bind(t.category.as_str())
    .bind(t.priority.as_str())
    .bind(t.time_allocation)
    .bind(t.due_date)
    .bind(t.recurring.as_str())
    .bind(t.completed)
    .fetch_one(db)
    .await?;
    row.try_into()
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    p: &TaskPatch,
) -> Result<Task, PersistenceError> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        UPDATE tasks SET
            name            = COALESCE($3, name),
            description     = COALESCE($4, description),
            category        = COALESCE($5, category),
            priority        = COALESCE($6, priority),
            time_allocation = COALESCE($7, time_allocation),
            due_date        = COALESCE($8, due_date),
            recurring       = COALESCE($9, recurring),
            completed       = COALESCE($10, completed),
            updated_at      = now()
        WHERE id = $1 AND user_id = $2
        RETURNING id, name, description, category, priority, time_allocation,
                  due_date, recurring, completed, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.category.map(TaskCategory::as_str))
    .bind(p.priority.map(TaskPriority::as_str))
    .bind(p.time_allocation)
    .bind(p.due_date)
    .bind(p.recurring.map(Recurring::as_str))
    .bind(p.completed)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
    row.try_into()
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
    let done = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    if done.rows_affected() == 0 {
        return Err(PersistenceError::NotFound(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod repo_tests {
    use super::*;

    fn row(category: &str) -> TaskRow {
        let now = OffsetDateTime::now_utc();
        TaskRow {
            id: Uuid::new_v4(),
            name: "Journal".into(),
            description: None,
            category: category.into(),
            priority: "high".into(),
            time_allocation: Some(15),
            due_date: None,
            recurring: "daily".into(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_text_columns() {
        let task = Task::try_from(row("mental")).unwrap();
        assert_eq!(task.category, TaskCategory::Mental);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.recurring, Recurring::Daily);
    }

    #[test]
    fn unknown_category_is_an_error() {
        let err = Task::try_from(row("work")).unwrap_err();
        assert!(err.to_string().contains("category"));
    }
}
