//! Contract of the remote data service: row storage for tasks and analyses
//! keyed by user, plus change notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::history::model::StoredFoodAnalysis;
use crate::tasks::model::{NewTask, Task, TaskPatch};

mod memory;
mod pg;

pub use memory::MemoryRemote;
pub use pg::PgRemote;

/// Postgres NOTIFY channel the table triggers publish on.
pub const CHANGES_CHANNEL: &str = "lifebalance_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    FoodAnalyses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub user_id: Uuid,
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && event.user_id == self.user_id
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Newest first.
    async fn select_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, PersistenceError>;
    async fn insert_task(&self, user_id: Uuid, task: &NewTask) -> Result<Task, PersistenceError>;
    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Task, PersistenceError>;
    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError>;

    /// Newest first.
    async fn select_analyses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredFoodAnalysis>, PersistenceError>;
    async fn insert_analysis(
        &self,
        user_id: Uuid,
        analysis: &StoredFoodAnalysis,
    ) -> Result<(), PersistenceError>;
    async fn delete_analysis(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
