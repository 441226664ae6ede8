use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{ChangeEvent, RemoteStore, Table};
use crate::errors::PersistenceError;
use crate::history::model::StoredFoodAnalysis;
use crate::tasks::model::{NewTask, Task, TaskPatch};

/// In-process remote used for local-only runs and tests. `set_offline(true)`
/// makes every call fail as an unreachable service would.
pub struct MemoryRemote {
    tasks: RwLock<Vec<(Uuid, Task)>>,
    analyses: RwLock<Vec<StoredFoodAnalysis>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tasks: RwLock::new(Vec::new()),
            analyses: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            tx,
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Publishes a change as if another client wrote the row.
    pub fn notify(&self, table: Table, user_id: Uuid) {
        let _ = self.tx.send(ChangeEvent { table, user_id });
    }

    fn enter(&self) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Remote("service unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, PersistenceError> {
        self.enter()?;
        let mut rows: Vec<Task> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, t)| t.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_task(&self, user_id: Uuid, task: &NewTask) -> Result<Task, PersistenceError> {
        self.enter()?;
        let now = OffsetDateTime::now_utc();
        let row = Task {
            id: Uuid::new_v4(),
            name: task.name.clone(),
            description: task.description.clone(),
            category: task.category,
            priority: task.priority,
            time_allocation: task.time_allocation,
            due_date: task.due_date,
            recurring: task.recurring,
            completed: task.completed,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.push((user_id, row.clone()));
        self.notify(Table::Tasks, user_id);
        Ok(row)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Task, PersistenceError> {
        self.enter()?;
        let updated = {
            let mut tasks = self.tasks.write().await;
            let (_, task) = tasks
                .iter_mut()
                .find(|(owner, t)| *owner == user_id && t.id == id)
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
            patch.apply_to(task, OffsetDateTime::now_utc());
            task.clone()
        };
        self.notify(Table::Tasks, user_id);
        Ok(updated)
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        self.enter()?;
        {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|(owner, t)| !(*owner == user_id && t.id == id));
            if tasks.len() == before {
                return Err(PersistenceError::NotFound(id.to_string()));
            }
        }
        self.notify(Table::Tasks, user_id);
        Ok(())
    }

    async fn select_analyses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredFoodAnalysis>, PersistenceError> {
        self.enter()?;
        let mut rows: Vec<StoredFoodAnalysis> = self
            .analyses
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_analysis(
        &self,
        user_id: Uuid,
        analysis: &StoredFoodAnalysis,
    ) -> Result<(), PersistenceError> {
        self.enter()?;
        let mut row = analysis.clone();
        row.user_id = Some(user_id);
        self.analyses.write().await.push(row);
        self.notify(Table::FoodAnalyses, user_id);
        Ok(())
    }

    async fn delete_analysis(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        self.enter()?;
        self.analyses
            .write()
            .await
            .retain(|a| !(a.id == id && a.user_id == Some(user_id)));
        self.notify(Table::FoodAnalyses, user_id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}
