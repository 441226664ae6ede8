use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{
    broadcast::{self, error::RecvError},
    RwLock,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::{NewTask, Task, TaskCategory, TaskPatch};
use crate::errors::PersistenceError;
use crate::remote::{ChangeEvent, ChangeFilter, RemoteStore, Table};
use crate::session::{SessionHandle, Subscription};

/// Local view of the signed-in user's tasks, newest first. The remote data
/// service is the source of truth; every write goes there first.
pub struct TaskStore {
    inner: Arc<Inner>,
    _on_session: Subscription,
    _on_remote: Subscription,
}

struct Inner {
    session: SessionHandle,
    remote: Arc<dyn RemoteStore>,
    tasks: RwLock<Vec<Task>>,
    loading: AtomicBool,
    /// Bumped by every local write; a reload that overlaps a write is dropped.
    generation: AtomicU64,
}

impl TaskStore {
    /// Must be called inside a tokio runtime.
    pub fn new(session: SessionHandle, remote: Arc<dyn RemoteStore>) -> Self {
        let inner = Arc::new(Inner {
            session: session.clone(),
            remote: remote.clone(),
            tasks: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&inner);
        let on_session = session.on_change(move |_| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.reload().await;
                }
            }
        });

        let on_remote =
            Subscription::spawn(watch_remote(Arc::downgrade(&inner), remote.subscribe()));

        Self {
            inner,
            _on_session: on_session,
            _on_remote: on_remote,
        }
    }

    pub async fn reload(&self) {
        self.inner.reload().await
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    pub async fn list(&self, category: Option<TaskCategory>) -> Vec<Task> {
        self.inner
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| category.map_or(true, |c| t.category == c))
            .cloned()
            .collect()
    }

    #[instrument(skip_all, fields(name = %task.name))]
    pub async fn add(&self, task: NewTask) -> Result<Task, PersistenceError> {
        let user_id = self.inner.user_id()?;
        let created = self.inner.remote.insert_task(user_id, &task).await?;
        {
            let mut tasks = self.inner.tasks.write().await;
            tasks.retain(|t| t.id != created.id);
            tasks.insert(0, created.clone());
            self.inner.bump();
        }
        info!(task_id = %created.id, "task created");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Task, PersistenceError> {
        let user_id = self.inner.user_id()?;
        let updated = self.inner.remote.update_task(user_id, id, &patch).await?;
        {
            let mut tasks = self.inner.tasks.write().await;
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == id) {
                *slot = updated.clone();
            }
            self.inner.bump();
        }
        Ok(updated)
    }

    pub async fn toggle_complete(
        &self,
        id: Uuid,
        completed: bool,
    ) -> Result<Task, PersistenceError> {
        self.update(id, TaskPatch::completed(completed)).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        let user_id = self.inner.user_id()?;
        self.inner.remote.delete_task(user_id, id).await?;
        {
            let mut tasks = self.inner.tasks.write().await;
            tasks.retain(|t| t.id != id);
            self.inner.bump();
        }
        info!(task_id = %id, "task deleted");
        Ok(())
    }
}

impl Inner {
    fn user_id(&self) -> Result<Uuid, PersistenceError> {
        self.session.user_id().ok_or(PersistenceError::NoSession)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn reload(&self) {
        self.loading.store(true, Ordering::SeqCst);
        let started = self.generation.load(Ordering::SeqCst);
        let list = match self.session.user_id() {
            None => Vec::new(),
            Some(user_id) => self.remote.select_tasks(user_id).await.unwrap_or_else(|e| {
                warn!(error = %e, %user_id, "could not fetch tasks");
                Vec::new()
            }),
        };
        {
            let mut tasks = self.tasks.write().await;
            if self.generation.load(Ordering::SeqCst) == started {
                debug!(count = list.len(), "tasks reloaded");
                *tasks = list;
            } else {
                debug!("reload overlapped a local write; discarded");
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }
}

/// Reloads on every change to the current user's task rows.
async fn watch_remote(inner: Weak<Inner>, mut rx: broadcast::Receiver<ChangeEvent>) {
    loop {
        let relevant = match rx.recv().await {
            Ok(event) => {
                let Some(inner) = inner.upgrade() else { return };
                inner.session.user_id().is_some_and(|user_id| {
                    ChangeFilter {
                        table: Table::Tasks,
                        user_id,
                    }
                    .matches(&event)
                })
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "change feed lagged");
                true
            }
            Err(RecvError::Closed) => return,
        };
        if relevant {
            let Some(inner) = inner.upgrade() else { return };
            inner.reload().await;
        }
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::session::Session;
    use crate::tasks::model::{Recurring, TaskPriority};
    use std::time::Duration;

    fn new_task(name: &str, category: TaskCategory) -> NewTask {
        NewTask {
            name: name.into(),
            description: None,
            category,
            priority: TaskPriority::Medium,
            time_allocation: Some(30),
            due_date: None,
            recurring: Recurring::None,
            completed: false,
        }
    }

    fn session() -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "kim@example.com".into(),
        }
    }

    fn setup_as(signed_in: Option<Session>) -> (SessionHandle, Arc<MemoryRemote>, TaskStore) {
        let handle = SessionHandle::new();
        if let Some(s) = signed_in {
            handle.sign_in(s);
        }
        let remote = Arc::new(MemoryRemote::new());
        let store = TaskStore::new(handle.clone(), remote.clone());
        (handle, remote, store)
    }

    async fn wait_for_len(store: &TaskStore, len: usize) {
        for _ in 0..200 {
            if store.list(None).await.len() == len && !store.is_loading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task list never reached {len} entries");
    }

    #[tokio::test]
    async fn writes_require_a_session() {
        let (_, remote, store) = setup_as(None);
        assert!(matches!(
            store.add(new_task("read", TaskCategory::Educational)).await,
            Err(PersistenceError::NoSession)
        ));
        assert!(matches!(
            store.toggle_complete(Uuid::new_v4(), true).await,
            Err(PersistenceError::NoSession)
        ));
        assert!(matches!(
            store.delete(Uuid::new_v4()).await,
            Err(PersistenceError::NoSession)
        ));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn add_toggle_delete_round() {
        let (_, _, store) = setup_as(Some(session()));
        let run = store.add(new_task("run", TaskCategory::Physical)).await.unwrap();
        let _meditate = store.add(new_task("meditate", TaskCategory::Mental)).await.unwrap();

        let list = store.list(None).await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "meditate");

        let physical = store.list(Some(TaskCategory::Physical)).await;
        assert_eq!(physical.len(), 1);
        assert_eq!(physical[0].id, run.id);

        let done = store.toggle_complete(run.id, true).await.unwrap();
        assert!(done.completed);
        assert!(store.list(Some(TaskCategory::Physical)).await[0].completed);

        store.delete(run.id).await.unwrap();
        assert!(store.list(Some(TaskCategory::Physical)).await.is_empty());
    }

    #[tokio::test]
    async fn remote_failures_propagate() {
        let (_, remote, store) = setup_as(Some(session()));
        remote.set_offline(true);
        assert!(matches!(
            store.add(new_task("swim", TaskCategory::Physical)).await,
            Err(PersistenceError::Remote(_))
        ));
        assert!(store.list(None).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_task_update_is_not_found() {
        let (_, _, store) = setup_as(Some(session()));
        assert!(matches!(
            store.update(Uuid::new_v4(), TaskPatch::completed(true)).await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reload_without_session_or_remote_is_empty() {
        let (_, remote, store) = setup_as(Some(session()));
        remote.set_offline(true);
        store.reload().await;
        assert!(store.list(None).await.is_empty());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn change_from_another_client_triggers_reload() {
        let s = session();
        let (_, remote, store) = setup_as(Some(s.clone()));

        remote
            .insert_task(s.user_id, &new_task("guitar", TaskCategory::Fun))
            .await
            .unwrap();
        wait_for_len(&store, 1).await;
        assert_eq!(store.list(None).await[0].name, "guitar");
    }

    #[tokio::test]
    async fn other_users_changes_are_ignored() {
        let (_, remote, store) = setup_as(Some(session()));
        let calls_before = remote.calls();
        remote
            .insert_task(Uuid::new_v4(), &new_task("chess", TaskCategory::Fun))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(remote.calls(), calls_before + 1);
        assert!(store.list(None).await.is_empty());
    }

    #[tokio::test]
    async fn sign_out_clears_and_sign_in_reloads() {
        let s = session();
        let (handle, remote, store) = setup_as(Some(s.clone()));
        store.add(new_task("stretch", TaskCategory::Physical)).await.unwrap();
        wait_for_len(&store, 1).await;

        handle.sign_out();
        wait_for_len(&store, 0).await;

        handle.sign_in(s);
        wait_for_len(&store, 1).await;
        assert_eq!(remote.select_tasks(handle.user_id().unwrap()).await.unwrap().len(), 1);
    }
}
