use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgListener, PgPool};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChangeEvent, RemoteStore, CHANGES_CHANNEL};
use crate::errors::PersistenceError;
use crate::history::{self, model::StoredFoodAnalysis};
use crate::session::Subscription;
use crate::tasks::{
    self,
    model::{NewTask, Task, TaskPatch},
};

/// Postgres-backed remote. Row triggers publish `{table, user_id}` on
/// `CHANGES_CHANNEL`; a listener task fans them out to subscribers.
pub struct PgRemote {
    db: PgPool,
    tx: broadcast::Sender<ChangeEvent>,
    _listener: Subscription,
}

impl PgRemote {
    pub fn new(db: PgPool) -> Self {
        let (tx, _) = broadcast::channel(64);
        let listener = Subscription::spawn(listen(db.clone(), tx.clone()));
        Self {
            db,
            tx,
            _listener: listener,
        }
    }
}

async fn listen(db: PgPool, tx: broadcast::Sender<ChangeEvent>) {
    let mut listener = loop {
        match PgListener::connect_with(&db).await {
            Ok(mut l) => match l.listen(CHANGES_CHANNEL).await {
                Ok(()) => break l,
                Err(e) => warn!(error = %e, "LISTEN failed; retrying"),
            },
            Err(e) => warn!(error = %e, "change listener connect failed; retrying"),
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    };
    info!(channel = CHANGES_CHANNEL, "listening for remote changes");

    loop {
        match listener.recv().await {
            Ok(n) => match serde_json::from_str::<ChangeEvent>(n.payload()) {
                Ok(ev) => {
                    debug!(table = ?ev.table, user_id = %ev.user_id, "remote change");
                    let _ = tx.send(ev);
                }
                Err(e) => warn!(error = %e, payload = n.payload(), "unreadable change payload"),
            },
            Err(e) => {
                warn!(error = %e, "change listener error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl RemoteStore for PgRemote {
    async fn select_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, PersistenceError> {
        tasks::repo::list_by_user(&self.db, user_id).await
    }

    async fn insert_task(&self, user_id: Uuid, task: &NewTask) -> Result<Task, PersistenceError> {
        tasks::repo::insert(&self.db, user_id, task).await
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Task, PersistenceError> {
        tasks::repo::update(&self.db, user_id, id, patch).await
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        tasks::repo::delete(&self.db, user_id, id).await
    }

    async fn select_analyses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredFoodAnalysis>, PersistenceError> {
        history::repo::list_by_user(&self.db, user_id).await
    }

    async fn insert_analysis(
        &self,
        user_id: Uuid,
        analysis: &StoredFoodAnalysis,
    ) -> Result<(), PersistenceError> {
        history::repo::insert(&self.db, user_id, analysis).await
    }

    async fn delete_analysis(&self, user_id: Uuid, id: Uuid) -> Result<(), PersistenceError> {
        history::repo::delete(&self.db, user_id, id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}
