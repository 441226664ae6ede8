//! The single active session of this service and its change notifications.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
}

/// Cloneable handle to the current session. Absence of a session means
/// anonymous, local-only mode.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().as_ref().map(|s| s.user_id)
    }

    pub fn sign_in(&self, session: Session) {
        info!(user_id = %session.user_id, "session started");
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        if let Some(prev) = self.tx.send_replace(None) {
            info!(user_id = %prev.user_id, "session ended");
        }
    }

    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    /// Runs `callback` with the new value after every session change until the
    /// returned `Subscription` is dropped.
    pub fn on_change<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<Session>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut rx = self.watch();
        Subscription::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().clone();
                debug!(signed_in = current.is_some(), "session change observed");
                callback(current).await;
            }
        })
    }
}

/// Owns a background listener; dropping it unregisters the listener.
#[derive(Debug)]
pub struct Subscription(JoinHandle<()>);

impl Subscription {
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(fut))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.0.abort();
    }
}
