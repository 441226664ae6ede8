use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::StoredFoodAnalysis;
use crate::cache::LocalCache;
use crate::errors::PersistenceError;
use crate::nutrition::model::FoodAnalysis;
use crate::remote::RemoteStore;
use crate::session::{SessionHandle, Subscription};

pub const CACHE_KEY: &str = "foodAnalyses";

/// Past analyses, newest first. The local cache always holds the last list
/// this store saw; the remote copy is mirrored only while signed in.
pub struct AnalysisHistoryStore {
    inner: Arc<Inner>,
    _on_session: Subscription,
}

struct Inner {
    session: SessionHandle,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    analyses: RwLock<Vec<StoredFoodAnalysis>>,
    loading: AtomicBool,
    /// Bumped around every local write; a fetch that overlaps one is retried.
    generation: AtomicU64,
}

const LOAD_ATTEMPTS: usize = 3;

impl AnalysisHistoryStore {
    /// Must be called inside a tokio runtime.
    pub fn new(
        session: SessionHandle,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let inner = Arc::new(Inner {
            session: session.clone(),
            remote,
            cache,
            analyses: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let on_session = session.on_change(move |_| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.load().await;
                }
            }
        });
        Self {
            inner,
            _on_session: on_session,
        }
    }

    pub async fn load(&self) {
        self.inner.load().await
    }

    pub async fn list(&self) -> Vec<StoredFoodAnalysis> {
        self.inner.analyses.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    #[instrument(skip_all)]
    pub async fn add(
        &self,
        analysis: FoodAnalysis,
    ) -> Result<StoredFoodAnalysis, PersistenceError> {
        let user_id = self.inner.session.user_id();
        let record = StoredFoodAnalysis::new(analysis, user_id);

        {
            let mut analyses = self.inner.analyses.write().await;
            let mut next = Vec::with_capacity(analyses.len() + 1);
            next.push(record.clone());
            next.extend(analyses.iter().cloned());
            self.inner.write_cache(&next).await?;
            *analyses = next;
            self.inner.bump();
        }

        if let Some(user_id) = user_id {
            if let Err(e) = self.inner.remote.insert_analysis(user_id, &record).await {
                warn!(error = %e, id = %record.id, "analysis not mirrored to remote");
            }
            self.inner.bump();
        }
        info!(id = %record.id, items = record.food_items.len(), "analysis recorded");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        {
            let mut analyses = self.inner.analyses.write().await;
            let next: Vec<_> = analyses.iter().filter(|a| a.id != id).cloned().collect();
            self.inner.write_cache(&next).await?;
            *analyses = next;
            self.inner.bump();
        }

        if let Some(user_id) = self.inner.session.user_id() {
            if let Err(e) = self.inner.remote.delete_analysis(user_id, id).await {
                warn!(error = %e, %id, "remote delete failed");
            }
            self.inner.bump();
        }
        Ok(())
    }
}

impl Inner {
    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn load(&self) {
        self.loading.store(true, Ordering::SeqCst);
        match self.session.user_id() {
            Some(user_id) => self.load_remote(user_id).await,
            None => {
                let started = self.generation.load(Ordering::SeqCst);
                let list = self.read_cache().await;
                let mut analyses = self.analyses.write().await;
                if self.generation.load(Ordering::SeqCst) == started {
                    debug!(count = list.len(), "history loaded from cache");
                    *analyses = list;
                }
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Replaces the local list with the remote rows unless a local write
    /// lands while the fetch is in flight, in which case the fetch is redone.
    async fn load_remote(&self, user_id: Uuid) {
        for attempt in 1..=LOAD_ATTEMPTS {
            let started = self.generation.load(Ordering::SeqCst);
            let rows = match self.remote.select_analyses(user_id).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(error = %e, "remote history unavailable; using local cache");
                    let cached = self.read_cache().await;
                    let mut analyses = self.analyses.write().await;
                    if self.generation.load(Ordering::SeqCst) == started {
                        *analyses = cached;
                    }
                    return;
                }
            };

            let mut analyses = self.analyses.write().await;
            if self.generation.load(Ordering::SeqCst) != started {
                debug!(attempt, "history fetch overlapped a local write; refetching");
                continue;
            }
            if let Err(e) = self.write_cache(&rows).await {
                warn!(error = %e, "could not refresh local history cache");
            }
            debug!(count = rows.len(), "history loaded");
            *analyses = rows;
            return;
        }
        warn!("history kept local; writes kept overlapping the remote fetch");
    }

    async fn read_cache(&self) -> Vec<StoredFoodAnalysis> {
        match self.cache.get(CACHE_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "unreadable local history; starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "local history cache unavailable");
                Vec::new()
            }
        }
    }

    async fn write_cache(&self, list: &[StoredFoodAnalysis]) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(list).map_err(|e| PersistenceError::Cache(e.to_string()))?;
        self.cache.set(CACHE_KEY, &raw).await
    }
}
