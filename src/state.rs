use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::RwLock;
use tracing::info;

use crate::analysis::ImageAnalysisClient;
use crate::cache::{FileCache, LocalCache};
use crate::config::AppConfig;
use crate::errors::{AppError, PersistenceError};
use crate::history::AnalysisHistoryStore;
use crate::nutrition::FoodEntryStore;
use crate::remote::{MemoryRemote, PgRemote, RemoteStore};
use crate::session::SessionHandle;
use crate::tasks::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` in local-only mode.
    pub db: Option<PgPool>,
    pub session: SessionHandle,
    pub foods: Arc<RwLock<FoodEntryStore>>,
    pub analyzer: Arc<ImageAnalysisClient>,
    pub history: Arc<AnalysisHistoryStore>,
    pub tasks: Arc<TaskStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?,
            ),
            None => {
                info!("DATABASE_URL not set; running local-only");
                None
            }
        };

        let remote: Arc<dyn RemoteStore> = match &db {
            Some(pool) => Arc::new(PgRemote::new(pool.clone())),
            None => Arc::new(MemoryRemote::new()),
        };
        let cache = Arc::new(
            FileCache::open(&config.cache_dir)
                .await
                .context("open cache directory")?,
        ) as Arc<dyn LocalCache>;
        let analyzer = Arc::new(
            ImageAnalysisClient::from_config(&config.analysis).context("build analysis client")?,
        );

        Ok(Self::from_parts(config, db, remote, cache, analyzer))
    }

    /// Wires the stores to one shared session. Needs a tokio runtime.
    pub fn from_parts(
        config: Arc<AppConfig>,
        db: Option<PgPool>,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        analyzer: Arc<ImageAnalysisClient>,
    ) -> Self {
        let session = SessionHandle::new();
        let history = Arc::new(AnalysisHistoryStore::new(
            session.clone(),
            remote.clone(),
            cache,
        ));
        let tasks = Arc::new(TaskStore::new(session.clone(), remote));
        Self {
            config,
            db,
            session,
            foods: Arc::new(RwLock::new(FoodEntryStore::new())),
            analyzer,
            history,
            tasks,
        }
    }

    pub fn db(&self) -> Result<&PgPool, AppError> {
        self.db.as_ref().ok_or_else(|| {
            PersistenceError::Remote("accounts are unavailable in local-only mode".into()).into()
        })
    }

    /// Local-only state with in-memory stores and a canned analysis backend.
    pub fn fake() -> Self {
        use crate::analysis::vision::{EncodedImage, VisionBackend};
        use crate::cache::MemoryCache;
        use crate::config::{AnalysisConfig, AnalysisProvider, JwtConfig};
        use crate::errors::AnalysisError;
        use async_trait::async_trait;

        struct FakeVision;
        #[async_trait]
        impl VisionBackend for FakeVision {
            fn name(&self) -> &'static str {
                "fake"
            }
            async fn describe(
                &self,
                _instruction: &str,
                _image: &EncodedImage,
            ) -> Result<String, AnalysisError> {
                Ok(r#"{"name":"Apple","foodItems":["apple"],"calories":95,"protein":0.5,"carbs":25,"fat":0.3,"fiber":4.4,"category":"Snack"}"#.into())
            }
        }

        let analysis = AnalysisConfig {
            provider: AnalysisProvider::Gemini,
            api_key: "fake".into(),
            base_url: "http://fake.local".into(),
            model: "fake".into(),
            max_image_bytes: 64 * 1024,
            supported_types: vec!["image/jpeg".into(), "image/png".into(), "image/webp".into()],
        };
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            analysis: analysis.clone(),
            cache_dir: std::env::temp_dir().join("lifebalance-fake"),
        });
        let analyzer = Arc::new(ImageAnalysisClient::new(
            Arc::new(FakeVision),
            analysis.max_image_bytes,
            analysis.supported_types,
        ));

        Self::from_parts(
            config,
            None,
            Arc::new(MemoryRemote::new()),
            Arc::new(MemoryCache::new()),
            analyzer,
        )
    }
}
