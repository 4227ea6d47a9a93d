use crate::config::{AppConfig, StorageConfig};
use crate::storage::{LocalStorage, Storage, StorageClient};
use crate::store::{PgStore, RecordStore};
use anyhow::Context;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub storage: Arc<dyn StorageClient>,
}

/// Everything `main` needs besides the state itself.
pub struct Startup {
    pub state: AppState,
    pub db: PgPool,
    /// Directory to serve at `/uploads/images` when images live on disk.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Startup> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let (storage, static_dir) = match &config.storage {
            StorageConfig::Local { root } => {
                let local = LocalStorage::new(root);
                let dir = local.root().join(crate::images::services::IMAGE_PREFIX);
                (Arc::new(local) as Arc<dyn StorageClient>, Some(dir))
            }
            StorageConfig::S3 {
                endpoint,
                bucket,
                access_key,
                secret_key,
            } => {
                let s3 = Storage::new(endpoint, bucket, access_key, secret_key, "us-east-1").await?;
                (Arc::new(s3) as Arc<dyn StorageClient>, None)
            }
        };

        let store = Arc::new(PgStore::new(db.clone())) as Arc<dyn RecordStore>;

        Ok(Startup {
            state: Self::from_parts(config, store, storage),
            db,
            static_dir,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn RecordStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            store,
            storage,
        }
    }
}
