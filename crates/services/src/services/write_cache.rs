//! Local write-ahead cache for funnel stages whose database write failed, and
//! the background task that drains it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use db::models::funnel::FunnelStage;
use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, error::ErrorKind};
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::interval,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CACHE_FILE: &str = "pending_funnel_writes.json";

#[derive(Debug, Error)]
pub enum WriteCacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache file is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A stage waiting to be written to the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingWrite {
    pub stage: FunnelStage,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Queued { client_id: Uuid, stage_key: String },
}

type StageKey = (Uuid, String);

pub struct LocalWriteCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<StageKey, PendingWrite>>,
    events: mpsc::UnboundedSender<CacheEvent>,
}

impl LocalWriteCache {
    /// Open the cache, restoring entries left in `dir` by a previous run.
    /// Without a directory the cache lives in memory only.
    pub async fn open(
        dir: Option<&Path>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<CacheEvent>), WriteCacheError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut entries = BTreeMap::new();
        let path = match dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(CACHE_FILE);
                if tokio::fs::try_exists(&path).await? {
                    let raw = tokio::fs::read(&path).await?;
                    let restored: Vec<PendingWrite> = serde_json::from_slice(&raw)?;
                    for pending in restored {
                        entries.insert(
                            (pending.stage.client_id, pending.stage.stage_key.clone()),
                            pending,
                        );
                    }
                    if !entries.is_empty() {
                        info!(count = entries.len(), "Restored pending funnel writes");
                    }
                }
                Some(path)
            }
            None => None,
        };

        let cache = Arc::new(Self {
            path,
            entries: Mutex::new(entries),
            events: tx,
        });
        Ok((cache, rx))
    }

    /// Queue a stage. A later write for the same stage replaces the earlier one.
    pub async fn put(&self, stage: FunnelStage, error: impl Into<String>) {
        let key = (stage.client_id, stage.stage_key.clone());
        {
            let mut entries = self.entries.lock().await;
            entries.insert(
                key.clone(),
                PendingWrite {
                    stage,
                    queued_at: Utc::now(),
                    attempts: 0,
                    last_error: error.into(),
                },
            );
            self.persist(&entries).await;
        }
        let _ = self.events.send(CacheEvent::Queued {
            client_id: key.0,
            stage_key: key.1,
        });
    }

    pub async fn get(&self, client_id: Uuid, stage_key: &str) -> Option<PendingWrite> {
        self.entries
            .lock()
            .await
            .get(&(client_id, stage_key.to_string()))
            .cloned()
    }

    pub async fn pending_for_client(&self, client_id: Uuid) -> Vec<FunnelStage> {
        self.entries
            .lock()
            .await
            .values()
            .filter(|p| p.stage.client_id == client_id)
            .map(|p| p.stage.clone())
            .collect()
    }

    pub async fn snapshot(&self) -> Vec<PendingWrite> {
        self.entries.lock().await.values().cloned().collect()
    }

    /// Drop whatever is queued for the stage.
    pub async fn remove(&self, client_id: Uuid, stage_key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(&(client_id, stage_key.to_string())).is_some();
        if removed {
            self.persist(&entries).await;
        }
        removed
    }

    /// Drop the entry only if nothing newer was queued since `queued_at`.
    async fn resolve(&self, client_id: Uuid, stage_key: &str, queued_at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().await;
        let key = (client_id, stage_key.to_string());
        if entries.get(&key).is_some_and(|p| p.queued_at == queued_at) {
            entries.remove(&key);
            self.persist(&entries).await;
            true
        } else {
            false
        }
    }

    async fn record_failure(&self, client_id: Uuid, stage_key: &str, queued_at: DateTime<Utc>, error: String) {
        let mut entries = self.entries.lock().await;
        if let Some(pending) = entries.get_mut(&(client_id, stage_key.to_string()))
            && pending.queued_at == queued_at
        {
            pending.attempts += 1;
            pending.last_error = error;
            self.persist(&entries).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn persist(&self, entries: &BTreeMap<StageKey, PendingWrite>) {
        let Some(path) = &self.path else {
            return;
        };
        let pending: Vec<&PendingWrite> = entries.values().collect();
        let result = async {
            let raw = serde_json::to_vec_pretty(&pending)?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, raw).await?;
            tokio::fs::rename(&tmp, path).await?;
            Ok::<_, WriteCacheError>(())
        }
        .await;
        if let Err(e) = result {
            error!(path = %path.display(), error = %e, "Failed to persist write cache");
        }
    }
}

/// Write errors that no retry can fix: values the database cannot store and
/// constraint violations.
pub fn is_permanent(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Encode(_) | sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => true,
        sqlx::Error::Database(db_err) => matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub synced: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Write every queued stage to the database once.
pub async fn flush_pending(pool: &SqlitePool, cache: &LocalWriteCache) -> FlushReport {
    let mut report = FlushReport::default();
    for pending in cache.snapshot().await {
        let PendingWrite { stage, queued_at, .. } = pending;
        match stage.save(pool).await {
            Ok(_) => {
                cache.resolve(stage.client_id, &stage.stage_key, queued_at).await;
                report.synced += 1;
            }
            Err(sqlx::Error::RowNotFound) => {
                warn!(
                    client_id = %stage.client_id,
                    stage = %stage.stage_key,
                    "Dropping cached write for a stage that no longer exists"
                );
                cache.resolve(stage.client_id, &stage.stage_key, queued_at).await;
                report.dropped += 1;
            }
            Err(e) if is_permanent(&e) => {
                error!(
                    client_id = %stage.client_id,
                    stage = %stage.stage_key,
                    error = %e,
                    "Dropping cached write the database rejects"
                );
                cache.resolve(stage.client_id, &stage.stage_key, queued_at).await;
                report.dropped += 1;
            }
            Err(e) => {
                cache
                    .record_failure(stage.client_id, &stage.stage_key, queued_at, e.to_string())
                    .await;
                report.failed += 1;
            }
        }
    }
    report
}

/// Background service that drains the write cache on every queued write and
/// on a fixed interval.
pub struct CacheSyncService {
    pool: SqlitePool,
    cache: Arc<LocalWriteCache>,
    events: mpsc::UnboundedReceiver<CacheEvent>,
    sync_interval: Duration,
}

impl CacheSyncService {
    pub fn spawn(
        pool: SqlitePool,
        cache: Arc<LocalWriteCache>,
        events: mpsc::UnboundedReceiver<CacheEvent>,
        sync_interval: Duration,
    ) -> JoinHandle<()> {
        let service = Self {
            pool,
            cache,
            events,
            sync_interval,
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(mut self) {
        info!("Starting write cache sync service with interval {:?}", self.sync_interval);
        let mut ticker = interval(self.sync_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                event = self.events.recv() => match event {
                    Some(CacheEvent::Queued { client_id, stage_key }) => {
                        debug!(client_id = %client_id, stage = %stage_key, "Write queued, syncing");
                    }
                    None => break,
                },
            }

            if self.cache.is_empty().await {
                continue;
            }
            let report = flush_pending(&self.pool, &self.cache).await;
            if report.failed > 0 {
                warn!(
                    synced = report.synced,
                    failed = report.failed,
                    "Write cache sync incomplete, will retry"
                );
            } else if report.synced > 0 || report.dropped > 0 {
                info!(synced = report.synced, dropped = report.dropped, "Write cache synced");
            }
        }
        info!("Write cache sync service stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::{
        DBService,
        models::{
            client::{Client, CreateClient},
            funnel::FunnelStage,
        },
        seed::seed_funnel,
    };
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (DBService, Client, Vec<FunnelStage>) {
        let db = DBService::new_in_memory().await.unwrap();
        let client = Client::create(
            &db.pool,
            &CreateClient {
                name: "Luigi's".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let stages = seed_funnel(&db.pool, client.id, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
            .await
            .unwrap();
        (db, client, stages)
    }

    #[tokio::test]
    async fn test_put_replaces_earlier_write() {
        let (_db, _client, stages) = setup().await;
        let (cache, mut rx) = LocalWriteCache::open(None).await.unwrap();

        let mut stage = stages[0].clone();
        stage.value = 1;
        cache.put(stage.clone(), "db down").await;
        stage.value = 2;
        cache.put(stage.clone(), "db still down").await;

        assert_eq!(cache.len().await, 1);
        let pending = cache.get(stage.client_id, &stage.stage_key).await.unwrap();
        assert_eq!(pending.stage.value, 2);
        assert_eq!(pending.last_error, "db still down");
        assert!(matches!(rx.recv().await, Some(CacheEvent::Queued { .. })));
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let (_db, client, stages) = setup().await;

        {
            let (cache, _rx) = LocalWriteCache::open(Some(dir.path())).await.unwrap();
            cache.put(stages[1].clone(), "offline").await;
        }

        let (cache, _rx) = LocalWriteCache::open(Some(dir.path())).await.unwrap();
        let pending = cache.pending_for_client(client.id).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].stage_key, stages[1].stage_key);
    }

    #[tokio::test]
    async fn test_flush_writes_and_clears() {
        let (db, client, stages) = setup().await;
        let (cache, _rx) = LocalWriteCache::open(None).await.unwrap();

        let mut stage = stages[0].clone();
        stage.value = 99;
        stage.notes = Some("queued".to_string());
        cache.put(stage, "offline").await;

        let report = flush_pending(&db.pool, &cache).await;
        assert_eq!(report, FlushReport { synced: 1, failed: 0, dropped: 0 });
        assert!(cache.is_empty().await);

        let stored = FunnelStage::find_by_key(&db.pool, client.id, &stages[0].stage_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.value, 99);
    }

    #[tokio::test]
    async fn test_flush_keeps_entry_on_failure() {
        let (db, _client, stages) = setup().await;
        let (cache, _rx) = LocalWriteCache::open(None).await.unwrap();
        cache.put(stages[0].clone(), "offline").await;

        db.pool.close().await;
        let report = flush_pending(&db.pool, &cache).await;

        assert_eq!(report.failed, 1);
        let pending = cache.get(stages[0].client_id, &stages[0].stage_key).await.unwrap();
        assert_eq!(pending.attempts, 1);
    }

    #[tokio::test]
    async fn test_flush_drops_deleted_stage() {
        let (db, client, stages) = setup().await;
        let (cache, _rx) = LocalWriteCache::open(None).await.unwrap();
        cache.put(stages[0].clone(), "offline").await;

        Client::delete(&db.pool, client.id).await.unwrap();
        let report = flush_pending(&db.pool, &cache).await;

        assert_eq!(report.dropped, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_flush_drops_unstorable_stage() {
        let (db, client, stages) = setup().await;
        let (cache, _rx) = LocalWriteCache::open(None).await.unwrap();

        let mut stage = stages[0].clone();
        stage.value = u64::MAX;
        cache.put(stage, "offline").await;

        let report = flush_pending(&db.pool, &cache).await;
        assert_eq!(report, FlushReport { synced: 0, failed: 0, dropped: 1 });
        assert!(cache.is_empty().await);

        let stored = FunnelStage::find_by_key(&db.pool, client.id, &stages[0].stage_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.value, stages[0].value);
    }

    #[test]
    fn test_pool_errors_are_retryable() {
        assert!(!is_permanent(&sqlx::Error::PoolClosed));
        assert!(!is_permanent(&sqlx::Error::PoolTimedOut));
        assert!(is_permanent(&sqlx::Error::Encode("out of range".into())));
    }

    #[tokio::test]
    async fn test_sync_service_drains_on_event() {
        let (db, client, stages) = setup().await;
        let (cache, rx) = LocalWriteCache::open(None).await.unwrap();
        let handle = CacheSyncService::spawn(db.pool.clone(), cache.clone(), rx, Duration::from_secs(3600));

        let mut stage = stages[2].clone();
        stage.value = 7;
        cache.put(stage, "offline").await;

        for _ in 0..50 {
            if cache.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(cache.is_empty().await);
        let stored = FunnelStage::find_by_key(&db.pool, client.id, &stages[2].stage_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.value, 7);
        handle.abort();
    }
}
