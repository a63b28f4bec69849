//! Keeps every funnel stage total equal to the sum of its sources.
//!
//! Stage totals are reconciled when a funnel is loaded. Manual edits are
//! applied in memory first and then written; a failed write parks the stage in
//! the [`LocalWriteCache`] instead of rolling the edit back.

use std::sync::Arc;

use chrono::NaiveDate;
use db::{
    models::{
        client::Client,
        funnel::{DataSource, FunnelStage},
    },
    seed::seed_funnel,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    validation::{ValidationError, bounded_total, non_empty, non_negative},
    write_cache::{LocalWriteCache, is_permanent},
};

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("client {0} not found")]
    ClientNotFound(Uuid),
    #[error("funnel stage '{0}' not found")]
    StageNotFound(String),
    #[error("stage '{stage}' has no source at index {index}")]
    SourceNotFound { stage: String, index: usize },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub fn correction_note(total: u64) -> String {
    format!("Auto-corrected: total recalculated from sources ({total})")
}

/// Returns true when the stored total disagreed with its sources.
pub fn reconcile_stage(stage: &mut FunnelStage, today: NaiveDate) -> bool {
    let calculated = stage.sources_total();
    if calculated == stage.value {
        return false;
    }
    stage.value = calculated;
    stage.notes = Some(correction_note(calculated));
    stage.last_updated = today;
    true
}

/// Reconcile every stage and return the keys of those that changed.
pub fn reconcile_funnel(stages: &mut [FunnelStage], today: NaiveDate) -> Vec<String> {
    stages
        .iter_mut()
        .filter_map(|stage| reconcile_stage(stage, today).then(|| stage.stage_key.clone()))
        .collect()
}

/// Stores the total as given. Sources are not touched.
pub fn set_stage_total(
    stage: &mut FunnelStage,
    value: i64,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    let value = non_negative("value", value)?;
    stage.value = value;
    stage.data_source = DataSource::Manual;
    stage.last_updated = today;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct SourceEdit {
    pub name: Option<String>,
    pub value: Option<i64>,
}

/// Edit one source and recompute the stage total. Nothing is changed unless
/// the whole edit is valid.
pub fn edit_source(
    stage: &mut FunnelStage,
    index: usize,
    edit: &SourceEdit,
    today: NaiveDate,
) -> Result<(), FunnelError> {
    if edit.name.is_none() && edit.value.is_none() {
        return Err(ValidationError::NoChanges.into());
    }
    if index >= stage.sources.len() {
        return Err(FunnelError::SourceNotFound {
            stage: stage.stage_key.clone(),
            index,
        });
    }
    let name = edit.name.as_deref().map(|n| non_empty("name", n)).transpose()?;
    let value = edit.value.map(|v| non_negative("value", v)).transpose()?;
    let total = bounded_total(
        "value",
        stage.sources.iter().enumerate().map(|(i, source)| match value {
            Some(value) if i == index => value,
            _ => source.value,
        }),
    )?;

    let source = &mut stage.sources[index];
    if let Some(name) = name {
        source.name = name;
    }
    if let Some(value) = value {
        source.value = value;
    }
    stage.value = total;
    stage.data_source = DataSource::Manual;
    stage.last_updated = today;
    Ok(())
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct FunnelView {
    pub client_id: Uuid,
    pub stages: Vec<FunnelStage>,
    /// Stage keys whose totals were corrected during this load.
    pub corrected: Vec<String>,
    pub sync_error: Option<String>,
    pub pending_writes: usize,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct FunnelUpdate {
    pub stage: FunnelStage,
    pub persisted: bool,
    pub sync_error: Option<String>,
}

#[derive(Clone)]
pub struct FunnelService {
    pool: SqlitePool,
    cache: Arc<LocalWriteCache>,
}

impl FunnelService {
    pub fn new(pool: SqlitePool, cache: Arc<LocalWriteCache>) -> Self {
        Self { pool, cache }
    }

    /// Load a client's funnel, seeding the default stages if it has none and
    /// writing back any corrected totals.
    pub async fn load(&self, client_id: Uuid, today: NaiveDate) -> Result<FunnelView, FunnelError> {
        if Client::find_by_id(&self.pool, client_id).await?.is_none() {
            return Err(FunnelError::ClientNotFound(client_id));
        }

        let mut stages = FunnelStage::find_by_client_id(&self.pool, client_id).await?;
        if stages.is_empty() {
            seed_funnel(&self.pool, client_id, today).await?;
            stages = FunnelStage::find_by_client_id(&self.pool, client_id).await?;
        }

        // Unsynced local writes are newer than what the database holds.
        for pending in self.cache.pending_for_client(client_id).await {
            if let Some(stage) = stages.iter_mut().find(|s| s.stage_key == pending.stage_key) {
                *stage = pending;
            }
        }

        let corrected = reconcile_funnel(&mut stages, today);
        let mut sync_error = None;
        if !corrected.is_empty() {
            info!(client_id = %client_id, stages = ?corrected, "Corrected funnel totals");
            for stage in stages.iter_mut().filter(|s| corrected.contains(&s.stage_key)) {
                let update = self.persist(stage.clone()).await?;
                *stage = update.stage;
                if update.sync_error.is_some() {
                    sync_error = update.sync_error;
                }
            }
        }

        let pending_writes = self.cache.pending_for_client(client_id).await.len();
        if sync_error.is_none() && pending_writes > 0 {
            sync_error = Some(format!("{pending_writes} funnel change(s) not yet saved to the database"));
        }

        Ok(FunnelView {
            client_id,
            stages,
            corrected,
            sync_error,
            pending_writes,
        })
    }

    pub async fn set_stage_total(
        &self,
        client_id: Uuid,
        stage_key: &str,
        value: i64,
        today: NaiveDate,
    ) -> Result<FunnelUpdate, FunnelError> {
        let mut stage = self.current(client_id, stage_key).await?;
        set_stage_total(&mut stage, value, today)?;
        debug!(client_id = %client_id, stage = stage_key, value = stage.value, "Stage total set");
        self.persist(stage).await
    }

    pub async fn edit_source(
        &self,
        client_id: Uuid,
        stage_key: &str,
        index: usize,
        edit: &SourceEdit,
        today: NaiveDate,
    ) -> Result<FunnelUpdate, FunnelError> {
        let mut stage = self.current(client_id, stage_key).await?;
        edit_source(&mut stage, index, edit, today)?;
        debug!(client_id = %client_id, stage = stage_key, index, value = stage.value, "Stage source edited");
        self.persist(stage).await
    }

    async fn current(&self, client_id: Uuid, stage_key: &str) -> Result<FunnelStage, FunnelError> {
        if let Some(pending) = self.cache.get(client_id, stage_key).await {
            return Ok(pending.stage);
        }
        FunnelStage::find_by_key(&self.pool, client_id, stage_key)
            .await?
            .ok_or_else(|| FunnelError::StageNotFound(stage_key.to_string()))
    }

    /// Write the stage; on failure keep it in the local cache and report the
    /// error alongside the new state.
    async fn persist(&self, stage: FunnelStage) -> Result<FunnelUpdate, FunnelError> {
        match stage.save(&self.pool).await {
            Ok(saved) => {
                self.cache.remove(saved.client_id, &saved.stage_key).await;
                Ok(FunnelUpdate {
                    stage: saved,
                    persisted: true,
                    sync_error: None,
                })
            }
            Err(sqlx::Error::RowNotFound) => Err(FunnelError::StageNotFound(stage.stage_key)),
            Err(e) if is_permanent(&e) => {
                warn!(
                    client_id = %stage.client_id,
                    stage = %stage.stage_key,
                    error = %e,
                    "Funnel write rejected"
                );
                Err(FunnelError::Database(e))
            }
            Err(e) => {
                warn!(
                    client_id = %stage.client_id,
                    stage = %stage.stage_key,
                    error = %e,
                    "Funnel write failed, keeping change in local cache"
                );
                let message = format!("Saved locally, database write failed: {e}");
                self.cache.put(stage.clone(), e.to_string()).await;
                Ok(FunnelUpdate {
                    stage,
                    persisted: false,
                    sync_error: Some(message),
                })
            }
        }
    }
}
