use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Where a stage's numbers came from.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "data_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataSource {
    Api,
    #[default]
    Manual,
    Imported,
}

/// A named contributor to a stage total, e.g. "Google Ads" feeding "impressions".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct FunnelSource {
    pub name: String,
    pub value: u64,
}

impl FunnelSource {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One point of a client's marketing funnel.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct FunnelStage {
    pub id: Uuid,
    pub client_id: Uuid,
    pub stage_key: String,
    pub label: String,
    pub position: i64,
    #[sqlx(try_from = "i64")]
    pub value: u64,
    #[sqlx(json)]
    pub sources: Vec<FunnelSource>,
    pub last_updated: NaiveDate,
    pub data_source: DataSource,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Stage content used when creating rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFunnelStage {
    pub stage_key: String,
    pub label: String,
    pub position: i64,
    pub value: u64,
    pub sources: Vec<FunnelSource>,
    pub data_source: DataSource,
    pub notes: Option<String>,
}

const STAGE_COLUMNS: &str = "id, client_id, stage_key, label, position, value, sources, \
     last_updated, data_source, notes, updated_at";

fn value_to_i64(value: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

impl FunnelStage {
    /// Saturates at `u64::MAX`.
    pub fn sources_total(&self) -> u64 {
        self.sources
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.value))
    }

    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FunnelStage>(&format!(
            "SELECT {STAGE_COLUMNS} FROM funnel_stages WHERE client_id = $1 ORDER BY position ASC, stage_key ASC"
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_key(
        pool: &SqlitePool,
        client_id: Uuid,
        stage_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FunnelStage>(&format!(
            "SELECT {STAGE_COLUMNS} FROM funnel_stages WHERE client_id = $1 AND stage_key = $2"
        ))
        .bind(client_id)
        .bind(stage_key)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        client_id: Uuid,
        data: &CreateFunnelStage,
        last_updated: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, FunnelStage>(&format!(
            r#"INSERT INTO funnel_stages (id, client_id, stage_key, label, position, value, sources,
                last_updated, data_source, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {STAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(client_id)
        .bind(&data.stage_key)
        .bind(&data.label)
        .bind(data.position)
        .bind(value_to_i64(data.value)?)
        .bind(Json(&data.sources))
        .bind(last_updated)
        .bind(data.data_source)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    /// Overwrite the mutable content of a stage in a single statement, so the
    /// total and its sources are always written together.
    pub async fn save(&self, pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FunnelStage>(&format!(
            r#"UPDATE funnel_stages SET
                label = $3,
                value = $4,
                sources = $5,
                last_updated = $6,
                data_source = $7,
                notes = $8,
                updated_at = datetime('now', 'subsec')
            WHERE client_id = $1 AND stage_key = $2
            RETURNING {STAGE_COLUMNS}"#
        ))
        .bind(self.client_id)
        .bind(&self.stage_key)
        .bind(&self.label)
        .bind(value_to_i64(self.value)?)
        .bind(Json(&self.sources))
        .bind(self.last_updated)
        .bind(self.data_source)
        .bind(&self.notes)
        .fetch_optional(pool)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
    }
}
