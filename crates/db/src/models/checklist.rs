use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChecklistSection {
    pub id: Uuid,
    pub client_id: Uuid,
    pub section_key: String,
    pub title: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub section_id: Uuid,
    pub item_key: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChecklistSubtask {
    pub id: Uuid,
    pub item_id: Uuid,
    pub subtask_key: String,
    pub title: String,
    pub position: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertChecklistSection {
    pub section_key: String,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertChecklistItem {
    pub item_key: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertChecklistSubtask {
    pub subtask_key: String,
    pub title: String,
    pub position: i64,
}

/// Completed/total counts and their ratio in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ChecklistProgress {
    pub completed: u32,
    pub total: u32,
    pub ratio: f64,
}

impl ChecklistProgress {
    pub fn from_counts(completed: u32, total: u32) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            f64::from(completed) / f64::from(total)
        };
        Self {
            completed,
            total,
            ratio,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self::from_counts(self.completed + other.completed, self.total + other.total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChecklistItemWithSubtasks {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: ChecklistItem,
    pub subtasks: Vec<ChecklistSubtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChecklistSectionWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub section: ChecklistSection,
    pub items: Vec<ChecklistItemWithSubtasks>,
    pub progress: ChecklistProgress,
}

/// A client's whole checklist with overall progress.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClientChecklist {
    pub client_id: Uuid,
    pub sections: Vec<ChecklistSectionWithItems>,
    pub progress: ChecklistProgress,
}

const SECTION_COLUMNS: &str = "id, client_id, section_key, title, position, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, section_id, item_key, title, description, position, completed, \
     completed_at, created_at, updated_at";
const SUBTASK_COLUMNS: &str = "id, item_id, subtask_key, title, position, completed, completed_at, \
     created_at, updated_at";

impl ChecklistSection {
    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistSection>(&format!(
            "SELECT {SECTION_COLUMNS} FROM checklist_sections WHERE client_id = $1 ORDER BY position ASC"
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update by `(client_id, section_key)`.
    pub async fn upsert(
        pool: &SqlitePool,
        client_id: Uuid,
        data: &UpsertChecklistSection,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ChecklistSection>(&format!(
            r#"INSERT INTO checklist_sections (id, client_id, section_key, title, position)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(client_id, section_key) DO UPDATE SET
                title = excluded.title,
                position = excluded.position,
                updated_at = datetime('now', 'subsec')
            RETURNING {SECTION_COLUMNS}"#
        ))
        .bind(id)
        .bind(client_id)
        .bind(&data.section_key)
        .bind(&data.title)
        .bind(data.position)
        .fetch_one(pool)
        .await
    }
}

impl ChecklistItem {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_section_id(
        pool: &SqlitePool,
        section_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE section_id = $1 ORDER BY position ASC"
        ))
        .bind(section_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update by `(section_id, item_key)`. Completion state is kept.
    pub async fn upsert(
        pool: &SqlitePool,
        section_id: Uuid,
        data: &UpsertChecklistItem,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"INSERT INTO checklist_items (id, section_id, item_key, title, description, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(section_id, item_key) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                position = excluded.position,
                updated_at = datetime('now', 'subsec')
            RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(section_id)
        .bind(&data.item_key)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.position)
        .fetch_one(pool)
        .await
    }

    pub async fn set_completed(
        pool: &SqlitePool,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let completed_at = completed.then(Utc::now);
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"UPDATE checklist_items SET
                completed = $2,
                completed_at = $3,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(completed)
        .bind(completed_at)
        .fetch_optional(pool)
        .await
    }
}

impl ChecklistSubtask {
    pub async fn find_by_item_id(
        pool: &SqlitePool,
        item_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistSubtask>(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM checklist_subtasks WHERE item_id = $1 ORDER BY position ASC"
        ))
        .bind(item_id)
        .fetch_all(pool)
        .await
    }

    /// Insert or update by `(item_id, subtask_key)`. Completion state is kept.
    pub async fn upsert(
        pool: &SqlitePool,
        item_id: Uuid,
        data: &UpsertChecklistSubtask,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ChecklistSubtask>(&format!(
            r#"INSERT INTO checklist_subtasks (id, item_id, subtask_key, title, position)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(item_id, subtask_key) DO UPDATE SET
                title = excluded.title,
                position = excluded.position,
                updated_at = datetime('now', 'subsec')
            RETURNING {SUBTASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(item_id)
        .bind(&data.subtask_key)
        .bind(&data.title)
        .bind(data.position)
        .fetch_one(pool)
        .await
    }

    pub async fn set_completed(
        pool: &SqlitePool,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let completed_at = completed.then(Utc::now);
        sqlx::query_as::<_, ChecklistSubtask>(&format!(
            r#"UPDATE checklist_subtasks SET
                completed = $2,
                completed_at = $3,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {SUBTASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(completed)
        .bind(completed_at)
        .fetch_optional(pool)
        .await
    }
}

impl ClientChecklist {
    /// Load every section, item and subtask for a client and compute progress.
    /// Progress counts items only; subtasks are informational.
    pub async fn load(pool: &SqlitePool, client_id: Uuid) -> Result<Self, sqlx::Error> {
        let mut sections = Vec::new();
        let mut overall = ChecklistProgress::default();

        for section in ChecklistSection::find_by_client_id(pool, client_id).await? {
            let mut items = Vec::new();
            for item in ChecklistItem::find_by_section_id(pool, section.id).await? {
                let subtasks = ChecklistSubtask::find_by_item_id(pool, item.id).await?;
                items.push(ChecklistItemWithSubtasks { item, subtasks });
            }

            let completed = items.iter().filter(|i| i.item.completed).count() as u32;
            let progress = ChecklistProgress::from_counts(completed, items.len() as u32);
            overall = overall.merge(progress);

            sections.push(ChecklistSectionWithItems {
                section,
                items,
                progress,
            });
        }

        Ok(Self {
            client_id,
            sections,
            progress: overall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::client::{Client, CreateClient},
    };

    async fn setup() -> (DBService, Client) {
        let db = DBService::new_in_memory().await.unwrap();
        let client = Client::create(
            &db.pool,
            &CreateClient {
                name: "Taco Town".to_string(),
                slug: None,
                website: None,
                google_ads_customer_id: None,
                meta_ad_account_id: None,
                search_console_site_url: None,
                business_profile_location_id: None,
                brand_terms: vec![],
            },
        )
        .await
        .unwrap();
        (db, client)
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(ChecklistProgress::from_counts(0, 0).ratio, 0.0);
        assert_eq!(ChecklistProgress::from_counts(1, 4).ratio, 0.25);
        let merged = ChecklistProgress::from_counts(1, 2).merge(ChecklistProgress::from_counts(1, 2));
        assert_eq!(merged, ChecklistProgress::from_counts(2, 4));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_natural_keys() {
        let (db, client) = setup().await;
        let section_data = UpsertChecklistSection {
            section_key: "onboarding".to_string(),
            title: "Onboarding".to_string(),
            position: 0,
        };
        let first = ChecklistSection::upsert(&db.pool, client.id, &section_data).await.unwrap();
        let second = ChecklistSection::upsert(
            &db.pool,
            client.id,
            &UpsertChecklistSection {
                title: "Client Onboarding".to_string(),
                ..section_data
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "Client Onboarding");
        let sections = ChecklistSection::find_by_client_id(&db.pool, client.id).await.unwrap();
        assert_eq!(sections.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_item_keeps_completion() {
        let (db, client) = setup().await;
        let section = ChecklistSection::upsert(
            &db.pool,
            client.id,
            &UpsertChecklistSection {
                section_key: "launch".to_string(),
                title: "Launch".to_string(),
                position: 0,
            },
        )
        .await
        .unwrap();
        let data = UpsertChecklistItem {
            item_key: "tracking".to_string(),
            title: "Configure conversion tracking".to_string(),
            description: None,
            position: 0,
        };
        let item = ChecklistItem::upsert(&db.pool, section.id, &data).await.unwrap();
        ChecklistItem::set_completed(&db.pool, item.id, true).await.unwrap();

        let again = ChecklistItem::upsert(&db.pool, section.id, &data).await.unwrap();
        assert_eq!(again.id, item.id);
        assert!(again.completed);
        assert!(again.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_load_computes_progress() {
        let (db, client) = setup().await;
        let section = ChecklistSection::upsert(
            &db.pool,
            client.id,
            &UpsertChecklistSection {
                section_key: "onboarding".to_string(),
                title: "Onboarding".to_string(),
                position: 0,
            },
        )
        .await
        .unwrap();

        let mut item_ids = Vec::new();
        for (i, key) in ["assets", "ads-access"].iter().enumerate() {
            let item = ChecklistItem::upsert(
                &db.pool,
                section.id,
                &UpsertChecklistItem {
                    item_key: key.to_string(),
                    title: key.to_string(),
                    description: None,
                    position: i as i64,
                },
            )
            .await
            .unwrap();
            item_ids.push(item.id);
        }
        let subtask = ChecklistSubtask::upsert(
            &db.pool,
            item_ids[0],
            &UpsertChecklistSubtask {
                subtask_key: "logo".to_string(),
                title: "Logo files".to_string(),
                position: 0,
            },
        )
        .await
        .unwrap();

        ChecklistItem::set_completed(&db.pool, item_ids[0], true).await.unwrap();
        let toggled = ChecklistSubtask::set_completed(&db.pool, subtask.id, true)
            .await
            .unwrap()
            .unwrap();
        assert!(toggled.completed);

        let checklist = ClientChecklist::load(&db.pool, client.id).await.unwrap();
        assert_eq!(checklist.sections.len(), 1);
        assert_eq!(checklist.sections[0].items.len(), 2);
        assert_eq!(checklist.sections[0].items[0].subtasks.len(), 1);
        assert_eq!(checklist.progress, ChecklistProgress::from_counts(1, 2));
    }

    #[tokio::test]
    async fn test_set_completed_unknown_item() {
        let (db, _client) = setup().await;
        let result = ChecklistItem::set_completed(&db.pool, Uuid::new_v4(), true)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
