use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// A restaurant client of the agency and the vendor accounts linked to it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub website: Option<String>,
    pub google_ads_customer_id: Option<String>,
    pub meta_ad_account_id: Option<String>,
    pub search_console_site_url: Option<String>,
    pub business_profile_location_id: Option<String>,
    /// Search terms that identify the restaurant by name.
    #[sqlx(json)]
    pub brand_terms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateClient {
    pub name: String,
    pub slug: Option<String>,
    pub website: Option<String>,
    pub google_ads_customer_id: Option<String>,
    pub meta_ad_account_id: Option<String>,
    pub search_console_site_url: Option<String>,
    pub business_profile_location_id: Option<String>,
    #[serde(default)]
    pub brand_terms: Vec<String>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub website: Option<String>,
    pub google_ads_customer_id: Option<String>,
    pub meta_ad_account_id: Option<String>,
    pub search_console_site_url: Option<String>,
    pub business_profile_location_id: Option<String>,
    pub brand_terms: Option<Vec<String>>,
}

const CLIENT_COLUMNS: &str = "id, name, slug, website, google_ads_customer_id, meta_ad_account_id, \
     search_console_site_url, business_profile_location_id, brand_terms, created_at, updated_at";

impl Client {
    /// Brand terms, falling back to the client name when none were configured.
    pub fn effective_brand_terms(&self) -> Vec<String> {
        if self.brand_terms.iter().any(|t| !t.trim().is_empty()) {
            self.brand_terms
                .iter()
                .filter(|t| !t.trim().is_empty())
                .cloned()
                .collect()
        } else {
            vec![self.name.clone()]
        }
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateClient) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let slug = data
            .slug
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(&data.name));

        sqlx::query_as::<_, Client>(&format!(
            r#"INSERT INTO clients (id, name, slug, website, google_ads_customer_id, meta_ad_account_id,
                search_console_site_url, business_profile_location_id, brand_terms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CLIENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.name.trim())
        .bind(slug)
        .bind(&data.website)
        .bind(&data.google_ads_customer_id)
        .bind(&data.meta_ad_account_id)
        .bind(&data.search_console_site_url)
        .bind(&data.business_profile_location_id)
        .bind(Json(&data.brand_terms))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateClient,
    ) -> Result<Option<Self>, sqlx::Error> {
        let brand_terms = data.brand_terms.as_ref().map(Json);
        sqlx::query_as::<_, Client>(&format!(
            r#"UPDATE clients SET
                name = COALESCE($2, name),
                website = COALESCE($3, website),
                google_ads_customer_id = COALESCE($4, google_ads_customer_id),
                meta_ad_account_id = COALESCE($5, meta_ad_account_id),
                search_console_site_url = COALESCE($6, search_console_site_url),
                business_profile_location_id = COALESCE($7, business_profile_location_id),
                brand_terms = COALESCE($8, brand_terms),
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.website)
        .bind(&data.google_ads_customer_id)
        .bind(&data.meta_ad_account_id)
        .bind(&data.search_console_site_url)
        .bind(&data.business_profile_location_id)
        .bind(brand_terms)
        .fetch_optional(pool)
        .await
    }

    /// Returns the number of rows removed. Funnel and checklist rows cascade.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Lowercase, ASCII-alphanumeric words joined by `-`.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
