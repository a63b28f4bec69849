//! Starter content for new clients: the demo funnel and the onboarding checklist.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    checklist::{
        ChecklistItem, ChecklistSection, ChecklistSubtask, UpsertChecklistItem,
        UpsertChecklistSection, UpsertChecklistSubtask,
    },
    funnel::{CreateFunnelStage, DataSource, FunnelSource, FunnelStage},
};

fn stage(key: &str, label: &str, position: i64, sources: &[(&str, u64)]) -> CreateFunnelStage {
    let sources: Vec<FunnelSource> = sources
        .iter()
        .map(|(name, value)| FunnelSource::new(*name, *value))
        .collect();
    CreateFunnelStage {
        stage_key: key.to_string(),
        label: label.to_string(),
        position,
        value: sources.iter().map(|s| s.value).sum(),
        sources,
        data_source: DataSource::Imported,
        notes: None,
    }
}

/// impressions → interest → opt-ins → redemptions, with representative numbers.
pub fn default_funnel() -> Vec<CreateFunnelStage> {
    vec![
        stage(
            "impressions",
            "Impressions",
            0,
            &[("Google Ads", 12_400), ("Meta Ads", 8_900), ("Organic Search", 3_200)],
        ),
        stage(
            "interest",
            "Interest",
            1,
            &[("Website Visits", 1_850), ("Menu Views", 920), ("Direction Requests", 410)],
        ),
        stage(
            "opt_ins",
            "Opt-ins",
            2,
            &[("Email Signups", 340), ("SMS Signups", 180), ("Offer Claims", 260)],
        ),
        stage(
            "redemptions",
            "Redemptions",
            3,
            &[("In-Store", 145), ("Online Orders", 95)],
        ),
    ]
}

/// Insert the default funnel for a client. Stages already present are left alone.
pub async fn seed_funnel(
    pool: &SqlitePool,
    client_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<FunnelStage>, sqlx::Error> {
    let mut created = Vec::new();
    for data in default_funnel() {
        if FunnelStage::find_by_key(pool, client_id, &data.stage_key)
            .await?
            .is_none()
        {
            created.push(FunnelStage::create(pool, client_id, &data, today).await?);
        }
    }
    if !created.is_empty() {
        info!(client_id = %client_id, stages = created.len(), "Seeded default funnel");
    }
    Ok(created)
}

struct ItemTemplate {
    key: &'static str,
    title: &'static str,
    description: Option<&'static str>,
    subtasks: &'static [(&'static str, &'static str)],
}

struct SectionTemplate {
    key: &'static str,
    title: &'static str,
    items: &'static [ItemTemplate],
}

const DEFAULT_CHECKLIST: &[SectionTemplate] = &[
    SectionTemplate {
        key: "onboarding",
        title: "Onboarding",
        items: &[
            ItemTemplate {
                key: "brand-assets",
                title: "Collect brand assets",
                description: Some("Logo, food photography and the current menu"),
                subtasks: &[
                    ("logo", "Logo files"),
                    ("photos", "Food and interior photos"),
                    ("menu", "Menu PDF"),
                ],
            },
            ItemTemplate {
                key: "google-ads-access",
                title: "Grant Google Ads access",
                description: None,
                subtasks: &[],
            },
            ItemTemplate {
                key: "meta-access",
                title: "Grant Meta Business Manager access",
                description: Some("Partner access with ads_management and ads_read"),
                subtasks: &[],
            },
            ItemTemplate {
                key: "search-console",
                title: "Verify Search Console property",
                description: None,
                subtasks: &[],
            },
            ItemTemplate {
                key: "business-profile",
                title: "Claim Google Business Profile",
                description: None,
                subtasks: &[
                    ("hours", "Confirm opening hours"),
                    ("phone", "Confirm phone number"),
                ],
            },
        ],
    },
    SectionTemplate {
        key: "launch",
        title: "Campaign Launch",
        items: &[
            ItemTemplate {
                key: "landing-page",
                title: "Build offer landing page",
                description: None,
                subtasks: &[],
            },
            ItemTemplate {
                key: "conversion-tracking",
                title: "Configure conversion tracking",
                description: None,
                subtasks: &[("pixel", "Meta pixel"), ("gtag", "Google tag")],
            },
            ItemTemplate {
                key: "google-search",
                title: "Launch Google Ads search campaign",
                description: None,
                subtasks: &[],
            },
            ItemTemplate {
                key: "meta-awareness",
                title: "Launch Meta awareness campaign",
                description: None,
                subtasks: &[],
            },
        ],
    },
    SectionTemplate {
        key: "reporting",
        title: "Monthly Reporting",
        items: &[
            ItemTemplate {
                key: "funnel-review",
                title: "Review funnel numbers",
                description: None,
                subtasks: &[],
            },
            ItemTemplate {
                key: "report",
                title: "Send performance report",
                description: None,
                subtasks: &[],
            },
        ],
    },
];

/// Upsert the default checklist. Safe to run repeatedly; completion state survives.
pub async fn seed_checklist(pool: &SqlitePool, client_id: Uuid) -> Result<(), sqlx::Error> {
    for (section_pos, section) in DEFAULT_CHECKLIST.iter().enumerate() {
        let section_row = ChecklistSection::upsert(
            pool,
            client_id,
            &UpsertChecklistSection {
                section_key: section.key.to_string(),
                title: section.title.to_string(),
                position: section_pos as i64,
            },
        )
        .await?;

        for (item_pos, item) in section.items.iter().enumerate() {
            let item_row = ChecklistItem::upsert(
                pool,
                section_row.id,
                &UpsertChecklistItem {
                    item_key: item.key.to_string(),
                    title: item.title.to_string(),
                    description: item.description.map(str::to_string),
                    position: item_pos as i64,
                },
            )
            .await?;

            for (subtask_pos, (key, title)) in item.subtasks.iter().enumerate() {
                ChecklistSubtask::upsert(
                    pool,
                    item_row.id,
                    &UpsertChecklistSubtask {
                        subtask_key: key.to_string(),
                        title: title.to_string(),
                        position: subtask_pos as i64,
                    },
                )
                .await?;
            }
        }
    }

    info!(client_id = %client_id, "Seeded default checklist");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            checklist::ClientChecklist,
            client::{Client, CreateClient},
        },
    };

    async fn client(db: &DBService) -> Client {
        Client::create(
            &db.pool,
            &CreateClient {
                name: "Pho House".to_string(),
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
        .unwrap()
    }

    #[test]
    fn test_default_funnel_totals_match_sources() {
        let funnel = default_funnel();
        assert_eq!(funnel.len(), 4);
        assert_eq!(funnel[0].value, 24_500);
        for stage in funnel {
            assert_eq!(stage.value, stage.sources.iter().map(|s| s.value).sum::<u64>());
        }
    }

    #[tokio::test]
    async fn test_seed_funnel_only_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let client = client(&db).await;
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        assert_eq!(seed_funnel(&db.pool, client.id, today).await.unwrap().len(), 4);
        assert!(seed_funnel(&db.pool, client.id, today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_checklist_twice_keeps_shape() {
        let db = DBService::new_in_memory().await.unwrap();
        let client = client(&db).await;

        seed_checklist(&db.pool, client.id).await.unwrap();
        seed_checklist(&db.pool, client.id).await.unwrap();

        let checklist = ClientChecklist::load(&db.pool, client.id).await.unwrap();
        assert_eq!(checklist.sections.len(), 3);
        assert_eq!(checklist.progress.total, 11);
        assert_eq!(checklist.sections[0].items[0].subtasks.len(), 3);
    }
}
