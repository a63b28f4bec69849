//! Buckets Search Console queries into restaurant-relevant categories.
//!
//! Matching is a case-insensitive substring test against fixed keyword lists
//! (the client's brand terms for [`QueryCategory::RestaurantName`]). A query
//! lands in every category it matches, so bucket aggregates overlap.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::search_console::SearchQueryRecord;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueryCategory {
    RestaurantName,
    Location,
    Menu,
    Cuisine,
    Reservation,
    LocalBusiness,
    Directions,
    Hours,
    Phone,
}

impl QueryCategory {
    pub const ALL: [QueryCategory; 9] = [
        QueryCategory::RestaurantName,
        QueryCategory::Location,
        QueryCategory::Menu,
        QueryCategory::Cuisine,
        QueryCategory::Reservation,
        QueryCategory::LocalBusiness,
        QueryCategory::Directions,
        QueryCategory::Hours,
        QueryCategory::Phone,
    ];

    /// Categories that make up local search performance.
    pub const LOCAL: [QueryCategory; 3] = [
        QueryCategory::Location,
        QueryCategory::LocalBusiness,
        QueryCategory::Directions,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            // Brand terms are per client.
            QueryCategory::RestaurantName => &[],
            QueryCategory::Location => &[
                "near me", "nearby", "map", "directions", "location", "closest", "around me",
            ],
            QueryCategory::Menu => &[
                "menu", "dish", "special", "appetizer", "dessert", "price", "drinks", "lunch",
                "dinner", "brunch",
            ],
            QueryCategory::Cuisine => &[
                "pizza", "pasta", "italian", "mexican", "sushi", "chinese", "thai", "indian",
                "burger", "bbq", "vegan", "seafood", "steak", "tacos", "ramen",
            ],
            QueryCategory::Reservation => &["reservation", "reserve", "book a table", "booking", "opentable"],
            QueryCategory::LocalBusiness => &[
                "restaurant", "restaurants", "food", "takeout", "delivery", "places to eat",
                "best", "cafe", "bar",
            ],
            QueryCategory::Directions => &["directions", "how to get to", "address", "parking", "route to"],
            QueryCategory::Hours => &["hours", "open now", "opening", "closing", "open late", "open today"],
            QueryCategory::Phone => &["phone", "number", "call", "contact"],
        }
    }
}

/// Impression and click sums plus unweighted means of ctr and position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct QueryAggregate {
    pub queries: usize,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub position: f64,
}

impl QueryAggregate {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a SearchQueryRecord>) -> Self {
        let mut agg = QueryAggregate::default();
        let (mut ctr_sum, mut position_sum) = (0.0, 0.0);
        for r in records {
            agg.queries += 1;
            agg.impressions += r.impressions;
            agg.clicks += r.clicks;
            ctr_sum += r.ctr;
            position_sum += r.position;
        }
        if agg.queries > 0 {
            agg.ctr = ctr_sum / agg.queries as f64;
            agg.position = position_sum / agg.queries as f64;
        }
        agg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: QueryCategory,
    #[serde(flatten)]
    #[ts(flatten)]
    pub aggregate: QueryAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedQuery {
    #[serde(flatten)]
    #[ts(flatten)]
    pub record: SearchQueryRecord,
    pub categories: Vec<QueryCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SearchInsights {
    pub total: QueryAggregate,
    pub categories: Vec<CategorySummary>,
    pub local_search: QueryAggregate,
    pub top_queries: Vec<CategorizedQuery>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCategorizer {
    brand_terms: Vec<String>,
}

impl QueryCategorizer {
    pub fn new<I, S>(brand_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let brand_terms = brand_terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { brand_terms }
    }

    pub fn categorize(&self, query: &str) -> BTreeSet<QueryCategory> {
        let query = query.to_lowercase();
        QueryCategory::ALL
            .into_iter()
            .filter(|c| self.matches_normalized(&query, *c))
            .collect()
    }

    pub fn matches(&self, query: &str, category: QueryCategory) -> bool {
        self.matches_normalized(&query.to_lowercase(), category)
    }

    fn matches_normalized(&self, query: &str, category: QueryCategory) -> bool {
        match category {
            QueryCategory::RestaurantName => self.brand_terms.iter().any(|t| query.contains(t.as_str())),
            c => c.keywords().iter().any(|k| query.contains(k)),
        }
    }

    pub fn bucket<'a>(
        &self,
        records: &'a [SearchQueryRecord],
        category: QueryCategory,
    ) -> Vec<&'a SearchQueryRecord> {
        records
            .iter()
            .filter(|r| self.matches(&r.query, category))
            .collect()
    }

    /// Every category is present, empty buckets included.
    pub fn buckets<'a>(
        &self,
        records: &'a [SearchQueryRecord],
    ) -> BTreeMap<QueryCategory, Vec<&'a SearchQueryRecord>> {
        let mut out: BTreeMap<_, Vec<_>> = QueryCategory::ALL.into_iter().map(|c| (c, Vec::new())).collect();
        for record in records {
            for category in self.categorize(&record.query) {
                out.entry(category).or_default().push(record);
            }
        }
        out
    }

    /// Rows matching any local category, each counted once.
    pub fn local_search<'a>(&self, records: &'a [SearchQueryRecord]) -> Vec<&'a SearchQueryRecord> {
        records
            .iter()
            .filter(|r| {
                let query = r.query.to_lowercase();
                QueryCategory::LOCAL
                    .iter()
                    .any(|c| self.matches_normalized(&query, *c))
            })
            .collect()
    }

    pub fn insights(&self, records: &[SearchQueryRecord], top_n: usize) -> SearchInsights {
        let categories = self
            .buckets(records)
            .into_iter()
            .map(|(category, rows)| CategorySummary {
                category,
                aggregate: QueryAggregate::from_records(rows),
            })
            .collect();

        let mut ranked: Vec<&SearchQueryRecord> = records.iter().collect();
        ranked.sort_by(|a, b| {
            b.clicks
                .cmp(&a.clicks)
                .then_with(|| b.impressions.cmp(&a.impressions))
                .then_with(|| a.query.cmp(&b.query))
        });
        let top_queries = ranked
            .into_iter()
            .take(top_n)
            .map(|r| CategorizedQuery {
                record: r.clone(),
                categories: self.categorize(&r.query).into_iter().collect(),
            })
            .collect();

        SearchInsights {
            total: QueryAggregate::from_records(records),
            categories,
            local_search: QueryAggregate::from_records(self.local_search(records)),
            top_queries,
        }
    }
}
