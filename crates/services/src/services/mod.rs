pub mod ad_platform;
pub mod business_profile;
pub mod config;
pub mod dashboard;
pub mod database_validator;
pub mod date_range;
pub mod demo;
pub mod funnel;
pub mod google_api;
pub mod query_categorizer;
pub mod search_console;
pub mod validation;
pub mod vendor;
pub mod write_cache;

#[cfg(test)]
pub(crate) mod test_support;
