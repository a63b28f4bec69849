use std::sync::Arc;

use db::DBService;
use services::services::{
    ad_platform::{GoogleAdsClient, MetaAdsClient},
    business_profile::BusinessProfileClient,
    config::Config,
    funnel::FunnelService,
    search_console::SearchConsoleClient,
    write_cache::LocalWriteCache,
};

/// Shared handles for request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    meta_ads: Arc<MetaAdsClient>,
    google_ads: Arc<GoogleAdsClient>,
    search_console: Arc<SearchConsoleClient>,
    business_profile: Arc<BusinessProfileClient>,
    write_cache: Arc<LocalWriteCache>,
}

impl AppState {
    pub fn new(
        db: DBService,
        config: Config,
        http: reqwest::Client,
        write_cache: Arc<LocalWriteCache>,
    ) -> Self {
        Self {
            meta_ads: Arc::new(MetaAdsClient::new(http.clone(), config.meta_ads.clone())),
            google_ads: Arc::new(GoogleAdsClient::new(http.clone(), config.google_ads.clone())),
            search_console: Arc::new(SearchConsoleClient::new(
                http.clone(),
                config.search_console.clone(),
            )),
            business_profile: Arc::new(BusinessProfileClient::new(
                http,
                config.business_profile.clone(),
            )),
            config: Arc::new(config),
            db,
            write_cache,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn meta_ads(&self) -> &MetaAdsClient {
        &self.meta_ads
    }

    pub fn google_ads(&self) -> &GoogleAdsClient {
        &self.google_ads
    }

    pub fn search_console(&self) -> &SearchConsoleClient {
        &self.search_console
    }

    pub fn business_profile(&self) -> &BusinessProfileClient {
        &self.business_profile
    }

    pub fn write_cache(&self) -> &Arc<LocalWriteCache> {
        &self.write_cache
    }

    pub fn funnel_service(&self) -> FunnelService {
        FunnelService::new(self.db.pool.clone(), self.write_cache.clone())
    }
}
