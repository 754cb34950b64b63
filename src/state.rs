use chrono_tz::Tz;
use std::sync::Arc;

use crate::analytics::LocalSources;
use crate::cache::AppCache;
use crate::config::Settings;
use crate::db::Pool;
use crate::error::Result;
use crate::geo::GeoIpLookup;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub cache: AppCache,
    pub settings: Arc<Settings>,
    pub geo: Arc<GeoIpLookup>,
    pub site_tz: Tz,
    pub local_sources: Arc<LocalSources>,
}

impl AppState {
    /// Fails when the configured site timezone is not a valid IANA zone.
    pub fn new(pool: Pool, cache: AppCache, settings: Settings, geo: GeoIpLookup) -> Result<Self> {
        let site_tz = settings.timezone()?;
        let local_sources = LocalSources::from_config(&settings.local_networks);

        Ok(Self {
            pool,
            cache,
            settings: Arc::new(settings),
            geo: Arc::new(geo),
            site_tz,
            local_sources: Arc::new(local_sources),
        })
    }
}
