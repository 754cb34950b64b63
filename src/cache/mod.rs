use moka::future::Cache;
use std::net::IpAddr;
use std::time::Duration;

use crate::config::Settings;
use crate::domain::IpLocation;

/// Process-wide caches. Analytics results are never cached; only lookups
/// whose answer does not depend on the visit collection.
#[derive(Clone)]
pub struct AppCache {
    /// Resolved IP locations (IP -> location)
    pub ip_locations: Cache<IpAddr, IpLocation>,
}

impl AppCache {
    pub fn new(settings: &Settings) -> Self {
        Self {
            ip_locations: Cache::builder()
                .max_capacity(settings.cache_max_entries)
                .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
                .build(),
        }
    }

    /// Get or insert an IP location
    pub async fn get_or_insert_location<F, Fut>(&self, ip: IpAddr, f: F) -> IpLocation
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = IpLocation>,
    {
        if let Some(location) = self.ip_locations.get(&ip).await {
            return location;
        }

        let location = f().await;
        self.ip_locations.insert(ip, location.clone()).await;
        location
    }
}
