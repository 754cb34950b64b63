use chrono_tz::Tz;
use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: Option<String>,
    pub database_path: Option<String>,

    /// IANA zone used when a request does not name one
    #[serde(default = "default_site_timezone")]
    pub site_timezone: String,

    /// Comma-separated CIDR networks counted as local traffic
    #[serde(default)]
    pub local_networks: String,

    #[serde(default = "default_respect_dnt")]
    pub respect_dnt: bool,

    #[serde(default = "default_log_limit")]
    pub default_log_limit: u32,

    #[serde(default = "default_max_log_limit")]
    pub max_log_limit: u32,

    #[serde(default = "default_max_window_days")]
    pub max_window_days: u32,

    pub maxmind_city_db: Option<String>,
    pub maxmind_asn_db: Option<String>,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_site_timezone() -> String {
    "Asia/Seoul".to_string()
}

fn default_respect_dnt() -> bool {
    true
}

fn default_log_limit() -> u32 {
    1000
}

fn default_max_log_limit() -> u32 {
    10000
}

fn default_max_window_days() -> u32 {
    3660 // ten years
}

fn default_cache_max_entries() -> u64 {
    10000
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: None,
            database_path: None,
            site_timezone: default_site_timezone(),
            local_networks: String::new(),
            respect_dnt: default_respect_dnt(),
            default_log_limit: default_log_limit(),
            max_log_limit: default_max_log_limit(),
            max_window_days: default_max_window_days(),
            maxmind_city_db: None,
            maxmind_asn_db: None,
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Settings {
    pub fn new() -> std::result::Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .add_source(
                Environment::with_prefix("BLOGSTATS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Resolve the configured site timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.site_timezone
            .parse::<Tz>()
            .map_err(|_| Error::InvalidTimezone(self.site_timezone.clone()))
    }
}
