use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::IpLocation;
use crate::error::Result;

/// Offline IP geolocation backed by optional MaxMind databases. Missing or
/// unreadable databases degrade to empty lookups.
pub struct GeoIpLookup {
    city_reader: Option<Reader<Vec<u8>>>,
    asn_reader: Option<Reader<Vec<u8>>>,
}

impl GeoIpLookup {
    pub fn new(city_db_path: Option<&str>, asn_db_path: Option<&str>) -> Result<Self> {
        Ok(Self {
            city_reader: city_db_path.and_then(|path| load_reader(path, "city")),
            asn_reader: asn_db_path.and_then(|path| load_reader(path, "ASN")),
        })
    }

    /// Resolve `ip`. `is_local` is carried through unchanged; local sources
    /// are never looked up.
    pub fn locate(&self, ip: IpAddr, is_local: bool) -> IpLocation {
        let mut location = IpLocation {
            ip: ip.to_string(),
            is_local,
            ..IpLocation::default()
        };

        if is_local {
            return location;
        }

        if let Some(ref reader) = self.city_reader {
            if let Ok(city) = reader.lookup::<geoip2::City>(ip) {
                if let Some(country) = city.country {
                    location.country = country.iso_code.unwrap_or_default().to_string();
                }

                if let Some(point) = city.location {
                    location.longitude = point.longitude;
                    location.latitude = point.latitude;
                    location.time_zone = point.time_zone.unwrap_or_default().to_string();
                }
            }
        }

        if let Some(ref reader) = self.asn_reader {
            if let Ok(asn) = reader.lookup::<geoip2::Asn>(ip) {
                location.asn = asn
                    .autonomous_system_organization
                    .unwrap_or_default()
                    .to_string();
            }
        }

        location
    }

    pub fn is_available(&self) -> bool {
        self.city_reader.is_some() || self.asn_reader.is_some()
    }
}

fn open_reader(path: &str) -> Result<Reader<Vec<u8>>> {
    Ok(Reader::open_readfile(path)?)
}

fn load_reader(path: &str, kind: &str) -> Option<Reader<Vec<u8>>> {
    if !Path::new(path).exists() {
        warn!("GeoIP {} database not found at {}", kind, path);
        return None;
    }

    match open_reader(path) {
        Ok(reader) => {
            debug!("Loaded GeoIP {} database from {}", kind, path);
            Some(reader)
        }
        Err(e) => {
            warn!("Failed to load GeoIP {} database: {}", kind, e);
            None
        }
    }
}
