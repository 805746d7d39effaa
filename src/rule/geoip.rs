//! GeoIP lookup using MaxMind database

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// GeoIP database reader.
///
/// A missing database is not an error: GEOIP rules simply never match.
pub struct GeoIpReader {
    reader: Option<Reader<Vec<u8>>>,
}

impl GeoIpReader {
    pub fn new(path: &str) -> Self {
        let reader = Self::open(path);
        if reader.is_some() {
            info!("Loaded GeoIP database from {}", path);
        } else {
            warn!(
                "GeoIP database not found at {}, GEOIP rules will not match",
                path
            );
        }
        GeoIpReader { reader }
    }

    fn open(path: &str) -> Option<Reader<Vec<u8>>> {
        if !Path::new(path).exists() {
            return None;
        }
        match Reader::open_readfile(path) {
            Ok(reader) => Some(reader),
            Err(e) => {
                warn!("Failed to open GeoIP database: {}", e);
                None
            }
        }
    }

    /// Lookup country code for an IP address
    pub fn lookup(&self, ip: IpAddr) -> Option<String> {
        let reader = self.reader.as_ref()?;
        match reader.lookup::<geoip2::Country>(ip) {
            Ok(country) => {
                let code = country.country?.iso_code?;
                Some(code.to_uppercase())
            }
            Err(e) => {
                debug!("GeoIP lookup failed for {}: {}", ip, e);
                None
            }
        }
    }

    /// Check if an IP belongs to a country code
    pub fn matches(&self, ip: IpAddr, country_code: &str) -> bool {
        self.lookup(ip)
            .map(|code| code.eq_ignore_ascii_case(country_code))
            .unwrap_or(false)
    }

    pub fn is_loaded(&self) -> bool {
        self.reader.is_some()
    }
}

impl Default for GeoIpReader {
    fn default() -> Self {
        let paths = [
            "country.mmdb",
            "Country.mmdb",
            "/usr/share/GeoIP/GeoLite2-Country.mmdb",
        ];
        for path in &paths {
            if Path::new(path).exists() {
                return GeoIpReader::new(path);
            }
        }
        GeoIpReader { reader: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_never_matches() {
        let reader = GeoIpReader::new("nonexistent.mmdb");
        assert!(!reader.is_loaded());
        assert!(!reader.matches("8.8.8.8".parse().unwrap(), "US"));
    }
}
