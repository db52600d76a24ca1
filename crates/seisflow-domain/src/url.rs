//! FDSN URL normalization (§6): from any
//! `SCHEME://HOST/fdsnws/{dataselect|station}/VERSION[/query]` URL, derive
//! the sibling service by swapping the segment name. Involutive: rewriting
//! a station URL to dataselect and back reproduces the original.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DomainError;

static FDSN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.+/fdsnws/)(?P<service>dataselect|station)(?P<rest>/[^/]+(?:/query)?/?)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdsnService {
    Dataselect,
    Station,
}

impl FdsnService {
    fn as_str(self) -> &'static str {
        match self {
            FdsnService::Dataselect => "dataselect",
            FdsnService::Station => "station",
        }
    }
}

/// Rewrites `url` to point at `target` instead of whatever FDSN service it
/// currently names. Returns `DomainError::InvalidFdsnUrl` if `url` doesn't
/// match the `.../fdsnws/{dataselect|station}/VERSION[/query]` shape.
pub fn rewrite_fdsn_url(url: &str, target: FdsnService) -> Result<String, DomainError> {
    let caps = FDSN_URL
        .captures(url)
        .ok_or_else(|| DomainError::InvalidFdsnUrl(url.to_string()))?;
    Ok(format!("{}{}{}", &caps["base"], target.as_str(), &caps["rest"]))
}

/// Convenience: station_url -> dataselect_url.
pub fn station_to_dataselect(station_url: &str) -> Result<String, DomainError> {
    rewrite_fdsn_url(station_url, FdsnService::Dataselect)
}

/// Convenience: dataselect_url -> station_url.
pub fn dataselect_to_station(dataselect_url: &str) -> Result<String, DomainError> {
    rewrite_fdsn_url(dataselect_url, FdsnService::Station)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_service_segment() {
        let station = "https://eida.example.org/fdsnws/station/1/query";
        let dataselect = station_to_dataselect(station).unwrap();
        assert_eq!(dataselect, "https://eida.example.org/fdsnws/dataselect/1/query");
    }

    #[test]
    fn rewrite_is_involutive() {
        let dataselect = "https://service.iris.edu/fdsnws/dataselect/1/query";
        let station = dataselect_to_station(dataselect).unwrap();
        let back = station_to_dataselect(&station).unwrap();
        assert_eq!(back, dataselect);
    }

    #[test]
    fn rejects_non_fdsn_urls() {
        assert!(rewrite_fdsn_url("https://example.org/other/path", FdsnService::Station).is_err());
    }

    #[test]
    fn without_trailing_query_segment() {
        let station = "https://eida.example.org/fdsnws/station/1";
        let dataselect = station_to_dataselect(station).unwrap();
        assert_eq!(dataselect, "https://eida.example.org/fdsnws/dataselect/1");
    }
}
