//! Spot history from the wspr.live database.
//!
//! [`SpotsClient`] issues one blocking HTTP request per query. Call it
//! from a blocking context (or `tokio::task::spawn_blocking`).

use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::types::Band;

/// Default wspr.live query endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://db1.wspr.live/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest call sign accepted in a query, compound prefixes included.
const MAX_QUERY_CALL_LEN: usize = 12;

/// Column to sort spots by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortField {
    /// Spot time.
    #[default]
    Time,
    /// Signal to noise ratio.
    Snr,
    /// Frequency drift.
    Drift,
    /// Distance between transmitter and receiver.
    Distance,
}

impl SortField {
    /// Returns the column name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Snr => "snr",
            Self::Drift => "drift",
            Self::Distance => "distance",
        }
    }

    /// Returns the direction that lists the most interesting spots first.
    #[must_use]
    pub const fn natural_direction(self) -> SortDirection {
        match self {
            Self::Snr => SortDirection::Ascending,
            Self::Time | Self::Drift | Self::Distance => SortDirection::Descending,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    #[default]
    Descending,
}

impl SortDirection {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A reception report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Spot {
    /// Reception time (UTC), as reported by the database.
    pub time: String,
    /// Transmitter call sign.
    pub tx_sign: String,
    /// Transmitter locator.
    pub tx_loc: String,
    /// Receiver call sign.
    pub rx_sign: String,
    /// Receiver locator.
    pub rx_loc: String,
    /// Received frequency in Hz.
    #[serde(deserialize_with = "number_or_string")]
    pub frequency: u64,
    /// Reported power in dBm.
    #[serde(deserialize_with = "number_or_string")]
    pub power: i8,
    /// Signal to noise ratio in dB.
    #[serde(deserialize_with = "number_or_string")]
    pub snr: i8,
    /// Frequency drift in Hz/min.
    #[serde(deserialize_with = "number_or_string")]
    pub drift: i8,
    /// Distance in km.
    #[serde(deserialize_with = "number_or_string")]
    pub distance: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<Vec<Spot>>,
}

/// Accepts `123` as well as `"123"`.
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Blocking client for the wspr.live spot database.
pub struct SpotsClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl SpotsClient {
    /// Creates a client for the public endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Creates a client for a custom endpoint.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DEFAULT_TIMEOUT))
            .build();
        Self {
            endpoint: endpoint.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches up to `limit` spots of `call` on `band`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBand`] for an unknown band name and
    ///   [`Error::InvalidArgument`] for a malformed call sign, both
    ///   before any request is made.
    /// - [`Error::Offline`] if the endpoint cannot be reached.
    /// - [`Error::Http`] or [`Error::Json`] for a bad response.
    pub fn query(
        &self,
        band: &str,
        call: &str,
        sort: SortField,
        direction: SortDirection,
        limit: u32,
    ) -> Result<Vec<Spot>> {
        let band: Band = band.parse()?;
        let sql = build_query(band, call, sort, direction, limit)?;
        tracing::debug!("wspr.live query: {sql}");

        let resp = self
            .agent
            .get(self.endpoint.as_str())
            .query("query", &sql)
            .call()
            .map_err(classify)?;

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| Error::Offline {
                reason: e.to_string(),
            })?;

        let spots = parse_spots(&body)?;
        tracing::debug!("wspr.live returned {} spots", spots.len());
        Ok(spots)
    }
}

impl Default for SpotsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpotsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotsClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Builds the SQL query for a spot search.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `call` is not a plain call sign.
pub fn build_query(
    band: Band,
    call: &str,
    sort: SortField,
    direction: SortDirection,
    limit: u32,
) -> Result<String> {
    let call = normalize_call(call)?;
    Ok(format!(
        "SELECT * FROM rx WHERE band = {} AND tx_sign = '{call}' ORDER BY {} {} LIMIT {limit} FORMAT JSON",
        band.wspr_live_code(),
        sort.column(),
        direction.keyword(),
    ))
}

/// Uppercases `call` and rejects anything that is not letters, digits or `/`.
fn normalize_call(call: &str) -> Result<String> {
    let call = call.trim().to_ascii_uppercase();
    if call.is_empty()
        || call.len() > MAX_QUERY_CALL_LEN
        || !call.chars().all(|c| c.is_ascii_alphanumeric() || c == '/')
    {
        return Err(Error::invalid(format!("call sign {call:?}")));
    }
    Ok(call)
}

/// Parses a `FORMAT JSON` response body. A missing `data` member is an
/// empty result.
pub fn parse_spots(body: &[u8]) -> Result<Vec<Spot>> {
    let response: QueryResponse = serde_json::from_slice(body)?;
    Ok(response.data.unwrap_or_default())
}

fn classify(err: ureq::Error) -> Error {
    match err {
        e @ (ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed
        | ureq::Error::Timeout(_)) => Error::Offline {
            reason: e.to_string(),
        },
        e => Error::Http(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "meta": [{"name": "time", "type": "DateTime"}],
        "data": [
            {
                "time": "2024-02-07 17:18:00",
                "band": 144,
                "rx_sign": "DL1XYZ",
                "rx_loc": "JO62",
                "tx_sign": "N0CALL",
                "tx_loc": "KO02",
                "distance": 871,
                "frequency": "144490512",
                "power": 23,
                "snr": -21,
                "drift": 0
            },
            {
                "time": "2024-02-07 17:08:00",
                "rx_sign": "SP5ABC",
                "rx_loc": "KO02",
                "tx_sign": "N0CALL",
                "tx_loc": "KO02",
                "distance": "12",
                "frequency": 144490498,
                "power": 23,
                "snr": 3,
                "drift": -1
            }
        ],
        "rows": 2
    }"#;

    #[test]
    fn test_invalid_band_rejected() {
        let client = SpotsClient::with_endpoint("http://127.0.0.1:1/");
        let err = client
            .query("1m", "N0CALL", SortField::Time, SortDirection::Descending, 10)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBand { band } if band == "1m"));
    }

    #[test]
    fn test_invalid_call_rejected() {
        let client = SpotsClient::with_endpoint("http://127.0.0.1:1/");
        let err = client
            .query("2m", "N0CALL' OR 1=1 --", SortField::Time, SortDirection::Descending, 10)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(build_query(Band::M2, "", SortField::Time, SortDirection::Descending, 1).is_err());
    }

    #[test]
    fn test_build_query() {
        let sql = build_query(
            Band::M2,
            "n0call",
            SortField::Time,
            SortDirection::Descending,
            10,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM rx WHERE band = 144 AND tx_sign = 'N0CALL' ORDER BY time DESC LIMIT 10 FORMAT JSON"
        );

        let sql = build_query(
            Band::M2200,
            "DL/K1ABC",
            SortField::Snr,
            SortField::Snr.natural_direction(),
            5,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM rx WHERE band = -1 AND tx_sign = 'DL/K1ABC' ORDER BY snr ASC LIMIT 5 FORMAT JSON"
        );
    }

    #[test]
    fn test_parse_spots() {
        let spots = parse_spots(SAMPLE.as_bytes()).unwrap();
        assert_eq!(spots.len(), 2);

        assert_eq!(spots[0].rx_sign, "DL1XYZ");
        assert_eq!(spots[0].frequency, 144_490_512);
        assert_eq!(spots[0].snr, -21);
        assert_eq!(spots[0].distance, 871);

        assert_eq!(spots[1].frequency, 144_490_498);
        assert_eq!(spots[1].distance, 12);
        assert_eq!(spots[1].drift, -1);
    }

    #[test]
    fn test_parse_no_data() {
        assert!(parse_spots(b"{}").unwrap().is_empty());
        assert!(parse_spots(br#"{"data": []}"#).unwrap().is_empty());
        assert!(parse_spots(br#"{"data": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_spots(b"<html>"), Err(Error::Json(_))));
        assert!(matches!(
            parse_spots(br#"{"data": [{"frequency": "fast"}]}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_is_offline() {
        let client = SpotsClient::with_endpoint("http://127.0.0.1:1/");
        let err = client
            .query("20m", "N0CALL", SortField::Distance, SortDirection::Descending, 10)
            .unwrap_err();
        assert!(matches!(err, Error::Offline { .. }), "got {err:?}");
    }
}
