//! # Service Module
//!
//! This module handles all interactions with the MVG public transport API.
//! It defines the data structures for deserializing API responses and provides
//! a client for the three endpoints the dashboard consumes: station search,
//! departures by station, and line messages (news).

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Config;

/// Transport mode string the API uses for the subway.
pub const UBAHN: &str = "UBAHN";

/// Fixed number of raw departures requested per poll.
const DEPARTURE_LIMIT: u32 = 20;

/// Errors surfaced by the API client and the station resolver.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No subway station matched the requested name.
    #[error("station \"{name}\" not found")]
    StationNotFound { name: String },

    /// The API answered with a non-2xx status.
    #[error("API request failed: {status} {reason}")]
    Api { status: u16, reason: String },

    /// The request exceeded the client-side timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body was not valid JSON for the expected shape.
    #[error("malformed API response: {0}")]
    Json(String),

    /// The request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Json(err.to_string())
        } else {
            ServiceError::Http(err)
        }
    }
}

/// A resolved station as returned by the location search.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StationLocation {
    /// Location type discriminator (always `STATION` for our queries).
    #[serde(rename = "type", default)]
    pub location_type: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Locality the station belongs to (e.g. "München").
    #[serde(default)]
    pub place: String,
    /// Station display name.
    pub name: String,
    /// Stable cross-endpoint identifier (e.g. "de:09162:70").
    pub global_id: String,
    /// Internal numeric identifier.
    #[serde(default)]
    pub diva_id: i64,
    #[serde(default)]
    pub has_zoom_data: bool,
    /// Transport modes served at this station.
    #[serde(default)]
    pub transport_types: Vec<String>,
    #[serde(default)]
    pub aliases: String,
    #[serde(default)]
    pub tariff_zones: String,
}

impl StationLocation {
    /// Whether the station is served by the subway.
    pub fn serves_subway(&self) -> bool {
        self.transport_types.iter().any(|t| t == UBAHN)
    }
}

/// Coarse passenger-load category reported per departure.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occupancy {
    Low,
    Medium,
    High,
    #[serde(other)]
    #[default]
    Unknown,
}

/// One scheduled vehicle departure as reported by the API.
///
/// Timestamps are epoch milliseconds. The snapshot is immutable; each poll
/// replaces the previous list wholesale.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub planned_departure_time: i64,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub delay_in_minutes: i64,
    /// Planned time adjusted by realtime data; drives sorting and countdowns.
    pub realtime_departure_time: i64,
    pub transport_type: String,
    /// Line label shown to passengers (e.g. "U6").
    pub label: String,
    pub destination: String,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub platform: Option<u32>,
    #[serde(default)]
    pub platform_changed: Option<bool>,
    #[serde(default)]
    pub occupancy: Occupancy,
    /// Upstream line identifier encoding line code and directional suffix
    /// (e.g. "swm:010U6:G:R:013"). Used for line and direction filtering.
    #[serde(default)]
    pub line_id: Option<String>,
}

/// Message type tag.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsKind {
    Incident,
    ScheduleChange,
    #[serde(other)]
    #[default]
    Other,
}

/// A time window in epoch milliseconds.
#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default)]
    pub from: i64,
    #[serde(default)]
    pub to: i64,
}

/// A line affected by a news item.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AffectedLine {
    pub label: String,
    #[serde(default)]
    pub transport_type: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub diva_id: String,
    /// Marks rail-replacement service.
    #[serde(default)]
    pub sev: bool,
}

/// A disruption or schedule-change announcement.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    /// HTML-bearing description text.
    #[serde(default)]
    pub description: String,
    /// Publication timestamp in epoch milliseconds.
    #[serde(default)]
    pub publication: i64,
    #[serde(default)]
    pub publication_duration: Option<TimeWindow>,
    #[serde(default)]
    pub incident_durations: Vec<TimeWindow>,
    #[serde(default)]
    pub valid_from: i64,
    #[serde(default)]
    pub valid_to: i64,
    #[serde(rename = "type", default)]
    pub kind: NewsKind,
    #[serde(default)]
    pub provider: String,
    /// Lines this announcement affects; used for client-side filtering.
    #[serde(default)]
    pub lines: Vec<AffectedLine>,
}

/// Client for the MVG public transport API.
///
/// Holds one `reqwest::Client` carrying the shared header set (content type
/// plus the optional bearer token) and the 30 second timeout. Endpoint URLs
/// come from the injected [`Config`], which makes the client trivially
/// testable against a mock server.
#[derive(Debug, Clone)]
pub struct MvgClient {
    http: reqwest::Client,
    departures_url: String,
    news_url: String,
    search_url: String,
}

impl MvgClient {
    /// Creates a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built, for
    /// example when the configured token is not a valid header value.
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ServiceError::Api {
                    status: 0,
                    reason: "invalid API token format".to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            departures_url: config.departures_url.clone(),
            news_url: config.news_url.clone(),
            search_url: config.search_url.clone(),
        })
    }

    /// Searches stations by free-text query.
    ///
    /// A blank query returns an empty list without touching the network.
    /// Results are narrowed to stations served by the subway.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] on HTTP failure, non-2xx status, timeout,
    /// or an unparsable body.
    pub async fn search_stations(&self, query: &str) -> Result<Vec<StationLocation>, ServiceError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stations: Vec<StationLocation> = self
            .get_json(
                &self.search_url,
                &[("query", query), ("locationTypes", "STATION")],
            )
            .await?;

        Ok(stations.into_iter().filter(|s| s.serves_subway()).collect())
    }

    /// Resolves a station name to its canonical record.
    ///
    /// Takes the first subway-serving match of the search endpoint, assuming
    /// upstream ordering is stable for a given name. Returns `Ok(None)` when
    /// nothing matches.
    pub async fn station_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StationLocation>, ServiceError> {
        let stations = self.search_stations(name).await?;
        Ok(stations.into_iter().next())
    }

    /// Fetches the raw departure list for a station.
    ///
    /// The list is unfiltered apart from the fixed request parameters; line
    /// and direction filtering happen downstream in the board pipeline.
    pub async fn departures(&self, global_id: &str) -> Result<Vec<Departure>, ServiceError> {
        let limit = DEPARTURE_LIMIT.to_string();
        self.get_json(
            &self.departures_url,
            &[
                ("globalId", global_id),
                ("limit", limit.as_str()),
                ("transportTypes", UBAHN),
            ],
        )
        .await
    }

    /// Fetches all current line messages. Filtering to the line of interest
    /// is the caller's job.
    pub async fn messages(&self) -> Result<Vec<NewsItem>, ServiceError> {
        self.get_json::<Vec<NewsItem>>(&self.news_url, &[]).await
    }

    /// Shared GET helper: issues the request, maps non-2xx statuses to
    /// [`ServiceError::Api`], and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}
