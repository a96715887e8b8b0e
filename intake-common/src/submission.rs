//! Submission envelope posted by mobile clients

use crate::metrics::AnalyticsMetrics;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device and location details attached to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMetadata {
    pub operating_system_version: String,
    pub latest_application_version: String,
    pub device_model: String,
    pub postal_district: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_authority: Option<String>,
}

/// Reporting period covered by the metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsWindow {
    #[serde(with = "window_instant")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "window_instant")]
    pub end_date: DateTime<Utc>,
}

/// Full request body of `POST /submission/mobile-analytics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAnalyticsSubmission {
    pub metadata: AnalyticsMetadata,
    pub analytics_window: AnalyticsWindow,
    pub metrics: AnalyticsMetrics,
    pub includes_multiple_application_versions: bool,
}

impl ClientAnalyticsSubmission {
    /// Parse a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, SubmissionError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SubmissionError::EmptyBody);
        }
        Ok(serde_json::from_slice(body)?)
    }
}

/// Submission parsing errors
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Empty request body")]
    EmptyBody,

    #[error("Malformed submission: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Window instants are strict UTC timestamps: `2020-07-27T23:00:00Z`,
/// optionally with fractional seconds. They are written back without
/// fractional seconds.
pub mod window_instant {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
    const FRACTIONAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(value, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(value, FRACTIONAL_FORMAT))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn format(instant: &DateTime<Utc>) -> String {
        instant.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse(&value).ok_or_else(|| de::Error::custom(format!("invalid window instant '{}'", value)))
    }
}
