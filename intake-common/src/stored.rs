//! Flattened record written to storage for each accepted submission

use crate::metrics::AnalyticsMetrics;
use crate::postcodes::MappedLocation;
use crate::submission::{window_instant, ClientAnalyticsSubmission};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalyticsPayload {
    #[serde(with = "window_instant")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "window_instant")]
    pub end_date: DateTime<Utc>,
    pub postal_district: String,
    pub device_model: String,
    pub operating_system_version: String,
    pub latest_application_version: String,
    pub local_authority: Option<String>,
    #[serde(flatten)]
    pub metrics: AnalyticsMetrics,
    pub includes_multiple_application_versions: bool,
}

impl StoredAnalyticsPayload {
    /// Flatten a submission, replacing its location with the mapped one
    pub fn from_submission(submission: ClientAnalyticsSubmission, location: MappedLocation) -> Self {
        let ClientAnalyticsSubmission {
            metadata,
            analytics_window,
            metrics,
            includes_multiple_application_versions,
        } = submission;

        Self {
            start_date: analytics_window.start_date,
            end_date: analytics_window.end_date,
            postal_district: location.postal_district,
            device_model: metadata.device_model,
            operating_system_version: metadata.operating_system_version,
            latest_application_version: metadata.latest_application_version,
            local_authority: location.local_authority,
            metrics,
            includes_multiple_application_versions,
        }
    }

    /// Compact JSON as written to the object store and stream
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
