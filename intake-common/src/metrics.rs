//! Client-reported analytics counters

use serde::{Deserialize, Deserializer, Serialize};

/// Counters and cumulative byte totals reported by one client for one
/// analytics window.
///
/// Nullable fields were added in later app releases, so older clients omit
/// them. `None` means "not reported" and is kept distinct from `Some(0)` all
/// the way to storage. Required counters read as `0` when missing.
///
/// Values are taken as reported; negative counters are not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsMetrics {
    pub cumulative_download_bytes: Option<i64>,
    pub cumulative_upload_bytes: Option<i64>,
    pub cumulative_cellular_download_bytes: Option<i64>,
    pub cumulative_cellular_upload_bytes: Option<i64>,
    pub cumulative_wifi_download_bytes: Option<i64>,
    pub cumulative_wifi_upload_bytes: Option<i64>,

    #[serde(deserialize_with = "null_as_zero")]
    pub checked_in: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub canceled_check_in: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub received_void_test_result: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub is_isolating_background_tick: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub has_had_risky_contact_background_tick: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub received_positive_test_result: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub received_negative_test_result: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub has_self_diagnosed_positive_background_tick: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub completed_questionnaire_and_started_isolation: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub encounter_detection_paused_background_tick: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub completed_questionnaire_but_did_not_start_isolation: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub total_background_tasks: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub running_normally_background_tick: i32,
    #[serde(deserialize_with = "null_as_zero")]
    pub completed_onboarding: i32,

    pub received_void_test_result_entered_manually: Option<i32>,
    pub received_positive_test_result_entered_manually: Option<i32>,
    pub received_negative_test_result_entered_manually: Option<i32>,
    pub received_void_test_result_via_polling: Option<i32>,
    pub received_positive_test_result_via_polling: Option<i32>,
    pub received_negative_test_result_via_polling: Option<i32>,
    pub has_self_diagnosed_background_tick: Option<i32>,
    pub has_tested_positive_background_tick: Option<i32>,
    pub is_isolating_for_self_diagnosed_background_tick: Option<i32>,
    pub is_isolating_for_tested_positive_background_tick: Option<i32>,
    pub is_isolating_for_had_risky_contact_background_tick: Option<i32>,
    pub received_risky_contact_notification: Option<i32>,
    pub started_isolation: Option<i32>,
    pub received_positive_test_result_when_isolating_due_to_risky_contact: Option<i32>,
}

/// Integer width of a metric on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricWidth {
    I32,
    I64,
}

/// One entry of the metrics wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricField {
    /// JSON key
    pub name: &'static str,
    /// Whether the client may omit the metric
    pub nullable: bool,
    pub width: MetricWidth,
}

const fn field(name: &'static str, nullable: bool, width: MetricWidth) -> MetricField {
    MetricField {
        name,
        nullable,
        width,
    }
}

impl AnalyticsMetrics {
    /// Every metric key in serialization order.
    pub const SCHEMA: &'static [MetricField] = &[
        field("cumulativeDownloadBytes", true, MetricWidth::I64),
        field("cumulativeUploadBytes", true, MetricWidth::I64),
        field("cumulativeCellularDownloadBytes", true, MetricWidth::I64),
        field("cumulativeCellularUploadBytes", true, MetricWidth::I64),
        field("cumulativeWifiDownloadBytes", true, MetricWidth::I64),
        field("cumulativeWifiUploadBytes", true, MetricWidth::I64),
        field("checkedIn", false, MetricWidth::I32),
        field("canceledCheckIn", false, MetricWidth::I32),
        field("receivedVoidTestResult", false, MetricWidth::I32),
        field("isIsolatingBackgroundTick", false, MetricWidth::I32),
        field("hasHadRiskyContactBackgroundTick", false, MetricWidth::I32),
        field("receivedPositiveTestResult", false, MetricWidth::I32),
        field("receivedNegativeTestResult", false, MetricWidth::I32),
        field("hasSelfDiagnosedPositiveBackgroundTick", false, MetricWidth::I32),
        field("completedQuestionnaireAndStartedIsolation", false, MetricWidth::I32),
        field("encounterDetectionPausedBackgroundTick", false, MetricWidth::I32),
        field("completedQuestionnaireButDidNotStartIsolation", false, MetricWidth::I32),
        field("totalBackgroundTasks", false, MetricWidth::I32),
        field("runningNormallyBackgroundTick", false, MetricWidth::I32),
        field("completedOnboarding", false, MetricWidth::I32),
        field("receivedVoidTestResultEnteredManually", true, MetricWidth::I32),
        field("receivedPositiveTestResultEnteredManually", true, MetricWidth::I32),
        field("receivedNegativeTestResultEnteredManually", true, MetricWidth::I32),
        field("receivedVoidTestResultViaPolling", true, MetricWidth::I32),
        field("receivedPositiveTestResultViaPolling", true, MetricWidth::I32),
        field("receivedNegativeTestResultViaPolling", true, MetricWidth::I32),
        field("hasSelfDiagnosedBackgroundTick", true, MetricWidth::I32),
        field("hasTestedPositiveBackgroundTick", true, MetricWidth::I32),
        field("isIsolatingForSelfDiagnosedBackgroundTick", true, MetricWidth::I32),
        field("isIsolatingForTestedPositiveBackgroundTick", true, MetricWidth::I32),
        field("isIsolatingForHadRiskyContactBackgroundTick", true, MetricWidth::I32),
        field("receivedRiskyContactNotification", true, MetricWidth::I32),
        field("startedIsolation", true, MetricWidth::I32),
        field(
            "receivedPositiveTestResultWhenIsolatingDueToRiskyContact",
            true,
            MetricWidth::I32,
        ),
    ];

    /// Keys of the nullable metrics this snapshot leaves unreported.
    pub fn unreported(&self) -> Vec<&'static str> {
        let Ok(serde_json::Value::Object(values)) = serde_json::to_value(self) else {
            return Vec::new();
        };

        Self::SCHEMA
            .iter()
            .filter(|field| field.nullable)
            .filter(|field| values.get(field.name).map_or(true, serde_json::Value::is_null))
            .map(|field| field.name)
            .collect()
    }
}

/// Older clients may send `null` for a required counter; it counts as zero.
fn null_as_zero<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or_default())
}
