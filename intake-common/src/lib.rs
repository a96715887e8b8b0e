//! Intake Common - data model and configuration for the analytics intake server

pub mod config;
pub mod messages;
pub mod metrics;
pub mod postcodes;
pub mod stored;
pub mod submission;

pub use config::*;
pub use messages::*;
pub use metrics::{AnalyticsMetrics, MetricField, MetricWidth};
pub use postcodes::{MappedLocation, MappingError, PostDistrictMapper, UNKNOWN_DISTRICT};
pub use stored::StoredAnalyticsPayload;
pub use submission::{
    AnalyticsMetadata, AnalyticsWindow, ClientAnalyticsSubmission, SubmissionError,
};
