//! Submission statistics tracking

use crate::handler::Rejection;
use hyper::StatusCode;
use intake_common::{RejectionStats, ServerStats, StatusCodeStats};

/// Server statistics
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total requests handled
    pub total_requests: u64,

    /// Total request body bytes received
    pub bytes_received: u64,

    /// Submissions stored
    pub accepted: u64,

    pub rejected: RejectionStats,

    pub sink_failures: u64,

    /// Response status code counts
    pub status_codes: StatusCodeStats,
}

impl Stats {
    /// Record the outcome of one request
    pub fn record(&mut self, outcome: Result<(), Rejection>) {
        let status = match outcome {
            Ok(()) => {
                self.accepted += 1;
                StatusCode::OK
            }
            Err(rejection) => {
                let counter = match rejection {
                    Rejection::Maintenance => &mut self.rejected.maintenance,
                    Rejection::NotFound => &mut self.rejected.not_found,
                    Rejection::MethodNotAllowed => &mut self.rejected.method_not_allowed,
                    Rejection::Unauthorized => &mut self.rejected.unauthorized,
                    Rejection::PayloadTooLarge => &mut self.rejected.payload_too_large,
                    Rejection::BadRequest => &mut self.rejected.bad_request,
                    Rejection::SinkFailure => &mut self.sink_failures,
                };
                *counter += 1;
                rejection.status()
            }
        };
        self.record_status(status);
    }

    fn record_status(&mut self, status: StatusCode) {
        let code = status.as_u16();
        if (200..300).contains(&code) {
            self.status_codes.success += 1;
        } else if (300..400).contains(&code) {
            self.status_codes.redirect += 1;
        } else if (400..500).contains(&code) {
            self.status_codes.client_error += 1;
        } else if code >= 500 {
            self.status_codes.server_error += 1;
        }
    }

    /// Snapshot for the management API
    pub fn snapshot(&self, uptime_secs: f64) -> ServerStats {
        ServerStats {
            total_requests: self.total_requests,
            bytes_received: self.bytes_received,
            accepted: self.accepted,
            rejected: self.rejected.clone(),
            sink_failures: self.sink_failures,
            requests_per_second: if uptime_secs > 0.0 {
                self.total_requests as f64 / uptime_secs
            } else {
                0.0
            },
            status_codes: self.status_codes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut stats = Stats::default();
        stats.record(Ok(()));
        stats.record(Err(Rejection::BadRequest));
        stats.record(Err(Rejection::BadRequest));
        stats.record(Err(Rejection::Maintenance));
        stats.record(Err(Rejection::SinkFailure));

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected.bad_request, 2);
        assert_eq!(stats.rejected.maintenance, 1);
        assert_eq!(stats.sink_failures, 1);
        assert_eq!(
            stats.status_codes,
            StatusCodeStats {
                success: 1,
                redirect: 0,
                client_error: 2,
                server_error: 2,
            }
        );
    }

    #[test]
    fn test_snapshot_rate() {
        let stats = Stats {
            total_requests: 10,
            ..Default::default()
        };
        assert_eq!(stats.snapshot(5.0).requests_per_second, 2.0);
        assert_eq!(stats.snapshot(0.0).requests_per_second, 0.0);
    }
}
