//! Retry / cadence decision taken after every attempt

use std::time::Duration;

use scheduler::SubRequest;

/// What happens to a sub-request after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    /// Rearm after a jittered delay; retry budget left
    FastRetry,
    /// Rearm after the configured scan rate
    Cadence(Duration),
    /// One-shot request finished, never armed again
    Dormant,
}

impl Reschedule {
    /// Advance the request's retry state for this attempt and pick the next arm.
    ///
    /// A failure with budget left counts towards the budget; the fast retry
    /// is taken while the count stays below it. The count is never cleared,
    /// so an exhausted budget stays exhausted for the life of the request.
    pub fn decide(request: &SubRequest, succeeded: bool) -> Self {
        if !succeeded && request.retry() > 0 && request.advance_retry() < request.retry() {
            return Self::FastRetry;
        }

        if request.is_one_shot() {
            Self::Dormant
        } else {
            Self::Cadence(request.scan_rate())
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastRetry => "fast_retry",
            Self::Cadence(_) => "cadence",
            Self::Dormant => "dormant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FunctionCode;

    fn request(scan_rate_ms: u64, retry: u8) -> SubRequest {
        SubRequest::new(
            0,
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            10,
            Duration::from_millis(scan_rate_ms),
            retry,
        )
    }

    #[test]
    fn test_failures_exhaust_budget_then_cadence() {
        let req = request(500, 3);
        assert_eq!(Reschedule::decide(&req, false), Reschedule::FastRetry);
        assert_eq!(Reschedule::decide(&req, false), Reschedule::FastRetry);
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(500))
        );
        assert_eq!(req.retry_count(), 3);

        // exhausted budget stays exhausted
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(500))
        );
        assert_eq!(req.retry_count(), 3);
    }

    #[test]
    fn test_success_keeps_exhausted_budget() {
        let req = request(500, 3);
        for _ in 0..3 {
            Reschedule::decide(&req, false);
        }
        assert_eq!(
            Reschedule::decide(&req, true),
            Reschedule::Cadence(Duration::from_millis(500))
        );
        assert_eq!(req.retry_count(), 3);
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_success_does_not_refund_partial_budget() {
        let req = request(100, 3);
        assert_eq!(Reschedule::decide(&req, false), Reschedule::FastRetry);
        Reschedule::decide(&req, true);
        assert_eq!(req.retry_count(), 1);
        assert_eq!(Reschedule::decide(&req, false), Reschedule::FastRetry);
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_no_budget_follows_cadence() {
        let req = request(250, 0);
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(250))
        );
        assert_eq!(req.retry_count(), 0);
    }

    #[test]
    fn test_one_shot_goes_dormant() {
        assert_eq!(Reschedule::decide(&request(0, 0), true), Reschedule::Dormant);
        assert_eq!(Reschedule::decide(&request(0, 0), false), Reschedule::Dormant);

        let retried = request(0, 2);
        assert_eq!(Reschedule::decide(&retried, false), Reschedule::FastRetry);
        assert_eq!(Reschedule::decide(&retried, false), Reschedule::Dormant);
    }

    #[test]
    fn test_single_retry_budget_never_fast_retries() {
        let req = request(100, 1);
        assert_eq!(
            Reschedule::decide(&req, false),
            Reschedule::Cadence(Duration::from_millis(100))
        );
    }
}
