// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_backoff, is_retryable_error};
    use std::time::Duration;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: reason.to_string(),
            message: reason.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(
            backoff.current_interval,
            Duration::from_millis(100),
            "Initial interval should be 100ms"
        );
        assert_eq!(
            backoff.max_interval,
            Duration::from_secs(30),
            "Max interval should be 30 seconds"
        );
        assert_eq!(
            backoff.max_elapsed_time,
            Some(Duration::from_secs(300)),
            "Max elapsed time should be 5 minutes"
        );

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(
                backoff.multiplier, 2.0,
                "Multiplier should be 2.0 for exponential growth"
            );
            assert_eq!(
                backoff.randomization_factor, 0.1,
                "Randomization factor should be 0.1 (±10%)"
            );
        }
    }

    /// Test that intervals grow exponentially up to the cap
    #[test]
    fn test_backoff_growth_is_capped() {
        let mut backoff = default_backoff();

        let mut last = Duration::ZERO;
        for _ in 0..12 {
            let Some(interval) = backoff.next_backoff() else {
                panic!("backoff exhausted too early");
            };
            // Jitter is ±10%, so allow some slack around monotonic growth
            assert!(interval >= last.mul_f64(0.8));
            last = interval;
        }

        assert!(backoff.current_interval <= Duration::from_secs(30));
    }

    /// Test that HTTP 429 errors are retryable
    #[test]
    fn test_429_is_retryable() {
        assert!(
            is_retryable_error(&api_error(429, "TooManyRequests")),
            "HTTP 429 (rate limiting) should be retryable"
        );
    }

    /// Test that 5xx server errors are retryable
    #[test]
    fn test_5xx_is_retryable() {
        assert!(
            is_retryable_error(&api_error(500, "InternalServerError")),
            "HTTP 500 should be retryable"
        );
        assert!(
            is_retryable_error(&api_error(503, "ServiceUnavailable")),
            "HTTP 503 should be retryable"
        );
        assert!(
            is_retryable_error(&api_error(599, "ServerError")),
            "HTTP 599 should be retryable"
        );
    }

    /// Test that 4xx client errors (except 429) are not retryable
    #[test]
    fn test_4xx_not_retryable() {
        assert!(
            !is_retryable_error(&api_error(400, "BadRequest")),
            "HTTP 400 should not be retryable"
        );
        assert!(
            !is_retryable_error(&api_error(404, "NotFound")),
            "HTTP 404 should not be retryable"
        );
        assert!(
            !is_retryable_error(&api_error(409, "Conflict")),
            "HTTP 409 takes the bounded conflict path, not the backoff path"
        );
        assert!(
            !is_retryable_error(&api_error(422, "Invalid")),
            "HTTP 422 should not be retryable"
        );
    }
}
