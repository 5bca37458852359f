// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_http_backoff_configuration() {
        let backoff = http_backoff();

        assert_eq!(backoff.current_interval, Duration::from_millis(50));
        assert_eq!(backoff.max_interval, Duration::from_secs(10));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = http_backoff();

        let first = backoff.next_backoff().expect("first interval");
        assert!(first >= Duration::from_millis(45) && first <= Duration::from_millis(55));

        let second = backoff.next_backoff().expect("second interval");
        assert!(second >= Duration::from_millis(90) && second <= Duration::from_millis(110));

        for _ in 0..20 {
            backoff.next_backoff();
        }
        assert_eq!(backoff.current_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_retryable_http_statuses() {
        for status in [429u16, 500, 502, 503, 504] {
            let code = StatusCode::from_u16(status).expect("valid status");
            assert!(is_retryable_http_status(code), "{status} should be retried");
        }
        for status in [400u16, 401, 403, 404, 422] {
            let code = StatusCode::from_u16(status).expect("valid status");
            assert!(!is_retryable_http_status(code), "{status} should fail fast");
        }
    }

    #[test]
    fn test_error_delay_doubles_up_to_max() {
        assert_eq!(error_delay(1), Duration::from_secs(5));
        assert_eq!(error_delay(2), Duration::from_secs(10));
        assert_eq!(error_delay(3), Duration::from_secs(20));
        assert_eq!(error_delay(7), Duration::from_secs(300));
        assert_eq!(error_delay(40), Duration::from_secs(300));
    }

    #[test]
    fn test_error_backoff_is_per_key_and_resets() {
        let backoff = ErrorBackoff::new();
        let machine = "DOMachine/default/capdo-test-md-0-abcde";
        let cluster = "DOCluster/default/capdo-test";

        let first = backoff.next_delay(machine);
        assert!(first >= Duration::from_millis(4500) && first <= Duration::from_millis(5500));
        let second = backoff.next_delay(machine);
        assert!(second >= Duration::from_secs(9) && second <= Duration::from_secs(11));

        assert_eq!(backoff.failures(machine), 2);
        assert_eq!(backoff.failures(cluster), 0);

        backoff.reset(machine);
        assert_eq!(backoff.failures(machine), 0);
        let again = backoff.next_delay(machine);
        assert!(again <= Duration::from_millis(5500));
    }

    #[test]
    fn test_error_backoff_drops_idle_keys() {
        let backoff = ErrorBackoff::with_expiry(Duration::from_millis(50));
        let deleted = "DOMachine/default/capdo-test-md-0-gone";
        let live = "DOMachine/default/capdo-test-md-0-live";

        backoff.next_delay(deleted);
        backoff.next_delay(deleted);
        assert_eq!(backoff.failures(deleted), 2);

        std::thread::sleep(Duration::from_millis(100));
        backoff.next_delay(live);

        assert_eq!(backoff.failures(deleted), 0);
        assert_eq!(backoff.failures(live), 1);
        assert_eq!(backoff.tracked(), 1);
    }

    #[test]
    fn test_throttled_requeue_within_bounds() {
        for _ in 0..50 {
            let delay = throttled_requeue();
            assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(20));
        }
    }
}
