// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_during_wraps_cloud_errors_with_operation() {
        let result: Result<(), CloudError> = Err(CloudError::Transport("connection reset".into()));
        let err = result.during("creating load balancer").expect_err("wrapped");

        assert_eq!(
            err.to_string(),
            "creating load balancer: DigitalOcean API request failed: connection reset"
        );
        assert_eq!(err.metric_label(), "cloud_transport");
        assert!(!err.is_throttled());
    }

    #[test]
    fn test_rate_limits_are_throttled() {
        let limited: Result<(), CloudError> = Err(CloudError::RateLimited {
            message: "slow down".into(),
        });
        let err = limited.during("listing droplets").expect_err("wrapped");
        assert!(err.is_throttled());
        assert_eq!(err.metric_label(), "cloud_throttled");
    }

    #[test]
    fn test_precondition_message_is_verbatim() {
        let err = ReconcileError::Precondition(r#"volume "m-etcd" does not exist"#.into());
        assert_eq!(err.to_string(), r#"volume "m-etcd" does not exist"#);
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_terminal_errors() {
        let err = ReconcileError::Terminal {
            reason: "CreateMachineError",
            message: "invalid size".into(),
        };
        assert!(err.is_terminal());
        assert_eq!(err.to_string(), "CreateMachineError: invalid size");
        assert_eq!(err.metric_label(), "terminal");
    }

    #[test]
    fn test_timeout_label() {
        let err = ReconcileError::Timeout(std::time::Duration::from_secs(300));
        assert_eq!(err.metric_label(), "timeout");
        assert!(err.to_string().contains("300s"));
    }
}
