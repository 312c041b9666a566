use serde::{Deserialize, Serialize};

/// How the registry treats a registration whose resource name is already
/// bound to a different plugin key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail the incoming registration with `DuplicateResourceName`.
    #[default]
    Reject,
    /// Last write wins; the previous binding is dropped with a warning.
    Replace,
}

/// Dispatch-level configuration for the router registry and its
/// registration worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Policy for resource name collisions between plugins.
    pub duplicate_policy: DuplicatePolicy,
    /// Capacity of the router lifecycle event channel.
    pub registration_channel_capacity: usize,
    /// Interval between registry summary logs emitted by the registration
    /// worker, in milliseconds.
    pub registry_report_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            registration_channel_capacity: 256,
            registry_report_interval_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reject_duplicates() {
        let config = DispatchConfig::default();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.registration_channel_capacity, 256);
    }

    #[test]
    fn policy_uses_lowercase_names() {
        let json = serde_json::to_string(&DuplicatePolicy::Replace).unwrap();
        assert_eq!(json, "\"replace\"");
        let parsed: DuplicatePolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(parsed, DuplicatePolicy::Reject);
    }
}
