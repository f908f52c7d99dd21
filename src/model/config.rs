use std::time::Duration;

use super::ObjectId;
use crate::error::ConfigError;

/// How long to wait for the element to resolve an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Sleep between two status polls
    pub poll_interval: Duration,
    /// Upper bound on the total wait; `None` waits forever
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Some(Self::DEFAULT_TIMEOUT),
        }
    }
}

/// Configuration for one attestation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationConfig {
    /// Slot holding the factory-provisioned device certificate
    pub factory_slot: ObjectId,
    /// Writable slot the candidate certificate is provisioned into
    pub user_slot: ObjectId,
    /// Write the candidate certificate to `user_slot`
    pub write_enabled: bool,
    /// Read the user slot metadata before writing and skip the write if it fails
    pub metadata_check_enabled: bool,
    /// Also deny the write when the slot's change access condition is `NEV`
    pub strict_metadata: bool,
    /// Read the user slot back after a write and compare digests
    pub verify_after_write: bool,
    /// PEM encoded certificate to provision
    pub candidate_pem: Option<String>,
    /// Bound on each element operation
    pub wait: WaitPolicy,
}

impl AttestationConfig {
    pub fn with_write(mut self, candidate_pem: impl Into<String>) -> Self {
        self.write_enabled = true;
        self.candidate_pem = Some(candidate_pem.into());
        self
    }

    pub fn with_metadata_check(mut self, enabled: bool) -> Self {
        self.metadata_check_enabled = enabled;
        self
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Set both slots from their textual form (`0xE0E0`, `E0E1`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidObjectId` if either identifier does not
    /// parse
    pub fn with_slots(
        mut self,
        factory_slot: &str,
        user_slot: &str,
    ) -> Result<Self, ConfigError> {
        self.factory_slot = factory_slot.parse()?;
        self.user_slot = user_slot.parse()?;
        Ok(self)
    }

    /// Check that the configuration can drive a run
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroPollInterval` if the wait policy would poll
    /// without pausing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Candidate PEM, treating an empty or blank string as absent
    pub fn candidate(&self) -> Option<&str> {
        self.candidate_pem
            .as_deref()
            .filter(|pem| !pem.trim().is_empty())
    }
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            factory_slot: ObjectId::FACTORY_CERTIFICATE,
            user_slot: ObjectId::USER_CERTIFICATE,
            write_enabled: false,
            metadata_check_enabled: true,
            strict_metadata: false,
            verify_after_write: true,
            candidate_pem: None,
            wait: WaitPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AttestationConfig::default();
        assert_eq!(config.user_slot, ObjectId::new(0xE0E1));
        assert!(!config.write_enabled);
        assert!(config.metadata_check_enabled);
        assert!(config.candidate().is_none());
        assert_eq!(config.wait.poll_interval, Duration::from_millis(10));
        assert!(config.wait.timeout.is_some());
    }

    #[test]
    fn test_blank_candidate_is_absent() {
        let config = AttestationConfig::default().with_write("  \n");
        assert!(config.write_enabled);
        assert!(config.candidate().is_none());
    }

    #[test]
    fn test_slots_from_text() {
        let config = AttestationConfig::default()
            .with_slots("0xF1D0", "f1d1")
            .unwrap();
        assert_eq!(config.factory_slot, ObjectId::new(0xF1D0));
        assert_eq!(config.user_slot, ObjectId::new(0xF1D1));
    }

    #[test]
    fn test_invalid_slot_is_a_config_error() {
        let result = AttestationConfig::default().with_slots("0xE0E0", "0xZZ");
        assert!(matches!(result, Err(ConfigError::InvalidObjectId(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let config = AttestationConfig::default().with_wait(WaitPolicy {
            poll_interval: Duration::ZERO,
            timeout: None,
        });
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
        assert_eq!(AttestationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_unbounded_wait() {
        let wait = WaitPolicy::unbounded();
        assert!(wait.timeout.is_none());
        assert_eq!(wait.poll_interval, WaitPolicy::DEFAULT_POLL_INTERVAL);
    }
}
