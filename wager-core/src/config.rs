//! Escrow desk configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{attestation::validate_pubkey, error::Result, WagerError};

/// Default time an agreed bet waits for oracle submission past its window (1 day).
pub const DEFAULT_ORACLE_GRACE_PERIOD: u64 = 86_400;

/// Tunables for [`crate::BetLifecycle`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeskConfig {
    /// Seconds past `window_end` before an `Agreed` bet that was never sent
    /// to the oracle may expire.
    pub oracle_grace_period: u64,

    /// Seconds past `window_end` before a `PendingOracle` bet may expire with
    /// both stakes refunded. `None` keeps pending bets locked until answered.
    pub oracle_timeout: Option<u64>,

    /// Oracle's x-only public key (hex) for attested answers
    pub oracle_pubkey: Option<String>,

    /// Smallest accepted stake
    pub min_stake: u64,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            oracle_grace_period: DEFAULT_ORACLE_GRACE_PERIOD,
            oracle_timeout: None,
            oracle_pubkey: None,
            min_stake: 1,
        }
    }
}

impl DeskConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_stake == 0 {
            return Err(WagerError::Config("min_stake must be at least 1".to_string()));
        }
        // Oracle submission opens one second after window_end, so a zero
        // period would let a bet expire before it could ever be submitted.
        if self.oracle_grace_period == 0 {
            return Err(WagerError::Config(
                "oracle_grace_period must be at least 1 second".to_string(),
            ));
        }
        if self.oracle_timeout == Some(0) {
            return Err(WagerError::Config(
                "oracle_timeout must be at least 1 second".to_string(),
            ));
        }
        if let Some(pubkey) = &self.oracle_pubkey {
            validate_pubkey(pubkey)
                .map_err(|e| WagerError::Config(format!("oracle_pubkey: {e}")))?;
        }
        Ok(())
    }

    /// Earliest time an agreed, unsubmitted bet may expire.
    pub fn agreed_expiry(&self, window_end: u64) -> u64 {
        window_end.saturating_add(self.oracle_grace_period)
    }

    /// Earliest time a pending bet may expire, if oracle timeouts are enabled.
    pub fn pending_expiry(&self, window_end: u64) -> Option<u64> {
        self.oracle_timeout
            .map(|timeout| window_end.saturating_add(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attestation::oracle_pubkey, test_utils::constants::TEST_ORACLE_SECRET};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DeskConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.agreed_expiry(2000), 2000 + DEFAULT_ORACLE_GRACE_PERIOD);
        assert_eq!(config.pending_expiry(2000), None);
    }

    #[test]
    fn test_partial_override() {
        let config =
            DeskConfig::from_json_str(r#"{"oracle_grace_period": 60, "oracle_timeout": 600}"#)
                .unwrap();
        assert_eq!(config.agreed_expiry(2000), 2060);
        assert_eq!(config.pending_expiry(2000), Some(2600));
        assert_eq!(config.min_stake, 1);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            DeskConfig::from_json_str(r#"{"min_stake": 0}"#),
            Err(WagerError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_json_str(r#"{"oracle_pubkey": "zz"}"#),
            Err(WagerError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_json_str(r#"{"oracle_grace_period": 0}"#),
            Err(WagerError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_json_str(r#"{"oracle_timeout": 0}"#),
            Err(WagerError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_json_str(r#"{"grace": 1}"#),
            Err(WagerError::Json(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let pubkey = oracle_pubkey(TEST_ORACLE_SECRET).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"oracle_pubkey": "{pubkey}"}}"#).unwrap();

        let config = DeskConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.oracle_pubkey, Some(pubkey));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            DeskConfig::from_json_file("/nonexistent/wager.json"),
            Err(WagerError::Io(_))
        ));
    }
}
