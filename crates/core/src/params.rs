use serde::{Deserialize, Serialize};

use crate::error::VrfError;

/// Cryptographic and timing context for verifying drand beacons on-chain and
/// mapping block time to drand rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfParams {
    pub enabled: bool,
    /// BLS group public key of the drand network.
    pub public_key: Vec<u8>,
    /// 32-byte identifier of the drand network's genesis parameters.
    pub chain_hash: Vec<u8>,
    pub period_seconds: u64,
    /// Time budget by which a round may lag real time before it is too stale
    /// to install. Always at least one period.
    pub safety_margin_seconds: u64,
    pub genesis_unix_sec: i64,
    /// Counter advanced whenever the drand network rotates its group key.
    pub reshare_epoch: u64,
}

impl Default for VrfParams {
    fn default() -> Self {
        Self {
            enabled: false,
            public_key: Vec::new(),
            chain_hash: Vec::new(),
            period_seconds: 30,
            safety_margin_seconds: 30,
            genesis_unix_sec: 0,
            reshare_epoch: 0,
        }
    }
}

impl VrfParams {
    pub fn validate(&self) -> Result<(), VrfError> {
        if self.period_seconds == 0 {
            return Err(VrfError::InvalidParams(
                "period_seconds must be positive".into(),
            ));
        }

        if self.safety_margin_seconds < self.period_seconds {
            return Err(VrfError::InvalidParams(format!(
                "safety_margin_seconds ({}) must be >= period_seconds ({})",
                self.safety_margin_seconds, self.period_seconds
            )));
        }

        if self.enabled {
            if self.public_key.is_empty() {
                return Err(VrfError::InvalidParams(
                    "public_key must not be empty when enabled".into(),
                ));
            }

            if self.chain_hash.is_empty() {
                return Err(VrfError::InvalidParams(
                    "chain_hash must not be empty when enabled".into(),
                ));
            }
        }

        Ok(())
    }

    /// The drand round scheduled at or before the given unix time.
    ///
    /// Returns 0 before genesis or when the period is unset.
    pub fn round_at(&self, unix_sec: i64) -> u64 {
        if self.period_seconds == 0 || unix_sec < self.genesis_unix_sec {
            return 0;
        }

        let dt = (unix_sec - self.genesis_unix_sec) as u64;
        dt / self.period_seconds + 1
    }

    /// How many rounds the safety margin spans.
    pub fn safety_margin_rounds(&self) -> u64 {
        if self.period_seconds == 0 {
            return 0;
        }
        self.safety_margin_seconds / self.period_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_params() -> VrfParams {
        VrfParams {
            enabled: true,
            public_key: vec![1; 48],
            chain_hash: vec![2; 32],
            period_seconds: 30,
            safety_margin_seconds: 30,
            genesis_unix_sec: 1_700_000_000,
            reshare_epoch: 0,
        }
    }

    #[test]
    fn default_params_are_valid() {
        VrfParams::default().validate().unwrap();
    }

    #[test]
    fn margin_below_period_is_rejected() {
        let params = VrfParams {
            safety_margin_seconds: 10,
            ..enabled_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn enabled_requires_key_and_hash() {
        let params = VrfParams {
            public_key: Vec::new(),
            ..enabled_params()
        };
        assert!(params.validate().is_err());

        let params = VrfParams {
            chain_hash: Vec::new(),
            ..enabled_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn round_at_period_and_genesis() {
        // period=30, t = genesis + 91s => floor(91/30) + 1 = 4
        let params = enabled_params();
        assert_eq!(params.round_at(params.genesis_unix_sec + 91), 4);
        assert_eq!(params.round_at(params.genesis_unix_sec), 1);
        assert_eq!(params.round_at(params.genesis_unix_sec + 29), 1);
        assert_eq!(params.round_at(params.genesis_unix_sec + 30), 2);
    }

    #[test]
    fn round_at_before_genesis_is_zero() {
        let params = enabled_params();
        assert_eq!(params.round_at(params.genesis_unix_sec - 1), 0);
    }

    #[test]
    fn safety_margin_rounds_follows_period() {
        let mut params = enabled_params();
        assert_eq!(params.safety_margin_rounds(), 1);
        params.safety_margin_seconds = 95;
        assert_eq!(params.safety_margin_rounds(), 3);
    }
}
