use serde::{Deserialize, Serialize};

use crate::decimal::{Bps, Money, BPS_DENOMINATOR};
use crate::errors::{ProtocolError, Result};
use crate::types::RateModelType;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// upper bound for any annual rate (1000% apr)
pub const MAX_RATE_BPS: Bps = 100_000;
/// upper bound for the grace period
pub const MAX_GRACE_PERIOD_SECONDS: u64 = SECONDS_PER_YEAR;
pub const MAX_REPAYMENT_WINDOW_SECONDS: u64 = 10 * SECONDS_PER_YEAR;
/// limit escalation may at most double a limit in one step
pub const MAX_ESCALATION_MULTIPLIER_BPS: Bps = 2 * BPS_DENOMINATOR;
pub const MAX_SCORE: u32 = 1_000;

/// protocol configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub rates: RateParameters,
    pub risk: RiskParameters,
    pub reputation: ReputationConfig,
}

/// global rate parameters, admin mutable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateParameters {
    pub base_rate: Bps,
    pub max_rate: Bps,
    pub penalty_rate: Bps,
    pub optimal_utilization: Bps,
    pub penalty_utilization: Bps,
    pub model_type: RateModelType,
    pub grace_period_seconds: u64,
}

/// thresholds governing limits, liquidation and fees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// ltv above which a line may be liquidated
    pub liquidation_threshold_bps: Bps,
    /// added to the grace period to form the repayment due date
    pub repayment_window_seconds: u64,
    /// minimum reputation score for a limit increase
    pub escalation_score_threshold: u32,
    /// applied to the current limit on escalation, >= 10_000
    pub escalation_multiplier_bps: Bps,
    /// share of repaid interest kept by the protocol
    pub protocol_fee_bps: Bps,
}

/// reputation scoring configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationConfig {
    pub initial_score: u32,
    pub on_time_delta: u32,
    pub late_delta: u32,
    pub default_penalty: u32,
    /// defaults with debt above this are penalized twice as hard
    pub large_default_threshold: Money,
}

impl Default for RateParameters {
    fn default() -> Self {
        Self {
            base_rate: 500,
            max_rate: 2_000,
            penalty_rate: 5_000,
            optimal_utilization: 8_000,
            penalty_utilization: 9_500,
            model_type: RateModelType::Fixed,
            grace_period_seconds: 7 * SECONDS_PER_DAY,
        }
    }
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            liquidation_threshold_bps: 9_000,
            repayment_window_seconds: 30 * SECONDS_PER_DAY,
            escalation_score_threshold: 600,
            escalation_multiplier_bps: 11_000,
            protocol_fee_bps: 1_000,
        }
    }
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            initial_score: 500,
            on_time_delta: 10,
            late_delta: 20,
            default_penalty: 50,
            large_default_threshold: Money::from_units(1_000),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RateParameters {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_rate", self.base_rate),
            ("max_rate", self.max_rate),
            ("penalty_rate", self.penalty_rate),
        ] {
            if value > MAX_RATE_BPS {
                return Err(ProtocolError::invalid_parameter(
                    name,
                    format!("{} bps exceeds maximum {}", value, MAX_RATE_BPS),
                ));
            }
        }

        if self.base_rate > self.max_rate || self.max_rate > self.penalty_rate {
            return Err(ProtocolError::invalid_parameter(
                "max_rate",
                "rates must satisfy base <= max <= penalty",
            ));
        }

        if self.optimal_utilization == 0 || self.optimal_utilization >= BPS_DENOMINATOR {
            return Err(ProtocolError::invalid_parameter(
                "optimal_utilization",
                "must be within (0, 10000) bps",
            ));
        }

        if self.penalty_utilization <= self.optimal_utilization
            || self.penalty_utilization > BPS_DENOMINATOR
        {
            return Err(ProtocolError::invalid_parameter(
                "penalty_utilization",
                "must be within (optimal_utilization, 10000] bps",
            ));
        }

        if self.grace_period_seconds > MAX_GRACE_PERIOD_SECONDS {
            return Err(ProtocolError::invalid_parameter(
                "grace_period_seconds",
                format!("must not exceed {} seconds", MAX_GRACE_PERIOD_SECONDS),
            ));
        }

        Ok(())
    }
}

impl RiskParameters {
    pub fn validate(&self) -> Result<()> {
        if self.liquidation_threshold_bps == 0 || self.liquidation_threshold_bps > BPS_DENOMINATOR {
            return Err(ProtocolError::invalid_parameter(
                "liquidation_threshold_bps",
                "must be within (0, 10000] bps",
            ));
        }

        if self.escalation_multiplier_bps < BPS_DENOMINATOR
            || self.escalation_multiplier_bps > MAX_ESCALATION_MULTIPLIER_BPS
        {
            return Err(ProtocolError::invalid_parameter(
                "escalation_multiplier_bps",
                format!(
                    "must be within [{}, {}] bps",
                    BPS_DENOMINATOR, MAX_ESCALATION_MULTIPLIER_BPS
                ),
            ));
        }

        if self.escalation_score_threshold > MAX_SCORE {
            return Err(ProtocolError::invalid_parameter(
                "escalation_score_threshold",
                "must not exceed the maximum score",
            ));
        }

        if self.protocol_fee_bps > BPS_DENOMINATOR {
            return Err(ProtocolError::invalid_parameter(
                "protocol_fee_bps",
                "must not exceed 10000 bps",
            ));
        }

        if self.repayment_window_seconds == 0 {
            return Err(ProtocolError::invalid_parameter(
                "repayment_window_seconds",
                "must be positive",
            ));
        }

        if self.repayment_window_seconds > MAX_REPAYMENT_WINDOW_SECONDS {
            return Err(ProtocolError::invalid_parameter(
                "repayment_window_seconds",
                format!("must not exceed {} seconds", MAX_REPAYMENT_WINDOW_SECONDS),
            ));
        }

        Ok(())
    }
}

impl ReputationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_score > MAX_SCORE {
            return Err(ProtocolError::invalid_parameter(
                "initial_score",
                "must not exceed the maximum score",
            ));
        }
        Ok(())
    }
}

impl ProtocolConfig {
    /// fixed 5% apr, 7 day grace, 30 day repayment window, 90% liquidation threshold
    pub fn standard() -> Self {
        Self {
            rates: RateParameters::default(),
            risk: RiskParameters::default(),
            reputation: ReputationConfig::default(),
        }
    }

    /// utilization-driven rates on top of the standard risk settings
    pub fn dynamic() -> Self {
        Self {
            rates: RateParameters {
                model_type: RateModelType::Dynamic,
                ..RateParameters::default()
            },
            ..Self::standard()
        }
    }

    /// no grace period, useful for tight accrual schedules
    pub fn no_grace() -> Self {
        Self {
            rates: RateParameters {
                grace_period_seconds: 0,
                ..RateParameters::default()
            },
            ..Self::standard()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.rates.validate()?;
        self.risk.validate()?;
        self.reputation.validate()
    }

    /// parse and validate configuration from json
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProtocolConfig =
            serde_json::from_str(json).map_err(|e| ProtocolError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProtocolError::InvalidConfiguration {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(ProtocolConfig::standard().validate().is_ok());
        assert!(ProtocolConfig::dynamic().validate().is_ok());
        assert!(ProtocolConfig::no_grace().validate().is_ok());
        assert_eq!(ProtocolConfig::dynamic().rates.model_type, RateModelType::Dynamic);
    }

    #[test]
    fn test_rate_ordering_enforced() {
        let rates = RateParameters {
            base_rate: 3_000,
            max_rate: 2_000,
            ..RateParameters::default()
        };
        assert!(matches!(
            rates.validate(),
            Err(ProtocolError::InvalidParameter { name: "max_rate", .. })
        ));
    }

    #[test]
    fn test_utilization_bounds() {
        let rates = RateParameters {
            optimal_utilization: 9_500,
            penalty_utilization: 9_500,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_err());

        let rates = RateParameters {
            optimal_utilization: 0,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_err());
    }

    #[test]
    fn test_grace_period_bound() {
        let rates = RateParameters {
            grace_period_seconds: MAX_GRACE_PERIOD_SECONDS + 1,
            ..RateParameters::default()
        };
        assert!(matches!(
            rates.validate(),
            Err(ProtocolError::InvalidParameter { name: "grace_period_seconds", .. })
        ));
    }

    #[test]
    fn test_repayment_window_bound() {
        let risk = RiskParameters {
            repayment_window_seconds: MAX_REPAYMENT_WINDOW_SECONDS,
            ..RiskParameters::default()
        };
        assert!(risk.validate().is_ok());

        let risk = RiskParameters {
            repayment_window_seconds: 10_000_000_000_000_000,
            ..RiskParameters::default()
        };
        assert!(matches!(
            risk.validate(),
            Err(ProtocolError::InvalidParameter { name: "repayment_window_seconds", .. })
        ));
    }

    #[test]
    fn test_multiplier_must_not_shrink_limit() {
        let risk = RiskParameters {
            escalation_multiplier_bps: 9_999,
            ..RiskParameters::default()
        };
        assert!(risk.validate().is_err());

        let risk = RiskParameters {
            liquidation_threshold_bps: 10_001,
            ..RiskParameters::default()
        };
        assert!(risk.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = ProtocolConfig::dynamic();
        let json = config.to_json().unwrap();
        let parsed = ProtocolConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let mut config = ProtocolConfig::standard();
        config.risk.protocol_fee_bps = 20_000;
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(
            ProtocolConfig::from_json(&json),
            Err(ProtocolError::InvalidParameter { name: "protocol_fee_bps", .. })
        ));

        assert!(matches!(
            ProtocolConfig::from_json("{ not json"),
            Err(ProtocolError::InvalidConfiguration { .. })
        ));
    }
}
