use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Open/total ratio above which a target is classified high risk.
pub const HIGH_RISK_RATIO: f64 = 0.3;
/// Open/total ratio above which (up to [`HIGH_RISK_RATIO`]) a target is
/// classified medium risk.
pub const MEDIUM_RISK_RATIO: f64 = 0.1;

/// Coarse risk classification of a scanned target.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// Human-facing label for tables and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low Risk",
            RiskTier::Medium => "Medium Risk",
            RiskTier::High => "High Risk",
        }
    }

    /// Display color used by the network map and web UI.
    pub fn color(&self) -> &'static str {
        match self {
            RiskTier::Low => "green",
            RiskTier::Medium => "orange",
            RiskTier::High => "red",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract violation: classification over zero scanned ports. Upstream port
/// spec validation makes this unreachable in normal operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("cannot classify a scan of zero ports")]
    EmptyPortSet,
}

/// Map aggregate probe counts onto a risk tier.
///
/// Pure threshold function on the open/total ratio: strictly above 0.3 is
/// `High`, strictly above 0.1 is `Medium`, anything else is `Low`. The
/// boundaries themselves fall into the lower tier (1 open of 10 is `Low`,
/// 3 of 10 is `Medium`).
pub fn classify(open_count: usize, total_count: usize) -> Result<RiskTier, ClassifyError> {
    if total_count == 0 {
        return Err(ClassifyError::EmptyPortSet);
    }
    let ratio = open_count as f64 / total_count as f64;
    let tier = if ratio > HIGH_RISK_RATIO {
        RiskTier::High
    } else if ratio > MEDIUM_RISK_RATIO {
        RiskTier::Medium
    } else {
        RiskTier::Low
    };
    Ok(tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(classify(0, 10).unwrap(), RiskTier::Low);
        assert_eq!(classify(1, 10).unwrap(), RiskTier::Low); // exactly 0.1
        assert_eq!(classify(2, 10).unwrap(), RiskTier::Medium);
        assert_eq!(classify(3, 10).unwrap(), RiskTier::Medium); // exactly 0.3
        assert_eq!(classify(4, 10).unwrap(), RiskTier::High);
        assert_eq!(classify(10, 10).unwrap(), RiskTier::High);
    }

    #[test]
    fn zero_total_is_a_contract_violation() {
        assert_eq!(classify(0, 0), Err(ClassifyError::EmptyPortSet));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskTier::High).unwrap(), "\"high\"");
    }
}
