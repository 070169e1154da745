use crate::config::RateParameters;
use crate::decimal::{Bps, Rate, BPS_DENOMINATOR};
use crate::types::RateModelType;

/// annual rate selection, fixed or utilization driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateModel {
    params: RateParameters,
}

impl RateModel {
    pub fn new(params: RateParameters) -> Self {
        Self { params }
    }

    pub fn parameters(&self) -> &RateParameters {
        &self.params
    }

    /// annual rate in bps for the given pool utilization
    pub fn annual_rate_bps(&self, utilization_bps: Bps) -> Bps {
        match self.params.model_type {
            RateModelType::Fixed => self.params.base_rate,
            RateModelType::Dynamic => self.dynamic_rate_bps(utilization_bps),
        }
    }

    pub fn annual_rate(&self, utilization_bps: Bps) -> Rate {
        Rate::from_bps(self.annual_rate_bps(utilization_bps))
    }

    /// base -> max up to optimal, max -> penalty up to penalty utilization, then flat
    fn dynamic_rate_bps(&self, utilization_bps: Bps) -> Bps {
        let p = &self.params;
        let u = utilization_bps.min(BPS_DENOMINATOR) as u64;
        let optimal = p.optimal_utilization as u64;
        let kink = p.penalty_utilization as u64;

        if u <= optimal {
            let span = (p.max_rate - p.base_rate) as u64;
            p.base_rate + (span * u / optimal.max(1)) as Bps
        } else if u <= kink {
            let span = (p.penalty_rate - p.max_rate) as u64;
            let width = (kink - optimal).max(1);
            p.max_rate + (span * (u - optimal) / width) as Bps
        } else {
            p.penalty_rate
        }
    }
}
