use crate::decimal::{Bps, Money};
use crate::state::CreditLine;

/// reputation-driven credit limit increases
#[derive(Debug, Clone, Copy)]
pub struct LimitEscalation {
    pub score_threshold: u32,
    pub multiplier_bps: Bps,
}

impl LimitEscalation {
    pub fn new(score_threshold: u32, multiplier_bps: Bps) -> Self {
        Self {
            score_threshold,
            multiplier_bps,
        }
    }

    /// new limit for a line that has just been repaid in full, if it earned one
    pub fn evaluate(&self, line: &CreditLine, score: u32) -> Option<Money> {
        if score < self.score_threshold || line.on_time_count == 0 {
            return None;
        }
        if line.borrowed_amount.is_positive() {
            return None;
        }

        let new_limit = line.credit_limit.mul_bps(self.multiplier_bps)?;
        (new_limit > line.credit_limit).then_some(new_limit)
    }
}
