pub mod liquidation;
pub mod ltv;
pub mod vault;

pub use liquidation::{LiquidationPlan, LiquidationResult};
pub use ltv::LtvCalculator;
pub use vault::{CollateralLedger, CollateralRecord};
