pub mod auth;
pub mod collateral;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod liquidity;
pub mod payments;
pub mod protocol;
pub mod reputation;
pub mod state;
pub mod transaction;
pub mod types;
pub mod views;
pub mod wallet;

// re-export key types
pub use auth::{AccessControl, Role};
pub use collateral::{CollateralLedger, CollateralRecord, LiquidationPlan, LiquidationResult, LtvCalculator};
pub use config::{ProtocolConfig, RateParameters, ReputationConfig, RiskParameters};
pub use decimal::{Bps, Money, Rate, BPS_DENOMINATOR};
pub use errors::{ProtocolError, Result};
pub use events::{Event, EventStore};
pub use interest::{AccrualEngine, InterestCalculation, InterestCalculator, RateModel};
pub use liquidity::{LenderPosition, LiquidityLedger, PoolTotals, ReleaseReceipt};
pub use payments::{LimitEscalation, RepaymentReceipt, RepaymentRequest};
pub use protocol::CreditProtocol;
pub use reputation::{ReputationLedger, ReputationRecord};
pub use state::{CreditLine, StateSnapshot};
pub use transaction::{Ledgers, Transaction};
pub use types::{
    AccountId, CollateralStatus, LineStatus, LiquidationTrigger, PaymentTiming, RateModelType, Tier,
};
pub use views::{CreditLineView, PoolView};
pub use wallet::WalletLedger;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
