use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AccessControl, Role};
use crate::collateral::{CollateralLedger, CollateralRecord, LiquidationPlan, LiquidationResult, LtvCalculator};
use crate::config::{ProtocolConfig, RateParameters, RiskParameters};
use crate::decimal::{Bps, Money};
use crate::errors::{ProtocolError, Result};
use crate::events::{Event, EventStore};
use crate::interest::{AccrualEngine, InterestCalculation, RateModel};
use crate::liquidity::{LenderPosition, LiquidityLedger};
use crate::payments::{LimitEscalation, RepaymentReceipt, RepaymentRequest};
use crate::reputation::{ReputationLedger, ReputationRecord};
use crate::state::{CreditLine, StateSnapshot};
use crate::transaction::{Ledgers, Transaction};
use crate::types::{AccountId, PaymentTiming};
use crate::views::{CreditLineView, PoolView};
use crate::wallet::WalletLedger;

/// identity the orchestrator uses towards its ledgers unless told otherwise
pub const DEFAULT_ORCHESTRATOR_ID: &str = "credit-manager";

/// a credit line and the snapshots taken after each committed change
#[derive(Debug)]
struct LineSlot {
    line: CreditLine,
    history: Vec<StateSnapshot>,
}

/// the credit-line orchestrator
///
/// owns every credit line and is the only writer of the wallet, liquidity,
/// collateral and reputation ledgers. each entry operation runs inside one
/// `Transaction`; a failure anywhere leaves every ledger and the line untouched.
pub struct CreditProtocol {
    orchestrator: AccountId,
    access: RwLock<AccessControl>,
    config: RwLock<ProtocolConfig>,
    paused: RwLock<bool>,
    lines: RwLock<HashMap<AccountId, Arc<Mutex<LineSlot>>>>,
    ledgers: Mutex<Ledgers>,
    events: Mutex<EventStore>,
}

impl CreditProtocol {
    pub fn new(admin: AccountId, config: ProtocolConfig) -> Result<Self> {
        Self::with_orchestrator(admin, AccountId::from(DEFAULT_ORCHESTRATOR_ID), config)
    }

    pub fn with_orchestrator(
        admin: AccountId,
        orchestrator: AccountId,
        config: ProtocolConfig,
    ) -> Result<Self> {
        config.validate()?;

        let ledgers = Ledgers {
            wallets: WalletLedger::new(orchestrator.clone()),
            liquidity: LiquidityLedger::new(orchestrator.clone(), config.risk.protocol_fee_bps),
            collateral: CollateralLedger::new(orchestrator.clone()),
            reputation: ReputationLedger::new(orchestrator.clone(), config.reputation),
        };

        info!(admin = %admin, orchestrator = %orchestrator, "credit protocol created");

        Ok(Self {
            access: RwLock::new(AccessControl::new(admin, orchestrator.clone())),
            orchestrator,
            config: RwLock::new(config),
            paused: RwLock::new(false),
            lines: RwLock::new(HashMap::new()),
            ledgers: Mutex::new(ledgers),
            events: Mutex::new(EventStore::new()),
        })
    }

    // borrower operations

    /// open a credit line backed by `collateral_amount` taken from the borrower's wallet
    pub fn open(
        &self,
        borrower: &AccountId,
        collateral_amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLine> {
        self.ensure_not_paused()?;
        require_positive(collateral_amount)?;
        let now = time_provider.now();
        let operation_id = Uuid::new_v4();

        let mut lines = self.lines.write();
        if lines.contains_key(borrower) {
            return Err(ProtocolError::AlreadyExists {
                kind: "credit line",
                owner: borrower.clone(),
            });
        }

        let line = CreditLine::open(borrower.clone(), collateral_amount, now);
        let events = {
            let mut tx = self.begin();
            let staged: Result<()> = (|| {
                tx.debit(borrower, collateral_amount)?;
                tx.deposit_collateral(borrower, collateral_amount)?;
                tx.init_reputation(borrower, now)?;
                Ok(())
            })();
            if let Err(err) = staged {
                drop(tx);
                warn!(%operation_id, borrower = %borrower, error = %err, "open rejected");
                return Err(err);
            }
            tx.emit(Event::CreditLineOpened {
                borrower: borrower.clone(),
                collateral: collateral_amount,
                credit_limit: line.credit_limit,
                timestamp: now,
            });
            tx.commit()
        };

        let slot = LineSlot {
            line: line.clone(),
            history: vec![StateSnapshot::capture(&line, now)],
        };
        lines.insert(borrower.clone(), Arc::new(Mutex::new(slot)));
        drop(lines);

        self.publish(events);
        info!(%operation_id, borrower = %borrower, collateral = %collateral_amount, "credit line opened");
        Ok(line)
    }

    /// add collateral, raising the limit 1:1
    pub fn add_collateral(
        &self,
        borrower: &AccountId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLine> {
        self.ensure_not_paused()?;
        require_positive(amount)?;

        self.with_active_line(borrower, "add_collateral", time_provider, |line, tx, config, now| {
            accrue_line(line, tx, config, now)?;
            tx.debit(borrower, amount)?;
            tx.deposit_collateral(borrower, amount)?;
            line.record_collateral(amount);

            tx.emit(Event::CollateralAdded {
                borrower: borrower.clone(),
                amount,
                new_collateral: line.collateral_deposited,
                new_credit_limit: line.credit_limit,
                timestamp: now,
            });
            Ok(line.clone())
        })
    }

    /// draw from the pool into the borrower's wallet
    pub fn borrow(
        &self,
        borrower: &AccountId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLine> {
        self.draw(borrower, None, amount, time_provider)
    }

    /// draw from the pool straight to a third party
    pub fn borrow_and_pay(
        &self,
        borrower: &AccountId,
        recipient: &AccountId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLine> {
        if recipient == borrower {
            return Err(ProtocolError::invalid_parameter(
                "recipient",
                "must differ from the borrower",
            ));
        }
        self.draw(borrower, Some(recipient), amount, time_provider)
    }

    fn draw(
        &self,
        borrower: &AccountId,
        recipient: Option<&AccountId>,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLine> {
        self.ensure_not_paused()?;
        require_positive(amount)?;
        let operation = if recipient.is_some() { "borrow_and_pay" } else { "borrow" };

        self.with_active_line(borrower, operation, time_provider, |line, tx, config, now| {
            accrue_line(line, tx, config, now)?;

            let outstanding = line.total_debt();
            let requested_total = outstanding
                .checked_add(amount)
                .ok_or_else(|| ProtocolError::overflow("borrow"))?;
            if requested_total > line.credit_limit {
                return Err(ProtocolError::ExceedsCreditLimit {
                    limit: line.credit_limit,
                    outstanding,
                    requested: amount,
                });
            }

            tx.reserve(amount)?;
            tx.credit(recipient.unwrap_or(borrower), amount)?;

            let repayment_due_date = repayment_due_date(config, now)?;
            line.record_borrow(amount, now, repayment_due_date);

            let event = match recipient {
                Some(recipient) => Event::BorrowedAndPaid {
                    borrower: borrower.clone(),
                    recipient: recipient.clone(),
                    amount,
                    new_borrowed: line.borrowed_amount,
                    repayment_due_date,
                    timestamp: now,
                },
                None => Event::Borrowed {
                    borrower: borrower.clone(),
                    amount,
                    new_borrowed: line.borrowed_amount,
                    repayment_due_date,
                    timestamp: now,
                },
            };
            tx.emit(event);
            Ok(line.clone())
        })
    }

    /// repay principal and/or interest; a repayment that clears the principal may raise the limit
    pub fn repay(
        &self,
        borrower: &AccountId,
        principal: Money,
        interest: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<RepaymentReceipt> {
        self.ensure_not_paused()?;

        self.with_active_line(borrower, "repay", time_provider, |line, tx, config, now| {
            accrue_line(line, tx, config, now)?;

            let request = RepaymentRequest::new(principal, interest);
            request.validate(line)?;

            tx.debit(borrower, request.total())?;
            let release = tx.release(principal, interest)?;

            let timing = line.record_repayment(principal, interest, now);
            let new_score = tx.record_outcome(borrower, timing == PaymentTiming::OnTime, now)?;

            tx.emit(Event::Repaid {
                borrower: borrower.clone(),
                principal,
                interest,
                remaining_borrowed: line.borrowed_amount,
                remaining_interest: line.interest_accrued,
                timing,
                timestamp: now,
            });

            let mut new_credit_limit = None;
            if principal.is_positive() && line.borrowed_amount.is_zero() {
                let escalation = LimitEscalation::new(
                    config.risk.escalation_score_threshold,
                    config.risk.escalation_multiplier_bps,
                );
                if let Some(new_limit) = escalation.evaluate(line, new_score) {
                    let old_limit = line.credit_limit;
                    line.credit_limit = new_limit;
                    new_credit_limit = Some(new_limit);
                    tx.emit(Event::CreditLimitIncreased {
                        borrower: borrower.clone(),
                        old_limit,
                        new_limit,
                        score: new_score,
                        timestamp: now,
                    });
                }
            }

            Ok(RepaymentReceipt {
                borrower: borrower.clone(),
                principal,
                interest,
                protocol_fee: release.protocol_fee,
                distributed_to_lenders: release.distributed,
                timing,
                remaining_borrowed: line.borrowed_amount,
                remaining_interest: line.interest_accrued,
                new_score,
                new_credit_limit,
                paid_at: now,
            })
        })
    }

    /// seize collateral from an unsafe or overdue line; admin or liquidator only
    pub fn liquidate(
        &self,
        caller: &AccountId,
        borrower: &AccountId,
        time_provider: &SafeTimeProvider,
    ) -> Result<LiquidationResult> {
        self.ensure_not_paused()?;
        self.access
            .read()
            .require_any(caller, &[Role::Admin, Role::Liquidator], "liquidate")?;

        let result = self.with_active_line(borrower, "liquidate", time_provider, |line, tx, config, now| {
            accrue_line(line, tx, config, now)?;

            let ltv = LtvCalculator::new(config.risk.liquidation_threshold_bps);
            let trigger = ltv.evaluate(line, now);
            if !trigger.is_eligible() {
                return Err(ProtocolError::LiquidationNotAllowed {
                    ltv_bps: LtvCalculator::ltv_bps(line.total_debt(), line.collateral_deposited)
                        .unwrap_or(Bps::MAX),
                    threshold_bps: ltv.threshold_bps(),
                });
            }

            let plan = LiquidationPlan::for_line(line, trigger);
            if plan.seized.is_positive() {
                tx.seize_collateral(borrower, plan.seized, caller)?;
                tx.credit(caller, plan.seized)?;
            }
            if plan.principal_written_off.is_positive() {
                tx.write_off(plan.principal_written_off)?;
            }
            tx.record_default(borrower, plan.debt, now)?;
            line.record_liquidation(plan.seized);

            tx.emit(Event::Liquidated {
                borrower: borrower.clone(),
                liquidator: caller.clone(),
                debt: plan.debt,
                seized: plan.seized,
                written_off: plan.principal_written_off,
                remaining_collateral: plan.remaining_collateral,
                timestamp: now,
            });
            if !line.is_active {
                tx.emit(Event::CreditLineClosed {
                    borrower: borrower.clone(),
                    timestamp: now,
                });
            }

            Ok(LiquidationResult {
                borrower: borrower.clone(),
                liquidator: caller.clone(),
                plan,
                line: line.clone(),
            })
        })?;

        warn!(
            borrower = %borrower,
            liquidator = %caller,
            seized = %result.plan.seized,
            over_ltv = result.plan.trigger.over_ltv,
            overdue = result.plan.trigger.overdue,
            closed = result.plan.closes_line,
            "credit line liquidated"
        );
        Ok(result)
    }

    // lender operations

    pub fn deposit_liquidity(
        &self,
        lender: &AccountId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        require_positive(amount)?;
        let now = time_provider.now();

        self.with_ledgers("deposit_liquidity", lender, |tx| {
            tx.debit(lender, amount)?;
            tx.deposit_liquidity(lender, amount, now)?;
            let total_deposited = tx.liquidity.totals().total_deposited;
            tx.emit(Event::LiquidityDeposited {
                lender: lender.clone(),
                amount,
                total_deposited,
                timestamp: now,
            });
            Ok(())
        })
    }

    pub fn withdraw_liquidity(
        &self,
        lender: &AccountId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        require_positive(amount)?;
        let now = time_provider.now();

        self.with_ledgers("withdraw_liquidity", lender, |tx| {
            tx.withdraw_liquidity(lender, amount)?;
            tx.credit(lender, amount)?;
            let total_deposited = tx.liquidity.totals().total_deposited;
            tx.emit(Event::LiquidityWithdrawn {
                lender: lender.clone(),
                amount,
                total_deposited,
                timestamp: now,
            });
            Ok(())
        })
    }

    /// move a lender's earned interest into their wallet
    pub fn claim_interest(&self, lender: &AccountId, time_provider: &SafeTimeProvider) -> Result<Money> {
        self.ensure_not_paused()?;
        let now = time_provider.now();

        self.with_ledgers("claim_interest", lender, |tx| {
            let earned = tx.claim_interest(lender)?;
            if earned.is_positive() {
                tx.credit(lender, earned)?;
                tx.emit(Event::InterestClaimed {
                    lender: lender.clone(),
                    amount: earned,
                    timestamp: now,
                });
            }
            Ok(earned)
        })
    }

    // admin operations

    pub fn update_parameters(
        &self,
        caller: &AccountId,
        rates: RateParameters,
        risk: RiskParameters,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        self.access.read().require(caller, Role::Admin, "update parameters")?;
        rates.validate()?;
        risk.validate()?;

        let mut config = self.config.write();
        self.ledgers
            .lock()
            .liquidity
            .set_protocol_fee(&self.orchestrator, risk.protocol_fee_bps)?;
        config.rates = rates;
        config.risk = risk;
        drop(config);

        info!(
            base_rate = rates.base_rate,
            model = ?rates.model_type,
            liquidation_threshold = risk.liquidation_threshold_bps,
            "parameters updated"
        );
        self.publish(vec![Event::ParametersUpdated {
            rates,
            risk,
            timestamp: time_provider.now(),
        }]);
        Ok(())
    }

    pub fn pause(&self, caller: &AccountId, time_provider: &SafeTimeProvider) -> Result<()> {
        self.set_paused(caller, true, time_provider)
    }

    pub fn unpause(&self, caller: &AccountId, time_provider: &SafeTimeProvider) -> Result<()> {
        self.set_paused(caller, false, time_provider)
    }

    fn set_paused(&self, caller: &AccountId, paused: bool, time_provider: &SafeTimeProvider) -> Result<()> {
        let action = if paused { "pause" } else { "unpause" };
        self.access.read().require(caller, Role::Admin, action)?;

        let mut flag = self.paused.write();
        if *flag == paused {
            return Ok(());
        }
        *flag = paused;
        drop(flag);

        let timestamp = time_provider.now();
        let event = if paused {
            Event::Paused { timestamp }
        } else {
            Event::Unpaused { timestamp }
        };
        warn!(admin = %caller, paused, "pause state changed");
        self.publish(vec![event]);
        Ok(())
    }

    /// grant or revoke the liquidator role, mirrored into the collateral ledger
    pub fn set_liquidator(
        &self,
        caller: &AccountId,
        liquidator: &AccountId,
        enabled: bool,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let mut access = self.access.write();
        access.require(caller, Role::Admin, "set liquidator")?;

        self.ledgers
            .lock()
            .collateral
            .set_liquidator(&self.orchestrator, liquidator.clone(), enabled)?;
        let changed = access.set_liquidator(liquidator.clone(), enabled);
        drop(access);

        if changed {
            info!(liquidator = %liquidator, enabled, "liquidator updated");
            self.publish(vec![Event::LiquidatorChanged {
                liquidator: liquidator.clone(),
                enabled,
                timestamp: time_provider.now(),
            }]);
        }
        Ok(())
    }

    /// seed a wallet with new tokens
    pub fn mint(&self, caller: &AccountId, to: &AccountId, amount: Money) -> Result<()> {
        self.ensure_not_paused()?;
        self.access.read().require(caller, Role::Admin, "mint")?;
        require_positive(amount)?;

        self.with_ledgers("mint", to, |tx| tx.mint(to, amount))
    }

    // queries

    pub fn is_paused(&self) -> bool {
        *self.paused.read()
    }

    pub fn config(&self) -> ProtocolConfig {
        self.config.read().clone()
    }

    pub fn admin(&self) -> AccountId {
        self.access.read().admin().clone()
    }

    pub fn orchestrator(&self) -> &AccountId {
        &self.orchestrator
    }

    pub fn is_liquidator(&self, account: &AccountId) -> bool {
        self.access.read().has_role(account, Role::Liquidator)
    }

    /// stored line, without interest accrued since the last update
    pub fn credit_line(&self, borrower: &AccountId) -> Result<CreditLine> {
        let slot = self.slot(borrower)?;
        let line = slot.lock().line.clone();
        Ok(line)
    }

    /// snapshots of the line after each committed change, oldest first
    pub fn line_history(&self, borrower: &AccountId) -> Result<Vec<StateSnapshot>> {
        let slot = self.slot(borrower)?;
        let history = slot.lock().history.clone();
        Ok(history)
    }

    /// interest owed as of now, including interest not yet folded into the line
    pub fn current_interest(&self, borrower: &AccountId, time_provider: &SafeTimeProvider) -> Result<Money> {
        let (line, _) = self.projected_line(borrower, time_provider.now())?;
        Ok(line.interest_accrued)
    }

    pub fn is_liquidatable(&self, borrower: &AccountId, time_provider: &SafeTimeProvider) -> Result<bool> {
        let now = time_provider.now();
        let (line, config) = self.projected_line(borrower, now)?;
        if !line.is_active {
            return Ok(false);
        }
        let ltv = LtvCalculator::new(config.risk.liquidation_threshold_bps);
        Ok(ltv.evaluate(&line, now).is_eligible())
    }

    /// current debt over collateral in bps; None once collateral is gone
    pub fn ltv_bps(&self, borrower: &AccountId, time_provider: &SafeTimeProvider) -> Result<Option<Bps>> {
        let (line, _) = self.projected_line(borrower, time_provider.now())?;
        Ok(LtvCalculator::ltv_bps(line.total_debt(), line.collateral_deposited))
    }

    pub fn reputation(&self, user: &AccountId) -> Option<ReputationRecord> {
        self.ledgers.lock().reputation.record(user).cloned()
    }

    pub fn utilization_bps(&self) -> Bps {
        self.ledgers.lock().liquidity.utilization_bps()
    }

    /// annual borrow rate at the current utilization
    pub fn current_rate_bps(&self) -> Bps {
        let rates = self.config.read().rates;
        RateModel::new(rates).annual_rate_bps(self.utilization_bps())
    }

    pub fn available_liquidity(&self) -> Money {
        self.ledgers.lock().liquidity.available_liquidity()
    }

    pub fn pool_view(&self) -> PoolView {
        let rates = self.config.read().rates;
        let ledgers = self.ledgers.lock();
        let utilization = ledgers.liquidity.utilization_bps();
        PoolView::new(
            ledgers.liquidity.totals(),
            utilization,
            RateModel::new(rates).annual_rate_bps(utilization),
            ledgers.liquidity.lender_count(),
            ledgers.collateral.total_collateral(),
        )
    }

    pub fn lender_position(&self, lender: &AccountId) -> Option<LenderPosition> {
        self.ledgers.lock().liquidity.position(lender).cloned()
    }

    pub fn collateral_record(&self, borrower: &AccountId) -> Option<CollateralRecord> {
        self.ledgers.lock().collateral.record(borrower).cloned()
    }

    /// wallet balance
    pub fn balance(&self, account: &AccountId) -> Money {
        self.ledgers.lock().wallets.balance(account)
    }

    pub fn total_supply(&self) -> Money {
        self.ledgers.lock().wallets.total_supply()
    }

    pub fn credit_line_view(
        &self,
        borrower: &AccountId,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditLineView> {
        let now = time_provider.now();
        let (line, config) = self.projected_line(borrower, now)?;
        let reputation = self.reputation(borrower);
        let ltv = LtvCalculator::new(config.risk.liquidation_threshold_bps);
        Ok(CreditLineView::from_line(&line, reputation.as_ref(), &ltv, now))
    }

    pub fn credit_line_json(&self, borrower: &AccountId, time_provider: &SafeTimeProvider) -> Result<String> {
        self.credit_line_view(borrower, time_provider)?
            .to_json_pretty()
            .map_err(|e| ProtocolError::CalculationError {
                message: format!("serialization failed: {}", e),
            })
    }

    /// drain published events
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }

    /// published events not yet drained
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().events().to_vec()
    }

    // internals

    fn ensure_not_paused(&self) -> Result<()> {
        if *self.paused.read() {
            Err(ProtocolError::Paused)
        } else {
            Ok(())
        }
    }

    fn begin(&self) -> Transaction<'_> {
        Transaction::begin(self.ledgers.lock(), self.orchestrator.clone())
    }

    fn publish(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            debug!(event = event.name(), "event published");
        }
        self.events.lock().extend(events);
    }

    fn slot(&self, borrower: &AccountId) -> Result<Arc<Mutex<LineSlot>>> {
        self.lines
            .read()
            .get(borrower)
            .cloned()
            .ok_or_else(|| ProtocolError::NotFound {
                kind: "credit line",
                owner: borrower.clone(),
            })
    }

    /// copy of the line with interest accrued up to `now`, no state changes
    fn projected_line(&self, borrower: &AccountId, now: DateTime<Utc>) -> Result<(CreditLine, ProtocolConfig)> {
        let config = self.config();
        let slot = self.slot(borrower)?;
        let slot = slot.lock();
        let mut line = slot.line.clone();
        let ledgers = self.ledgers.lock();
        accrue_with(&mut line, &ledgers.liquidity, &config, now)?;
        Ok((line, config))
    }

    /// run `f` against a staged copy of an active line inside one transaction
    ///
    /// the line lock is held for the whole operation, so different borrowers
    /// never wait on each other except for the short ledger section
    fn with_active_line<T>(
        &self,
        borrower: &AccountId,
        operation: &'static str,
        time_provider: &SafeTimeProvider,
        f: impl FnOnce(&mut CreditLine, &mut Transaction<'_>, &ProtocolConfig, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let config = self.config();
        let slot = self.slot(borrower)?;
        let mut slot = slot.lock();
        if !slot.line.is_active {
            return Err(ProtocolError::LineInactive {
                borrower: borrower.clone(),
            });
        }

        let now = time_provider.now();
        let operation_id = Uuid::new_v4();
        let mut staged = slot.line.clone();
        let mut tx = self.begin();

        match f(&mut staged, &mut tx, &config, now) {
            Ok(value) => {
                let events = tx.commit();
                slot.history.push(StateSnapshot::capture(&staged, now));
                slot.line = staged;
                drop(slot);

                self.publish(events);
                info!(%operation_id, operation, borrower = %borrower, "operation committed");
                Ok(value)
            }
            Err(err) => {
                drop(tx);
                warn!(%operation_id, operation, borrower = %borrower, error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    /// run `f` in a transaction that touches no credit line
    fn with_ledgers<T>(
        &self,
        operation: &'static str,
        account: &AccountId,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let operation_id = Uuid::new_v4();
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                let events = tx.commit();
                self.publish(events);
                info!(%operation_id, operation, account = %account, "operation committed");
                Ok(value)
            }
            Err(err) => {
                drop(tx);
                warn!(%operation_id, operation, account = %account, error = %err, "operation rolled back");
                Err(err)
            }
        }
    }
}

/// bring a line's interest current at the pool's live rate
fn accrue_with(
    line: &mut CreditLine,
    liquidity: &LiquidityLedger,
    config: &ProtocolConfig,
    now: DateTime<Utc>,
) -> Result<InterestCalculation> {
    let rate_bps = RateModel::new(config.rates).annual_rate_bps(liquidity.utilization_bps());
    AccrualEngine::new(config.rates.grace_period_seconds).accrue(line, rate_bps, now)
}

fn accrue_line(
    line: &mut CreditLine,
    tx: &mut Transaction<'_>,
    config: &ProtocolConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    let calculation = accrue_with(line, &tx.liquidity, config, now)?;
    if calculation.interest_amount.is_positive() {
        debug!(
            borrower = %line.borrower,
            interest = %calculation.interest_amount,
            rate_bps = calculation.rate_bps,
            seconds = calculation.seconds,
            "interest accrued"
        );
        tx.emit(Event::InterestAccrued {
            borrower: line.borrower.clone(),
            amount: calculation.interest_amount,
            total_accrued: line.interest_accrued,
            timestamp: now,
        });
    }
    Ok(())
}

/// a fresh draw is due after the grace period plus the repayment window
fn repayment_due_date(config: &ProtocolConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let seconds = config
        .rates
        .grace_period_seconds
        .checked_add(config.risk.repayment_window_seconds)
        .and_then(|total| i64::try_from(total).ok())
        .ok_or_else(|| ProtocolError::overflow("repayment due date"))?;
    Duration::try_seconds(seconds)
        .and_then(|due_in| now.checked_add_signed(due_in))
        .ok_or_else(|| ProtocolError::overflow("repayment due date"))
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ProtocolError::InvalidAmount {
            amount,
            reason: "must be greater than zero".to_string(),
        })
    }
}
