use chrono::{DateTime, Utc};
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::debug;

use crate::collateral::{CollateralLedger, CollateralRecord};
use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::liquidity::{LenderPosition, LiquidityLedger, PoolTotals, ReleaseReceipt};
use crate::reputation::{ReputationLedger, ReputationRecord};
use crate::types::AccountId;
use crate::wallet::WalletLedger;

/// the four ledgers the orchestrator coordinates
#[derive(Debug, Clone)]
pub struct Ledgers {
    pub wallets: WalletLedger,
    pub liquidity: LiquidityLedger,
    pub collateral: CollateralLedger,
    pub reputation: ReputationLedger,
}

/// previous value of one record touched inside a transaction
#[derive(Debug, Clone)]
enum Undo {
    Wallet(AccountId, Money),
    Supply(Money),
    Collateral(AccountId, Option<CollateralRecord>),
    Reputation(AccountId, Option<ReputationRecord>),
    Pool(PoolTotals),
    Lender(AccountId, Option<LenderPosition>),
    AllLenders(BTreeMap<AccountId, LenderPosition>),
}

/// all-or-nothing unit of work over the ledgers
///
/// every write goes through a journaled wrapper; dropping the transaction
/// without `commit` replays the journal backwards and discards staged events
pub struct Transaction<'a> {
    ledgers: MutexGuard<'a, Ledgers>,
    caller: AccountId,
    journal: Vec<Undo>,
    events: EventStore,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(ledgers: MutexGuard<'a, Ledgers>, caller: AccountId) -> Self {
        Self {
            ledgers,
            caller,
            journal: Vec::new(),
            events: EventStore::new(),
            committed: false,
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    /// keep every write and hand back the staged events
    pub fn commit(mut self) -> Vec<Event> {
        self.committed = true;
        self.journal.clear();
        self.events.take_events()
    }

    fn save_wallet(&mut self, account: &AccountId) {
        let balance = self.ledgers.wallets.balance(account);
        self.journal.push(Undo::Wallet(account.clone(), balance));
    }

    fn save_collateral(&mut self, borrower: &AccountId) {
        let record = self.ledgers.collateral.record(borrower).cloned();
        self.journal.push(Undo::Collateral(borrower.clone(), record));
    }

    fn save_reputation(&mut self, user: &AccountId) {
        let record = self.ledgers.reputation.record(user).cloned();
        self.journal.push(Undo::Reputation(user.clone(), record));
    }

    fn save_pool(&mut self) {
        let totals = self.ledgers.liquidity.totals();
        self.journal.push(Undo::Pool(totals));
    }

    fn save_lender(&mut self, lender: &AccountId) {
        let position = self.ledgers.liquidity.position(lender).cloned();
        self.journal.push(Undo::Lender(lender.clone(), position));
    }

    // wallets

    pub fn mint(&mut self, to: &AccountId, amount: Money) -> Result<()> {
        self.save_wallet(to);
        let supply = self.ledgers.wallets.total_supply();
        self.journal.push(Undo::Supply(supply));
        let caller = self.caller.clone();
        self.ledgers.wallets.mint(&caller, to, amount)
    }

    pub fn debit(&mut self, from: &AccountId, amount: Money) -> Result<()> {
        self.save_wallet(from);
        let caller = self.caller.clone();
        self.ledgers.wallets.debit(&caller, from, amount)
    }

    pub fn credit(&mut self, to: &AccountId, amount: Money) -> Result<()> {
        self.save_wallet(to);
        let caller = self.caller.clone();
        self.ledgers.wallets.credit(&caller, to, amount)
    }

    // collateral

    pub fn deposit_collateral(&mut self, borrower: &AccountId, amount: Money) -> Result<()> {
        self.save_collateral(borrower);
        let caller = self.caller.clone();
        self.ledgers.collateral.deposit(&caller, borrower, amount)
    }

    pub fn seize_collateral(
        &mut self,
        borrower: &AccountId,
        amount: Money,
        to: &AccountId,
    ) -> Result<Money> {
        self.save_collateral(borrower);
        let caller = self.caller.clone();
        self.ledgers.collateral.seize(&caller, borrower, amount, to)
    }

    // liquidity

    pub fn deposit_liquidity(
        &mut self,
        lender: &AccountId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.save_pool();
        self.save_lender(lender);
        let caller = self.caller.clone();
        self.ledgers.liquidity.deposit(&caller, lender, amount, now)
    }

    pub fn withdraw_liquidity(&mut self, lender: &AccountId, amount: Money) -> Result<()> {
        self.save_pool();
        self.save_lender(lender);
        let caller = self.caller.clone();
        self.ledgers.liquidity.withdraw(&caller, lender, amount)
    }

    pub fn claim_interest(&mut self, lender: &AccountId) -> Result<Money> {
        self.save_pool();
        self.save_lender(lender);
        let caller = self.caller.clone();
        self.ledgers.liquidity.claim_interest(&caller, lender)
    }

    pub fn reserve(&mut self, amount: Money) -> Result<Money> {
        self.save_pool();
        let caller = self.caller.clone();
        self.ledgers.liquidity.reserve(&caller, amount)
    }

    pub fn release(&mut self, principal: Money, interest: Money) -> Result<ReleaseReceipt> {
        self.save_pool();
        let positions = self.ledgers.liquidity.positions_snapshot();
        self.journal.push(Undo::AllLenders(positions));
        let caller = self.caller.clone();
        self.ledgers.liquidity.release(&caller, principal, interest)
    }

    pub fn write_off(&mut self, principal: Money) -> Result<()> {
        self.save_pool();
        let caller = self.caller.clone();
        self.ledgers.liquidity.write_off(&caller, principal)
    }

    // reputation

    pub fn init_reputation(&mut self, user: &AccountId, now: DateTime<Utc>) -> Result<bool> {
        self.save_reputation(user);
        let caller = self.caller.clone();
        self.ledgers.reputation.ensure_initialized(&caller, user, now)
    }

    pub fn record_outcome(
        &mut self,
        user: &AccountId,
        positive: bool,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        self.save_reputation(user);
        let caller = self.caller.clone();
        let Transaction {
            ledgers, events, ..
        } = self;
        ledgers
            .reputation
            .record_outcome(&caller, user, positive, now, events)
    }

    pub fn record_default(&mut self, user: &AccountId, debt: Money, now: DateTime<Utc>) -> Result<u32> {
        self.save_reputation(user);
        let caller = self.caller.clone();
        let Transaction {
            ledgers, events, ..
        } = self;
        ledgers.reputation.record_default(&caller, user, debt, now, events)
    }

    fn rollback(&mut self) {
        let undone = self.journal.len();
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Wallet(account, balance) => {
                    self.ledgers.wallets.restore_balance(account, balance)
                }
                Undo::Supply(total) => self.ledgers.wallets.restore_supply(total),
                Undo::Collateral(borrower, record) => {
                    self.ledgers.collateral.restore_record(borrower, record)
                }
                Undo::Reputation(user, record) => {
                    self.ledgers.reputation.restore_record(user, record)
                }
                Undo::Pool(totals) => self.ledgers.liquidity.restore_totals(totals),
                Undo::Lender(lender, position) => {
                    self.ledgers.liquidity.restore_position(lender, position)
                }
                Undo::AllLenders(positions) => self.ledgers.liquidity.restore_positions(positions),
            }
        }
        self.events.clear();
        if undone > 0 {
            debug!(records = undone, "transaction rolled back");
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = Ledgers;

    fn deref(&self) -> &Ledgers {
        &self.ledgers
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
