use chrono::{Duration, TimeZone, Utc};
use collateral_credit::{
    AccountId, CreditProtocol, Event, LineStatus, Money, PaymentTiming, ProtocolConfig,
    ProtocolError, RateModelType, SafeTimeProvider, Tier, TimeSource,
};
use std::sync::Arc;
use std::thread;

struct Harness {
    protocol: CreditProtocol,
    time: SafeTimeProvider,
    admin: AccountId,
    alice: AccountId,
    lender: AccountId,
}

impl Harness {
    fn new(config: ProtocolConfig, alice_funds: u64, pool: u64) -> Self {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let admin = AccountId::from("admin");
        let alice = AccountId::from("alice");
        let lender = AccountId::from("lender");

        let protocol = CreditProtocol::new(admin.clone(), config).unwrap();
        protocol.mint(&admin, &alice, Money::from_units(alice_funds)).unwrap();
        protocol.mint(&admin, &lender, Money::from_units(pool)).unwrap();
        protocol
            .deposit_liquidity(&lender, Money::from_units(pool), &time)
            .unwrap();

        Self {
            protocol,
            time,
            admin,
            alice,
            lender,
        }
    }

    fn standard() -> Self {
        Self::new(ProtocolConfig::standard(), 1_000, 10_000)
    }

    fn advance(&self, duration: Duration) {
        self.time.test_control().unwrap().advance(duration);
    }

    /// every unit minted is in exactly one place
    fn assert_conserved(&self, accounts: &[&AccountId]) {
        let pool = self.protocol.pool_view();
        let wallets = accounts
            .iter()
            .fold(Money::ZERO, |sum, account| sum + self.protocol.balance(account));
        let held = wallets
            + pool.total_collateral
            + pool.available_liquidity
            + pool.protocol_fees_collected
            + pool.unclaimed_interest;
        assert_eq!(held, self.protocol.total_supply());
    }

    fn assert_within_limit(&self, borrower: &AccountId) {
        let line = self.protocol.credit_line(borrower).unwrap();
        if line.is_active {
            assert!(line.borrowed_amount + line.interest_accrued <= line.credit_limit);
        }
    }
}

#[test]
fn test_open_borrow_wait_repay_scenario() {
    let h = Harness::standard();

    let line = h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    assert_eq!(line.credit_limit, Money::from_units(100));
    assert_eq!(line.borrowed_amount, Money::ZERO);

    let line = h.protocol.borrow(&h.alice, Money::from_units(50), &h.time).unwrap();
    assert_eq!(line.borrowed_amount, Money::from_units(50));
    assert_eq!(h.protocol.balance(&h.alice), Money::from_units(950));

    // past the 7 day grace period, still before the 37 day due date
    h.advance(Duration::days(20));
    // 50 units at 5% for 13 days truncates to zero
    let interest = h.protocol.current_interest(&h.alice, &h.time).unwrap();
    assert_eq!(interest, Money::ZERO);

    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(50), interest, &h.time)
        .unwrap();
    assert_eq!(receipt.timing, PaymentTiming::OnTime);
    assert!(receipt.is_fully_repaid());

    let line = h.protocol.credit_line(&h.alice).unwrap();
    assert_eq!(line.borrowed_amount, Money::ZERO);
    assert_eq!(line.on_time_count, 1);
    assert_eq!(line.status(), LineStatus::Active);
    assert_eq!(h.protocol.reputation(&h.alice).unwrap().score, 510);

    h.assert_conserved(&[&h.admin, &h.alice, &h.lender]);
}

#[test]
fn test_interest_flows_to_lenders() {
    let h = Harness::new(ProtocolConfig::standard(), 2_100_000, 5_000_000);
    h.protocol
        .open(&h.alice, Money::from_units(2_000_000), &h.time)
        .unwrap();
    h.protocol
        .borrow(&h.alice, Money::from_units(1_000_000), &h.time)
        .unwrap();

    h.advance(Duration::days(7));
    assert_eq!(h.protocol.current_interest(&h.alice, &h.time).unwrap(), Money::ZERO);

    // exactly at the due date counts as on time
    h.advance(Duration::days(30));
    let interest = h.protocol.current_interest(&h.alice, &h.time).unwrap();
    assert_eq!(interest, Money::from_units(4_109));

    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(1_000_000), interest, &h.time)
        .unwrap();
    assert_eq!(receipt.timing, PaymentTiming::OnTime);
    assert_eq!(receipt.protocol_fee, Money::from_units(410));
    assert_eq!(receipt.distributed_to_lenders, Money::from_units(3_699));

    let claimed = h.protocol.claim_interest(&h.lender, &h.time).unwrap();
    assert_eq!(claimed, Money::from_units(3_699));
    assert_eq!(h.protocol.balance(&h.lender), Money::from_units(3_699));

    h.protocol
        .withdraw_liquidity(&h.lender, Money::from_units(5_000_000), &h.time)
        .unwrap();
    assert_eq!(h.protocol.balance(&h.lender), Money::from_units(5_003_699));
    assert_eq!(h.protocol.pool_view().protocol_fees_collected, Money::from_units(410));

    h.assert_conserved(&[&h.admin, &h.alice, &h.lender]);
}

#[test]
fn test_borrow_over_limit_leaves_state_unchanged() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    let before = h.protocol.credit_line(&h.alice).unwrap();
    let pool_before = h.protocol.available_liquidity();

    let err = h
        .protocol
        .borrow(&h.alice, Money::from_units(101), &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ExceedsCreditLimit { .. }));
    assert_eq!(h.protocol.credit_line(&h.alice).unwrap(), before);
    assert_eq!(h.protocol.available_liquidity(), pool_before);

    h.protocol.borrow(&h.alice, Money::from_units(100), &h.time).unwrap();
    let err = h
        .protocol
        .borrow(&h.alice, Money::from_units(1), &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ExceedsCreditLimit { .. }));
    h.assert_within_limit(&h.alice);
}

#[test]
fn test_failed_repay_is_idempotent() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(50), &h.time).unwrap();

    let line_before = h.protocol.credit_line(&h.alice).unwrap();
    let wallet_before = h.protocol.balance(&h.alice);
    let pool_before = h.protocol.pool_view();

    let err = h
        .protocol
        .repay(&h.alice, Money::from_units(10), Money::from_units(1), &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ExceedsInterest { .. }));

    let err = h
        .protocol
        .repay(&h.alice, Money::from_units(51), Money::ZERO, &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ExceedsBorrowedAmount { .. }));

    assert_eq!(h.protocol.credit_line(&h.alice).unwrap(), line_before);
    assert_eq!(h.protocol.balance(&h.alice), wallet_before);
    assert_eq!(h.protocol.pool_view().total_borrowed, pool_before.total_borrowed);
    assert_eq!(h.protocol.reputation(&h.alice).unwrap().score, 500);
}

#[test]
fn test_repay_without_funds_rolls_back() {
    let h = Harness::new(ProtocolConfig::standard(), 100, 10_000);
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(50), &h.time).unwrap();

    // spend the borrowed funds elsewhere
    let shop = AccountId::from("shop");
    h.protocol
        .borrow_and_pay(&h.alice, &shop, Money::from_units(10), &h.time)
        .unwrap();
    let err = h
        .protocol
        .repay(&h.alice, Money::from_units(60), Money::ZERO, &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InsufficientBalance { .. }));
    assert_eq!(
        h.protocol.credit_line(&h.alice).unwrap().borrowed_amount,
        Money::from_units(60)
    );
    assert_eq!(h.protocol.reputation(&h.alice).unwrap().on_time_count, 0);
    h.assert_conserved(&[&h.admin, &h.alice, &h.lender, &shop]);
}

#[test]
fn test_late_repayment_lowers_score() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(40), &h.time).unwrap();

    h.advance(Duration::days(38));
    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(40), Money::ZERO, &h.time)
        .unwrap();
    assert_eq!(receipt.timing, PaymentTiming::Late);
    assert_eq!(receipt.new_score, 480);
    assert_eq!(receipt.new_credit_limit, None);

    let line = h.protocol.credit_line(&h.alice).unwrap();
    assert_eq!(line.late_count, 1);
    assert_eq!(line.on_time_count, 0);
}

#[test]
fn test_limit_escalates_after_full_on_time_repayment() {
    let mut config = ProtocolConfig::standard();
    config.risk.escalation_score_threshold = 510;
    let h = Harness::new(config, 1_000, 10_000);

    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(30), &h.time).unwrap();

    // partial repayment leaves principal outstanding, no escalation
    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(10), Money::ZERO, &h.time)
        .unwrap();
    assert_eq!(receipt.new_credit_limit, None);

    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(20), Money::ZERO, &h.time)
        .unwrap();
    assert_eq!(receipt.new_score, 520);
    assert_eq!(receipt.new_credit_limit, Some(Money::from_units(110)));

    let line = h.protocol.credit_line(&h.alice).unwrap();
    assert_eq!(line.credit_limit, Money::from_units(110));
    assert_eq!(line.collateral_deposited, Money::from_units(100));
    assert!(h
        .protocol
        .take_events()
        .iter()
        .any(|e| matches!(e, Event::CreditLimitIncreased { .. })));
}

#[test]
fn test_limit_unchanged_below_score_threshold() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(30), &h.time).unwrap();

    let receipt = h
        .protocol
        .repay(&h.alice, Money::from_units(30), Money::ZERO, &h.time)
        .unwrap();
    assert_eq!(receipt.new_score, 510);
    assert_eq!(receipt.new_credit_limit, None);
    assert_eq!(
        h.protocol.credit_line(&h.alice).unwrap().credit_limit,
        Money::from_units(100)
    );
}

#[test]
fn test_liquidation_above_threshold() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(95), &h.time).unwrap();

    assert_eq!(h.protocol.ltv_bps(&h.alice, &h.time).unwrap(), Some(9_500));
    assert!(h.protocol.is_liquidatable(&h.alice, &h.time).unwrap());

    let result = h.protocol.liquidate(&h.admin, &h.alice, &h.time).unwrap();
    assert!(result.plan.trigger.over_ltv);
    assert_eq!(result.plan.seized, Money::from_units(95));
    assert!(!result.plan.closes_line);

    let line = h.protocol.credit_line(&h.alice).unwrap();
    assert!(line.is_active);
    assert_eq!(line.borrowed_amount, Money::ZERO);
    assert_eq!(line.interest_accrued, Money::ZERO);
    assert_eq!(line.collateral_deposited, Money::from_units(5));
    assert_eq!(line.credit_limit, Money::from_units(5));

    assert_eq!(h.protocol.balance(&h.admin), Money::from_units(95));
    assert_eq!(h.protocol.pool_view().bad_debt, Money::from_units(95));
    assert_eq!(h.protocol.pool_view().total_borrowed, Money::ZERO);

    let reputation = h.protocol.reputation(&h.alice).unwrap();
    assert_eq!(reputation.score, 450);
    assert_eq!(reputation.default_count, 1);

    h.assert_conserved(&[&h.admin, &h.alice, &h.lender]);
}

#[test]
fn test_no_liquidation_below_threshold() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(89), &h.time).unwrap();

    assert!(!h.protocol.is_liquidatable(&h.alice, &h.time).unwrap());
    let err = h.protocol.liquidate(&h.admin, &h.alice, &h.time).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::LiquidationNotAllowed { ltv_bps: 8_900, threshold_bps: 9_000 }
    ));
    assert_eq!(
        h.protocol.credit_line(&h.alice).unwrap().borrowed_amount,
        Money::from_units(89)
    );
}

#[test]
fn test_overdue_line_liquidated_by_keeper() {
    let h = Harness::standard();
    let keeper = AccountId::from("keeper");
    h.protocol.set_liquidator(&h.admin, &keeper, true, &h.time).unwrap();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(10), &h.time).unwrap();

    h.advance(Duration::days(37));
    assert!(!h.protocol.is_liquidatable(&h.alice, &h.time).unwrap());

    h.advance(Duration::seconds(1));
    assert!(h.protocol.is_liquidatable(&h.alice, &h.time).unwrap());

    let result = h.protocol.liquidate(&keeper, &h.alice, &h.time).unwrap();
    assert!(result.plan.trigger.overdue);
    assert!(!result.plan.trigger.over_ltv);
    assert_eq!(h.protocol.balance(&keeper), result.plan.seized);
    assert_eq!(result.line.collateral_deposited, Money::from_units(90));
}

#[test]
fn test_exhausting_liquidation_closes_line() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.take_events();

    let result = h.protocol.liquidate(&h.admin, &h.alice, &h.time).unwrap();
    assert!(result.plan.closes_line);

    let line = h.protocol.credit_line(&h.alice).unwrap();
    assert!(!line.is_active);
    assert_eq!(line.status(), LineStatus::Closed);

    let names: Vec<_> = h.protocol.take_events().iter().map(|e| e.name()).collect();
    assert!(names.contains(&"liquidated"));
    assert!(names.contains(&"credit_line_closed"));
    assert!(names.contains(&"default_recorded"));

    let err = h
        .protocol
        .borrow(&h.alice, Money::from_units(1), &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::LineInactive { .. }));
    let err = h
        .protocol
        .add_collateral(&h.alice, Money::from_units(1), &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::LineInactive { .. }));
    let err = h.protocol.open(&h.alice, Money::from_units(1), &h.time).unwrap_err();
    assert!(matches!(err, ProtocolError::AlreadyExists { .. }));
}

#[test]
fn test_add_collateral_raises_limit() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    let line = h
        .protocol
        .add_collateral(&h.alice, Money::from_units(50), &h.time)
        .unwrap();

    assert_eq!(line.collateral_deposited, Money::from_units(150));
    assert_eq!(line.credit_limit, Money::from_units(150));
    assert_eq!(
        h.protocol.collateral_record(&h.alice).unwrap().amount,
        Money::from_units(150)
    );

    let err = h
        .protocol
        .add_collateral(&h.alice, Money::ZERO, &h.time)
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidAmount { .. }));
}

#[test]
fn test_daily_refresh_accrues_same_interest_as_untouched_line() {
    let h = Harness::new(ProtocolConfig::no_grace(), 20_000, 100_000);
    let bob = AccountId::from("bob");
    h.protocol.mint(&h.admin, &bob, Money::from_units(10_000)).unwrap();

    for borrower in [&h.alice, &bob] {
        h.protocol.open(borrower, Money::from_units(10_000), &h.time).unwrap();
        h.protocol.borrow(borrower, Money::from_units(3_000), &h.time).unwrap();
    }

    // every add_collateral folds interest into alice's line
    for _ in 0..365 {
        h.advance(Duration::days(1));
        h.protocol
            .add_collateral(&h.alice, Money::from_units(1), &h.time)
            .unwrap();
    }

    let refreshed = h.protocol.current_interest(&h.alice, &h.time).unwrap();
    let untouched = h.protocol.current_interest(&bob, &h.time).unwrap();
    assert_eq!(untouched, Money::from_units(150));
    assert_eq!(refreshed, untouched);
    assert!(h.protocol.credit_line(&h.alice).unwrap().interest_accrued.is_positive());

    h.assert_conserved(&[&h.admin, &h.alice, &h.lender, &bob]);
}

#[test]
fn test_pause_blocks_state_changes() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.pause(&h.admin, &h.time).unwrap();
    assert!(h.protocol.is_paused());

    let err = h
        .protocol
        .borrow(&h.alice, Money::from_units(10), &h.time)
        .unwrap_err();
    assert_eq!(err, ProtocolError::Paused);
    assert!(matches!(
        h.protocol.deposit_liquidity(&h.lender, Money::from_units(1), &h.time),
        Err(ProtocolError::Paused)
    ));

    // reads still work
    assert_eq!(
        h.protocol.credit_line(&h.alice).unwrap().borrowed_amount,
        Money::ZERO
    );

    h.protocol.unpause(&h.admin, &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(10), &h.time).unwrap();
}

#[test]
fn test_dynamic_rate_follows_utilization() {
    let h = Harness::new(ProtocolConfig::dynamic(), 20_000_000, 10_000_000);
    assert_eq!(h.protocol.config().rates.model_type, RateModelType::Dynamic);
    assert_eq!(h.protocol.current_rate_bps(), 500);

    h.protocol
        .open(&h.alice, Money::from_units(10_000_000), &h.time)
        .unwrap();
    h.protocol
        .borrow(&h.alice, Money::from_units(4_000_000), &h.time)
        .unwrap();

    assert_eq!(h.protocol.utilization_bps(), 4_000);
    assert_eq!(h.protocol.current_rate_bps(), 1_250);

    let pool = h.protocol.pool_view();
    assert_eq!(pool.borrow_rate.as_bps(), 1_250);
    assert_eq!(pool.utilization.as_bps(), 4_000);
}

#[test]
fn test_credit_line_json_view() {
    let h = Harness::standard();
    h.protocol.open(&h.alice, Money::from_units(100), &h.time).unwrap();
    h.protocol.borrow(&h.alice, Money::from_units(20), &h.time).unwrap();

    let view = h.protocol.credit_line_view(&h.alice, &h.time).unwrap();
    assert_eq!(view.balances.available_credit, Money::from_units(80));
    assert_eq!(view.reputation.as_ref().map(|r| r.tier), Some(Tier::Silver));

    let json = h.protocol.credit_line_json(&h.alice, &h.time).unwrap();
    assert!(json.contains("alice"));
    assert!(json.contains("ActiveWithDebt"));

    let missing = h.protocol.credit_line_json(&AccountId::from("nobody"), &h.time);
    assert!(matches!(missing, Err(ProtocolError::NotFound { .. })));
}

#[test]
fn test_borrowers_proceed_concurrently() {
    let admin = AccountId::from("admin");
    let lender = AccountId::from("lender");
    let protocol = Arc::new(CreditProtocol::new(admin.clone(), ProtocolConfig::standard()).unwrap());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let setup_time = SafeTimeProvider::new(TimeSource::Test(start));

    protocol.mint(&admin, &lender, Money::from_units(100_000)).unwrap();
    protocol
        .deposit_liquidity(&lender, Money::from_units(100_000), &setup_time)
        .unwrap();

    let borrowers: Vec<AccountId> = (0..8).map(|i| AccountId::new(format!("borrower-{}", i))).collect();
    for borrower in &borrowers {
        protocol.mint(&admin, borrower, Money::from_units(1_000)).unwrap();
    }

    let handles: Vec<_> = borrowers
        .iter()
        .cloned()
        .map(|borrower| {
            let protocol = Arc::clone(&protocol);
            thread::spawn(move || {
                let time = SafeTimeProvider::new(TimeSource::Test(start));
                protocol.open(&borrower, Money::from_units(1_000), &time).unwrap();
                for _ in 0..10 {
                    protocol.borrow(&borrower, Money::from_units(50), &time).unwrap();
                }
                protocol
                    .repay(&borrower, Money::from_units(100), Money::ZERO, &time)
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let pool = protocol.pool_view();
    assert_eq!(pool.total_borrowed, Money::from_units(8 * 400));
    assert_eq!(pool.available_liquidity, Money::from_units(100_000 - 8 * 400));
    assert_eq!(pool.total_collateral, Money::from_units(8 * 1_000));
    for borrower in &borrowers {
        let line = protocol.credit_line(borrower).unwrap();
        assert_eq!(line.borrowed_amount, Money::from_units(400));
        assert!(line.total_debt() <= line.credit_limit);
    }
}
