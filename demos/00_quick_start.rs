/// quick start - open a line, borrow against it and repay on controlled time
use collateral_credit::{AccountId, CreditProtocol, Money, ProtocolConfig, SafeTimeProvider, TimeSource};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let admin = AccountId::from("admin");
    let alice = AccountId::from("alice");
    let lender = AccountId::from("lender");
    let protocol = CreditProtocol::new(admin.clone(), ProtocolConfig::standard())?;

    // fund the wallets and the pool
    protocol.mint(&admin, &alice, Money::from_units(25_000))?;
    protocol.mint(&admin, &lender, Money::from_units(100_000))?;
    protocol.deposit_liquidity(&lender, Money::from_units(100_000), &time)?;

    // lock collateral and draw half the limit
    protocol.open(&alice, Money::from_units(20_000), &time)?;
    protocol.borrow(&alice, Money::from_units(10_000), &time)?;

    // a week of grace, then a month of interest
    controller.advance(Duration::days(37));
    let interest = protocol.current_interest(&alice, &time)?;
    println!("interest owed after 37 days: {}", interest);

    let receipt = protocol.repay(&alice, Money::from_units(10_000), interest, &time)?;
    println!("repaid {:?}, new score {}", receipt.timing, receipt.new_score);

    let earned = protocol.claim_interest(&lender, &time)?;
    println!("lender claimed {}", earned);

    println!("{}", protocol.credit_line_json(&alice, &time)?);

    Ok(())
}
