//! Referral tests: code minting, one-edge-per-account crediting, and
//! the display unlock threshold.

use marketplace_core::engine::{MarketEngine, StartOutcome};

fn enroll(engine: &mut MarketEngine, id: i64, handle: &str, code: Option<&str>) -> String {
    match engine.on_start(id, handle, code).unwrap() {
        StartOutcome::Ready(summary) => summary.referral_code,
        StartOutcome::MustJoinChannel => panic!("open directory should admit {handle}"),
    }
}

/// Joining with a referrer's code pays the referrer the fixed reward.
#[test]
fn referral_pays_the_referrer_once() {
    let mut engine = MarketEngine::build_test().unwrap();
    let code = enroll(&mut engine, 100, "alice", None);
    enroll(&mut engine, 200, "bob", Some(&code));

    let referrer = engine.store.get_account(100).unwrap().unwrap();
    assert!((referrer.balance - 0.50).abs() < 1e-9);
    assert!((referrer.lifetime_earned - 0.50).abs() < 1e-9);
    let referred = engine.store.get_account(200).unwrap().unwrap();
    assert_eq!(referred.referred_by, Some(100));
    assert_eq!(engine.store.event_count("referral_registered").unwrap(), 1);
}

/// Replaying the entry with the same (or any) code is a silent no-op.
#[test]
fn referral_cannot_be_registered_twice() {
    let mut engine = MarketEngine::build_test().unwrap();
    let code_a = enroll(&mut engine, 100, "alice", None);
    let code_c = enroll(&mut engine, 300, "carol", None);
    enroll(&mut engine, 200, "bob", Some(&code_a));

    enroll(&mut engine, 200, "bob", Some(&code_a));
    enroll(&mut engine, 200, "bob", Some(&code_c));

    let alice = engine.store.get_account(100).unwrap().unwrap();
    assert!((alice.balance - 0.50).abs() < 1e-9, "rewarded more than once");
    let carol = engine.store.get_account(300).unwrap().unwrap();
    assert!(carol.balance.abs() < 1e-9, "second referrer must get nothing");
    assert_eq!(engine.store.get_account(200).unwrap().unwrap().referred_by, Some(100));
}

/// Self-referral and unknown codes are ignored without an error.
#[test]
fn bogus_codes_are_ignored() {
    let mut engine = MarketEngine::build_test().unwrap();
    let code = enroll(&mut engine, 100, "alice", None);

    // Alice cannot refer herself; the code belongs to her own account.
    enroll(&mut engine, 100, "alice", Some(&code));
    enroll(&mut engine, 200, "bob", Some("NOSUCHCD"));

    let alice = engine.store.get_account(100).unwrap().unwrap();
    assert!(alice.balance.abs() < 1e-9);
    assert_eq!(alice.referred_by, None);
    assert_eq!(engine.store.get_account(200).unwrap().unwrap().referred_by, None);
}

/// Minted codes are unique per account and match the configured shape.
#[test]
fn minted_codes_are_well_formed_and_distinct() {
    let mut engine = MarketEngine::build_test().unwrap();
    let len = engine.config().referral_code_len;
    let a = enroll(&mut engine, 100, "alice", None);
    let b = enroll(&mut engine, 200, "bob", None);

    assert_ne!(a, b);
    for code in [&a, &b] {
        assert_eq!(code.len(), len);
        assert!(code.bytes().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()), "{code}");
    }
}

/// The referral program stays locked until lifetime earnings cross the
/// threshold; crossing it never forfeits rewards earned while locked.
#[test]
fn unlock_follows_lifetime_earnings() {
    let mut engine = MarketEngine::build_test().unwrap();
    let code = enroll(&mut engine, 100, "alice", None);

    match engine.on_start(100, "alice", None).unwrap() {
        StartOutcome::Ready(summary) => assert!(!summary.referrals_unlocked),
        StartOutcome::MustJoinChannel => unreachable!(),
    }

    // Rewards accrue even while the program display is locked.
    enroll(&mut engine, 200, "bob", Some(&code));
    let alice = engine.store.get_account(100).unwrap().unwrap();
    assert!((alice.balance - 0.50).abs() < 1e-9);

    engine.store.adjust_balance(100, 100.0).unwrap();
    match engine.on_start(100, "alice", None).unwrap() {
        StartOutcome::Ready(summary) => {
            assert!(summary.referrals_unlocked);
            assert_eq!(summary.referrals.referred_count, 1);
        }
        StartOutcome::MustJoinChannel => unreachable!(),
    }
}

/// Valid submissions by a referred account roll up into the referrer's
/// earnings-generated stat.
#[test]
fn referred_earnings_roll_up_to_the_referrer() {
    use marketplace_core::event::ReviewOutcome;

    let mut engine = MarketEngine::build_test().unwrap();
    let code = enroll(&mut engine, 100, "alice", None);
    enroll(&mut engine, 200, "bob", Some(&code));

    let sub = engine
        .store
        .insert_submission(200, "bob.side@gmail.com", "pw", 10)
        .unwrap();
    engine
        .store
        .review_submission(sub, 1, ReviewOutcome::Valid, 2.25, 11)
        .unwrap();

    let stats = engine.store.referral_stats(100).unwrap();
    assert_eq!(stats.referred_count, 1);
    assert!((stats.earnings_generated - 2.25).abs() < 1e-9);
}
