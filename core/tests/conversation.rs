//! Conversation orchestrator tests: step persistence, re-prompting, and
//! session replacement.

use marketplace_core::config::MarketConfig;
use marketplace_core::conversation::{Conversation, Prompt, SessionStep, Workflow};
use marketplace_core::engine::{MarketEngine, Reply, StartOutcome};

fn enroll(engine: &mut MarketEngine, id: i64, handle: &str) {
    match engine.on_start(id, handle, None).unwrap() {
        StartOutcome::Ready(_) => {}
        StartOutcome::MustJoinChannel => panic!("open directory should admit {handle}"),
    }
}

/// A malformed credential re-prompts and keeps the session alive; the
/// corrected line then goes through.
#[test]
fn malformed_credential_then_valid() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.start_workflow(100, Workflow::Submit).unwrap();

    let reply = engine.handle_text(100, "no separator here").unwrap();
    assert_eq!(reply, Reply::Prompt(Prompt::MalformedCredential));
    let reply = engine.handle_text(100, "alice@outlook.com:pw").unwrap();
    assert!(matches!(reply, Reply::Prompt(Prompt::WrongCredentialDomain { .. })), "got {reply:?}");
    assert_eq!(
        engine.conversation().current_step(100).unwrap(),
        Some(SessionStep::AwaitingSubmissionText)
    );

    let reply = engine.handle_text(100, "alice.work@gmail.com:pw").unwrap();
    assert!(matches!(reply, Reply::SubmissionQueued { .. }), "got {reply:?}");
    assert!(engine.conversation().current_step(100).unwrap().is_none());
}

/// Secrets may contain colons; only the first one splits.
#[test]
fn secret_keeps_everything_after_the_first_colon() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.start_workflow(100, Workflow::Submit).unwrap();

    let reply = engine.handle_text(100, "alice.work@gmail.com:pa:ss:word").unwrap();
    let Reply::SubmissionQueued { submission_id } = reply else {
        panic!("expected SubmissionQueued, got {reply:?}");
    };
    let record = engine.store.get_submission(submission_id).unwrap().unwrap();
    assert_eq!(record.credential_id, "alice.work@gmail.com");
    assert_eq!(record.credential_secret, "pa:ss:word");
}

/// Domain matching is case-insensitive.
#[test]
fn credential_domain_check_ignores_case() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.start_workflow(100, Workflow::Submit).unwrap();

    let reply = engine.handle_text(100, "Alice.Work@GMAIL.com:pw").unwrap();
    assert!(matches!(reply, Reply::SubmissionQueued { .. }), "got {reply:?}");
}

/// The payout flow walks method selection then number entry, with the
/// chosen method carried inside the persisted step.
#[test]
fn payout_binding_flow() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");

    let reply = engine.start_workflow(100, Workflow::BindPayout).unwrap();
    assert!(matches!(reply, Reply::Prompt(Prompt::ChoosePayoutMethod { .. })), "got {reply:?}");

    // Unknown method re-prompts, matching is case-insensitive.
    let reply = engine.select_payout_method(100, "Venmo").unwrap();
    assert!(matches!(reply, Reply::Prompt(Prompt::ChoosePayoutMethod { .. })), "got {reply:?}");
    let reply = engine.select_payout_method(100, "paymaya").unwrap();
    assert_eq!(reply, Reply::Prompt(Prompt::SendPayoutNumber { method: "PayMaya".into() }));

    let reply = engine.handle_text(100, "0917123").unwrap();
    assert!(matches!(reply, Reply::Prompt(Prompt::InvalidPayoutNumber { .. })), "got {reply:?}");
    let reply = engine.handle_text(100, "09171234567").unwrap();
    assert_eq!(
        reply,
        Reply::PayoutBound { method: "PayMaya".into(), number: "09171234567".into() }
    );

    let account = engine.store.get_account(100).unwrap().unwrap();
    assert_eq!(account.payout_method.as_deref(), Some("PayMaya"));
    assert_eq!(account.payout_account.as_deref(), Some("09171234567"));
}

/// Starting a new workflow replaces whatever session was active.
#[test]
fn new_workflow_replaces_active_session() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");

    engine.start_workflow(100, Workflow::Submit).unwrap();
    engine.start_workflow(100, Workflow::BindPayout).unwrap();

    assert_eq!(
        engine.conversation().current_step(100).unwrap(),
        Some(SessionStep::AwaitingPayoutMethod)
    );
    // The old submit step is gone; a credential line is now just text.
    let reply = engine.handle_text(100, "alice.work@gmail.com:pw").unwrap();
    assert!(matches!(reply, Reply::Prompt(Prompt::ChoosePayoutMethod { .. })), "got {reply:?}");
}

/// Cancel drops the session; further text is ignored.
#[test]
fn cancel_clears_the_session() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.start_workflow(100, Workflow::Submit).unwrap();

    assert_eq!(engine.cancel(100).unwrap(), Reply::Cancelled);
    assert_eq!(engine.cancel(100).unwrap(), Reply::Ignored);
    assert_eq!(engine.handle_text(100, "alice.work@gmail.com:pw").unwrap(), Reply::Ignored);
}

/// Sessions live in the database, so a second orchestrator over the
/// same store sees the step mid-flight.
#[test]
fn session_survives_an_orchestrator_rebuild() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.start_workflow(100, Workflow::BindPayout).unwrap();
    engine.select_payout_method(100, "GCash").unwrap();

    let rebuilt = Conversation::new(engine.store.reopen().unwrap(), MarketConfig::default_test());
    assert_eq!(
        rebuilt.current_step(100).unwrap(),
        Some(SessionStep::AwaitingPayoutNumber { method: "GCash".into() })
    );
    let account = engine.store.get_account(100).unwrap().unwrap();
    let outcome = rebuilt.on_text(&account, "09179999999").unwrap();
    assert!(
        matches!(outcome, marketplace_core::conversation::TurnOutcome::BindPayout { .. }),
        "got {outcome:?}"
    );
}

/// Text with no active session is ignored outright.
#[test]
fn idle_text_is_ignored() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    assert_eq!(engine.handle_text(100, "hello?").unwrap(), Reply::Ignored);
}
