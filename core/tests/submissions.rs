//! Submission pipeline tests: the submit workflow end to end, operator
//! review, and the single-credit guarantee.

use marketplace_core::command;
use marketplace_core::conversation::{Prompt, Workflow};
use marketplace_core::engine::{MarketEngine, Reply, StartOutcome};
use marketplace_core::error::MarketError;
use marketplace_core::transport::ClosedDirectory;

const OPERATOR: i64 = 1;

fn enroll(engine: &mut MarketEngine, id: i64, handle: &str) {
    match engine.on_start(id, handle, None).unwrap() {
        StartOutcome::Ready(_) => {}
        StartOutcome::MustJoinChannel => panic!("open directory should admit {handle}"),
    }
}

fn submit(engine: &MarketEngine, id: i64, text: &str) -> i64 {
    let reply = engine.start_workflow(id, Workflow::Submit).unwrap();
    assert_eq!(reply, Reply::Prompt(Prompt::SendCredential));
    match engine.handle_text(id, text).unwrap() {
        Reply::SubmissionQueued { submission_id } => submission_id,
        other => panic!("expected SubmissionQueued, got {other:?}"),
    }
}

fn operator_line(engine: &MarketEngine, line: &str) {
    let cmd = command::parse(line).unwrap_or_else(|| panic!("unparseable: {line}"));
    engine.handle_operator(OPERATOR, cmd).unwrap();
}

/// A valid review credits the submitter with the operator's amount.
#[test]
fn valid_review_credits_submitter() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    let sub = submit(&engine, 100, "alice.work@gmail.com:hunter2");

    operator_line(&engine, &format!("/valid_{sub}_0.75"));

    let account = engine.store.get_account(100).unwrap().unwrap();
    assert!((account.balance - 0.75).abs() < 1e-9);
    assert!((account.lifetime_earned - 0.75).abs() < 1e-9);
    let record = engine.store.get_submission(sub).unwrap().unwrap();
    assert_eq!(record.status, "valid");
    assert_eq!(record.reviewer, Some(OPERATOR));
    assert!((record.earnings - 0.75).abs() < 1e-9);
}

/// An invalid review closes the submission without paying anything.
#[test]
fn invalid_review_pays_nothing() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    let sub = submit(&engine, 100, "alice.work@gmail.com:hunter2");

    operator_line(&engine, &format!("/invalid_{sub}"));

    let account = engine.store.get_account(100).unwrap().unwrap();
    assert!(account.balance.abs() < 1e-9);
    let record = engine.store.get_submission(sub).unwrap().unwrap();
    assert_eq!(record.status, "invalid");
    assert!(record.earnings.abs() < 1e-9);
}

/// Deciding the same submission twice must credit exactly once.
#[test]
fn second_decision_is_a_conflict() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    let sub = submit(&engine, 100, "alice.work@gmail.com:hunter2");

    operator_line(&engine, &format!("/valid_{sub}_0.75"));
    let cmd = command::parse(&format!("/valid_{sub}_0.75")).unwrap();
    let err = engine.handle_operator(OPERATOR, cmd).unwrap_err();
    assert!(matches!(err, MarketError::Conflict { entity: "submission", .. }), "got {err:?}");

    let account = engine.store.get_account(100).unwrap().unwrap();
    assert!((account.balance - 0.75).abs() < 1e-9, "credited more than once");
}

/// A valid verdict without a positive amount is rejected up front.
#[test]
fn valid_review_requires_positive_earnings() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    let sub = submit(&engine, 100, "alice.work@gmail.com:hunter2");

    let cmd = command::parse(&format!("/valid_{sub}_0")).unwrap();
    let err = engine.handle_operator(OPERATOR, cmd).unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)), "got {err:?}");

    let record = engine.store.get_submission(sub).unwrap().unwrap();
    assert_eq!(record.status, "pending", "submission must stay reviewable");
}

/// Non-finite earnings never reach the ledger, even when a structured
/// command is built without going through the text parser.
#[test]
fn non_finite_earnings_are_rejected() {
    use marketplace_core::command::OperatorCommand;
    use marketplace_core::event::ReviewOutcome;

    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    let sub = submit(&engine, 100, "alice.work@gmail.com:pw");

    assert!(command::parse(&format!("/valid_{sub}_inf")).is_none());

    for earnings in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let cmd = OperatorCommand::DecideSubmission {
            submission_id: sub,
            outcome: ReviewOutcome::Valid,
            earnings,
        };
        let err = engine.handle_operator(OPERATOR, cmd).unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)), "got {err:?}");
    }

    let account = engine.store.get_account(100).unwrap().unwrap();
    assert!(account.balance.abs() < 1e-9);
    assert_eq!(engine.store.get_submission(sub).unwrap().unwrap().status, "pending");
}

/// Non-members are bounced before any submission state is created.
#[test]
fn non_member_is_told_to_join() {
    let mut engine =
        MarketEngine::build_test_with_directory(Box::new(ClosedDirectory)).unwrap();
    match engine.on_start(100, "alice", None).unwrap() {
        StartOutcome::MustJoinChannel => {}
        StartOutcome::Ready(_) => panic!("closed directory must not admit anyone"),
    }
    assert!(engine.store.get_account(100).unwrap().is_none());
}

/// Banned accounts cannot start the submit workflow.
#[test]
fn banned_account_cannot_submit() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    engine.store.set_banned(100, true).unwrap();

    let err = engine.start_workflow(100, Workflow::Submit).unwrap_err();
    assert!(matches!(err, MarketError::AccountBanned), "got {err:?}");
}

/// The credential secret is held in the submission row only; it must
/// never leak into the event log.
#[test]
fn secret_never_reaches_the_event_log() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    submit(&engine, 100, "alice.work@gmail.com:s3cr3t-value");

    assert_eq!(engine.store.event_count("submission_received").unwrap(), 1);
    for entry in engine.store.recent_events(50).unwrap() {
        assert!(
            !entry.payload.contains("s3cr3t-value"),
            "secret leaked into {}: {}",
            entry.event_type,
            entry.payload
        );
    }
}

/// Pending listings surface oldest submissions first.
#[test]
fn pending_listing_is_oldest_first() {
    let mut engine = MarketEngine::build_test().unwrap();
    enroll(&mut engine, 100, "alice");
    enroll(&mut engine, 200, "bob");
    let first = submit(&engine, 100, "alice.work@gmail.com:one");
    let second = submit(&engine, 200, "bob.side@gmail.com:two");

    let pending = engine.store.pending_submissions(10).unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].submission_id, first);
    assert_eq!(pending[1].submission_id, second);
    assert_eq!(pending[0].handle, "alice");
}
