//! The engine facade wires the store, the three ledger engines, and the
//! conversation orchestrator behind one injected-dependency surface.
//!
//! RULES:
//!   - Collaborators (channel directory, notifier) are constructor
//!     parameters, never ambient globals.
//!   - Every emitted event lands in the event log before it is forwarded.
//!   - Notification delivery is fire-and-forget: a failed notify is
//!     logged and dropped, and never rolls back the ledger mutation
//!     that produced it.

use crate::{
    command::{OperatorCommand, PendingKind},
    config::MarketConfig,
    conversation::{Conversation, TurnOutcome, Workflow},
    error::{MarketError, MarketResult},
    event::{event_type_name, EventLogEntry, MarketEvent},
    referral_engine::ReferralEngine,
    rng::CodeRng,
    store::{
        AccountTotals, MarketStore, PendingSubmission, PendingWithdrawal, ReferralStats,
        SubmissionTotals, WithdrawalTotals,
    },
    submission_engine::SubmissionEngine,
    transport::{ChannelDirectory, LogNotifier, Notifier, OpenDirectory},
    types::{AccountId, SubmissionId, WithdrawalId},
    withdrawal_engine::WithdrawalEngine,
};

/// Outcome of a participant's first contact.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// Not a channel member yet; no account was touched.
    MustJoinChannel,
    Ready(AccountSummary),
}

/// Transport-renderable outcome of a conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Prompt(crate::conversation::Prompt),
    SubmissionQueued { submission_id: SubmissionId },
    PayoutBound { method: String, number: String },
    WithdrawalQueued { withdrawal_id: WithdrawalId, amount: f64 },
    Cancelled,
    Ignored,
}

/// The participant-facing stats view.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub handle: String,
    pub balance: f64,
    pub points: i64,
    pub lifetime_earned: f64,
    pub referral_code: String,
    pub payout_method: Option<String>,
    pub payout_account: Option<String>,
    pub submissions: SubmissionTotals,
    pub referrals: ReferralStats,
    pub referrals_unlocked: bool,
}

/// Sums across the whole marketplace, operator-only.
#[derive(Debug, Clone)]
pub struct AdminStats {
    pub accounts: AccountTotals,
    pub submissions: SubmissionTotals,
    pub withdrawals: WithdrawalTotals,
}

/// Structured response to an operator command.
#[derive(Debug, Clone)]
pub enum OperatorReply {
    SubmissionDecided { submission_id: SubmissionId },
    WithdrawalDecided { withdrawal_id: WithdrawalId },
    PendingSubmissions(Vec<PendingSubmission>),
    PendingWithdrawals(Vec<PendingWithdrawal>),
    Stats(AdminStats),
}

pub struct MarketEngine {
    pub store: MarketStore,
    config: MarketConfig,
    submissions: SubmissionEngine,
    withdrawals: WithdrawalEngine,
    referrals: ReferralEngine,
    conversation: Conversation,
    directory: Box<dyn ChannelDirectory>,
    notifier: Box<dyn Notifier>,
    code_rng: CodeRng,
}

impl MarketEngine {
    /// Build a fully wired engine. The store is migrated here; each
    /// engine gets its own connection to the same database, so the store
    /// must be file-backed or shared-memory (`in_memory_shared()`). A
    /// plain `:memory:` store is rejected up front; its `reopen()` would
    /// hand every engine an isolated, empty database.
    pub fn build(
        store: MarketStore,
        config: MarketConfig,
        directory: Box<dyn ChannelDirectory>,
        notifier: Box<dyn Notifier>,
        code_rng: CodeRng,
    ) -> MarketResult<Self> {
        if !store.is_shareable() {
            return Err(anyhow::anyhow!(
                "engine needs a file-backed or shared-memory store; \
                 use MarketStore::in_memory_shared() for in-memory runs"
            )
            .into());
        }
        store.migrate()?;
        let submissions = SubmissionEngine::new(store.reopen()?, config.clone());
        let withdrawals = WithdrawalEngine::new(store.reopen()?, config.clone());
        let referrals = ReferralEngine::new(store.reopen()?, config.clone());
        let conversation = Conversation::new(store.reopen()?, config.clone());
        Ok(Self {
            store,
            config,
            submissions,
            withdrawals,
            referrals,
            conversation,
            directory,
            notifier,
            code_rng,
        })
    }

    /// Engine over a fresh shared-memory database, open directory, and a
    /// seeded code generator. Used throughout the integration tests.
    pub fn build_test() -> MarketResult<Self> {
        Self::build_test_with_directory(Box::new(OpenDirectory))
    }

    pub fn build_test_with_directory(
        directory: Box<dyn ChannelDirectory>,
    ) -> MarketResult<Self> {
        Self::build(
            MarketStore::in_memory_shared()?,
            MarketConfig::default_test(),
            directory,
            Box::new(LogNotifier),
            CodeRng::seeded(42),
        )
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    // ── First contact ──────────────────────────────────────────

    /// Handle a participant's entry interaction: verify membership,
    /// create the account on first contact, and register a carried
    /// referral code.
    pub fn on_start(
        &mut self,
        account_id: AccountId,
        handle: &str,
        referral_code: Option<&str>,
    ) -> MarketResult<StartOutcome> {
        if !self.directory.is_channel_member(account_id) {
            return Ok(StartOutcome::MustJoinChannel);
        }
        let now = Self::now();
        let mut events = Vec::new();

        let code = self.mint_referral_code()?;
        if self.store.insert_account(account_id, handle, &code, now)? {
            events.push(MarketEvent::AccountCreated {
                account_id,
                handle: handle.to_string(),
                referral_code: code,
            });
        }
        self.store.set_channel_verified(account_id, true)?;

        // A stale or replayed code is a silent no-op inside register().
        if let Some(code) = referral_code {
            let (_, referral_events) = self.referrals.register(code, account_id, now)?;
            events.extend(referral_events);
        }

        self.record_events("start", &events);
        Ok(StartOutcome::Ready(self.account_summary(account_id)?))
    }

    fn mint_referral_code(&mut self) -> MarketResult<String> {
        let len = self.config.referral_code_len;
        loop {
            let code = self.code_rng.referral_code(len);
            if self.store.account_by_referral_code(&code)?.is_none() {
                return Ok(code);
            }
        }
    }

    // ── Conversation workflows ────────────────────────────────

    pub fn start_workflow(
        &self,
        account_id: AccountId,
        workflow: Workflow,
    ) -> MarketResult<Reply> {
        // Membership can lapse between interactions; refresh before the
        // submit entry guard reads it.
        if workflow == Workflow::Submit {
            let member = self.directory.is_channel_member(account_id);
            self.store.set_channel_verified(account_id, member)?;
        }
        let account = self.require_account(account_id)?;
        if account.banned {
            return Err(MarketError::AccountBanned);
        }
        let outcome = self.conversation.start(&account, workflow, Self::now())?;
        self.finish_turn(account_id, outcome)
    }

    pub fn handle_text(&self, account_id: AccountId, text: &str) -> MarketResult<Reply> {
        let account = self.require_account(account_id)?;
        let outcome = self.conversation.on_text(&account, text)?;
        self.finish_turn(account_id, outcome)
    }

    pub fn select_payout_method(
        &self,
        account_id: AccountId,
        method: &str,
    ) -> MarketResult<Reply> {
        let outcome = self
            .conversation
            .select_method(account_id, method, Self::now())?;
        self.finish_turn(account_id, outcome)
    }

    pub fn cancel(&self, account_id: AccountId) -> MarketResult<Reply> {
        let outcome = self.conversation.cancel(account_id)?;
        self.finish_turn(account_id, outcome)
    }

    /// Execute the terminal action a conversation turn produced, if any.
    fn finish_turn(&self, account_id: AccountId, outcome: TurnOutcome) -> MarketResult<Reply> {
        match outcome {
            TurnOutcome::Prompt(prompt) => Ok(Reply::Prompt(prompt)),
            TurnOutcome::SubmitCredential {
                credential_id,
                credential_secret,
            } => {
                let (submission_id, events) = self.submissions.submit(
                    account_id,
                    &credential_id,
                    &credential_secret,
                    Self::now(),
                )?;
                self.record_events("submission", &events);
                Ok(Reply::SubmissionQueued { submission_id })
            }
            TurnOutcome::BindPayout { method, number } => {
                self.store.set_payout_info(account_id, &method, &number)?;
                Ok(Reply::PayoutBound { method, number })
            }
            TurnOutcome::RequestWithdrawal { amount } => {
                let (withdrawal_id, events) =
                    self.withdrawals.request(account_id, amount, Self::now())?;
                self.record_events("withdrawal", &events);
                Ok(Reply::WithdrawalQueued {
                    withdrawal_id,
                    amount,
                })
            }
            TurnOutcome::Cancelled => Ok(Reply::Cancelled),
            TurnOutcome::Ignored => Ok(Reply::Ignored),
        }
    }

    // ── Operator surface ──────────────────────────────────────

    /// Dispatch an authenticated operator command. Anybody else gets
    /// PermissionDenied, never a silent failure.
    pub fn handle_operator(
        &self,
        operator_id: AccountId,
        command: OperatorCommand,
    ) -> MarketResult<OperatorReply> {
        if !self.config.is_operator(operator_id) {
            return Err(MarketError::PermissionDenied);
        }
        match command {
            OperatorCommand::DecideSubmission {
                submission_id,
                outcome,
                earnings,
            } => {
                let events = self.submissions.decide(
                    submission_id,
                    operator_id,
                    outcome,
                    earnings,
                    Self::now(),
                )?;
                self.record_events("review", &events);
                Ok(OperatorReply::SubmissionDecided { submission_id })
            }
            OperatorCommand::DecideWithdrawal {
                withdrawal_id,
                outcome,
            } => {
                let events =
                    self.withdrawals
                        .decide(withdrawal_id, operator_id, outcome, Self::now())?;
                self.record_events("payout", &events);
                Ok(OperatorReply::WithdrawalDecided { withdrawal_id })
            }
            OperatorCommand::ListPending { kind } => match kind {
                PendingKind::Submissions => Ok(OperatorReply::PendingSubmissions(
                    self.submissions.list_pending()?,
                )),
                PendingKind::Withdrawals => Ok(OperatorReply::PendingWithdrawals(
                    self.withdrawals.list_pending()?,
                )),
            },
            OperatorCommand::Stats => Ok(OperatorReply::Stats(self.admin_stats()?)),
        }
    }

    // ── Views ─────────────────────────────────────────────────

    pub fn account_summary(&self, account_id: AccountId) -> MarketResult<AccountSummary> {
        let account = self.require_account(account_id)?;
        Ok(AccountSummary {
            submissions: self.store.submission_stats(account_id)?,
            referrals: self.referrals.stats(account_id)?,
            referrals_unlocked: self.referrals.is_unlocked(account_id)?,
            account_id: account.account_id,
            handle: account.handle,
            balance: account.balance,
            points: account.points,
            lifetime_earned: account.lifetime_earned,
            referral_code: account.referral_code,
            payout_method: account.payout_method,
            payout_account: account.payout_account,
        })
    }

    pub fn admin_stats(&self) -> MarketResult<AdminStats> {
        Ok(AdminStats {
            accounts: self.store.account_totals()?,
            submissions: self.store.aggregate_submission_stats()?,
            withdrawals: self.store.approved_withdrawal_totals()?,
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    // ── Internals ─────────────────────────────────────────────

    fn require_account(
        &self,
        account_id: AccountId,
    ) -> MarketResult<crate::store::AccountRecord> {
        self.store
            .get_account(account_id)?
            .ok_or_else(|| MarketError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }

    /// Append events to the log and push operator-facing ones through the
    /// notifier. Log failures are surfaced in the log only; the mutation
    /// that produced the event has already committed and stays committed.
    fn record_events(&self, source: &str, events: &[MarketEvent]) {
        for event in events {
            let entry = match serde_json::to_string(event) {
                Ok(payload) => EventLogEntry {
                    id: None,
                    occurred_at: Self::now(),
                    source: source.to_string(),
                    event_type: event_type_name(event).to_string(),
                    payload,
                },
                Err(e) => {
                    log::warn!("could not serialize event {event:?}: {e}");
                    continue;
                }
            };
            if let Err(e) = self.store.append_event(&entry) {
                log::warn!("could not append event {:?}: {e}", entry.event_type);
            }
            if event.is_operator_facing() {
                let operator = self.config.primary_operator();
                if let Err(e) = self.notifier.notify(operator, event) {
                    log::warn!("notify operator {operator} failed: {e}");
                }
            }
        }
    }
}
