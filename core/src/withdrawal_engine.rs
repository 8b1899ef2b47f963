//! Withdrawal engine.
//!
//! A request fast-fails on an unbound payout destination or a
//! below-minimum amount. Balance is authoritative only at decision time,
//! where the store re-checks it under the same transaction that debits.

use crate::{
    config::MarketConfig,
    error::{MarketError, MarketResult},
    event::{MarketEvent, WithdrawalOutcome},
    store::{MarketStore, PendingWithdrawal},
    types::{AccountId, WithdrawalId},
};

pub struct WithdrawalEngine {
    store: MarketStore,
    config: MarketConfig,
}

impl WithdrawalEngine {
    pub fn new(store: MarketStore, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Create a pending withdrawal request.
    pub fn request(
        &self,
        account_id: AccountId,
        amount: f64,
        now: i64,
    ) -> MarketResult<(WithdrawalId, Vec<MarketEvent>)> {
        let account =
            self.store
                .get_account(account_id)?
                .ok_or_else(|| MarketError::NotFound {
                    entity: "account",
                    id: account_id.to_string(),
                })?;
        if account.banned {
            return Err(MarketError::AccountBanned);
        }
        let (method, number) = match (&account.payout_method, &account.payout_account) {
            (Some(m), Some(n)) => (m.clone(), n.clone()),
            _ => return Err(MarketError::PayoutNotBound),
        };
        if amount < self.config.min_withdrawal {
            return Err(MarketError::BelowMinimum {
                minimum: self.config.min_withdrawal,
            });
        }
        if amount > account.balance {
            return Err(MarketError::InsufficientBalance {
                balance: account.balance,
                requested: amount,
            });
        }

        let withdrawal_id = self.store.insert_withdrawal(account_id, amount, now)?;
        log::debug!("withdrawal {withdrawal_id} requested by account {account_id}");

        Ok((
            withdrawal_id,
            vec![MarketEvent::WithdrawalRequested {
                withdrawal_id,
                account_id,
                handle: account.handle,
                amount,
                payout_method: method,
                payout_account: number,
            }],
        ))
    }

    /// Decide a pending request. Approval debits exactly `amount`, once;
    /// when the balance no longer covers it, the request stays pending and
    /// InsufficientBalance surfaces for reprocessing. A second decision on
    /// a processed id fails with Conflict and moves no money.
    pub fn decide(
        &self,
        withdrawal_id: WithdrawalId,
        processor: AccountId,
        outcome: WithdrawalOutcome,
        now: i64,
    ) -> MarketResult<Vec<MarketEvent>> {
        let (account_id, amount) =
            self.store
                .process_withdrawal(withdrawal_id, processor, outcome, now)?;
        log::debug!(
            "withdrawal {withdrawal_id} {} by {processor}",
            outcome.as_str()
        );

        Ok(vec![MarketEvent::WithdrawalProcessed {
            withdrawal_id,
            account_id,
            processor,
            outcome,
            amount,
        }])
    }

    /// Pending requests in requested_at order, for operator triage.
    pub fn list_pending(&self) -> MarketResult<Vec<PendingWithdrawal>> {
        self.store
            .pending_withdrawals(self.config.pending_list_limit)
    }
}
