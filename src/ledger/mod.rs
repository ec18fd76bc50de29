//! Token ledger: the only entry point for changing a user's balance.
//!
//! Input is validated here, before the store is touched. The store owns the balance itself and
//! applies each change together with its transaction row.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::instrument;

use crate::constants::{
    DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, MAX_TRANSACTION_AMOUNT, SIGNUP_BONUS,
    USERNAME_MAX_LEN,
};
use crate::db::prelude::*;

pub mod bonus;

pub type LedgerResult<T> = core::result::Result<T, LedgerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendOutcome {
    Applied { balance: i64 },
    Insufficient { balance: i64, required: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreakStatus {
    pub streak: i64,
    pub last_claim_date: Option<NaiveDate>,
    pub next_milestone: i64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    #[instrument(skip(self))]
    pub async fn register(&self, username: &str) -> LedgerResult<User> {
        validate_username(username)?;

        let user = self.store.create_user(username, SIGNUP_BONUS).await?;
        tracing::info!(user_id = %user.id, "registered user");

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn user(&self, id: UserId) -> LedgerResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or(LedgerError::NotFound(id))
    }

    pub async fn balance(&self, id: UserId) -> LedgerResult<i64> {
        Ok(self.user(id).await?.token_balance)
    }

    /// Credits an earn-tagged entry, returning the new balance.
    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    pub async fn award(&self, id: UserId, entry: LedgerEntry) -> LedgerResult<i64> {
        validate_amount(entry.amount)?;
        if entry.tx_type.is_spend() {
            return Err(LedgerError::Validation(format!(
                "'{}' cannot be used to award tokens",
                entry.tx_type
            )));
        }

        let balance = self
            .store
            .credit(id, &entry)
            .await?
            .ok_or(LedgerError::NotFound(id))?;
        tracing::debug!(balance, "tokens awarded");

        Ok(balance)
    }

    /// Debits a spend-tagged entry if the balance covers it; a short balance is an outcome, not
    /// an error.
    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    pub async fn spend(&self, id: UserId, entry: LedgerEntry) -> LedgerResult<SpendOutcome> {
        validate_amount(entry.amount)?;
        if !entry.tx_type.is_spend() {
            return Err(LedgerError::Validation(format!(
                "'{}' cannot be used to spend tokens",
                entry.tx_type
            )));
        }

        let outcome = match self.store.debit(id, &entry).await? {
            Some(DebitOutcome::Applied { balance }) => SpendOutcome::Applied { balance },
            Some(DebitOutcome::Insufficient { balance }) => {
                tracing::debug!(balance, "insufficient balance");
                SpendOutcome::Insufficient {
                    balance,
                    required: entry.amount,
                }
            }
            None => return Err(LedgerError::NotFound(id)),
        };

        Ok(outcome)
    }

    /// Newest first. `limit` defaults to 20 and is clamped to `1..=100`.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<TokenTransaction>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        // an unknown user and a user with no rows would otherwise look the same
        self.user(id).await?;

        Ok(self.store.history(id, limit).await?)
    }

    #[instrument(skip(self))]
    pub async fn claim_daily_bonus(
        &self,
        id: UserId,
        today: NaiveDate,
    ) -> LedgerResult<ClaimOutcome> {
        let outcome = self
            .store
            .claim_daily_bonus(id, today)
            .await?
            .ok_or(LedgerError::NotFound(id))?;
        tracing::debug!(decision = ?outcome.decision, balance = outcome.balance, "daily claim");

        Ok(outcome)
    }

    pub async fn streak(&self, id: UserId) -> LedgerResult<StreakStatus> {
        let user = self.user(id).await?;

        Ok(StreakStatus {
            streak: user.login_streak,
            last_claim_date: user.last_daily_bonus_date,
            next_milestone: bonus::next_milestone(user.login_streak),
            progress_percent: bonus::milestone_progress_percent(user.login_streak),
        })
    }

    #[instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        pagination: &Pagination,
    ) -> LedgerResult<PaginatedResponse<LeaderboardEntry>> {
        let (limit, offset) = pagination.bounds();
        let (entries, total) = self.store.leaderboard(limit, offset).await?;

        Ok(PaginatedResponse::new(
            entries,
            total,
            limit,
            pagination.page.max(0),
        ))
    }
}

fn validate_amount(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::Validation(
            "amount must be a positive integer".to_owned(),
        ));
    }
    if amount > MAX_TRANSACTION_AMOUNT {
        return Err(LedgerError::Validation(format!(
            "amount must not exceed {MAX_TRANSACTION_AMOUNT}"
        )));
    }

    Ok(())
}

fn validate_username(username: &str) -> LedgerResult<()> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_LEN {
        return Err(LedgerError::Validation(format!(
            "username must be 1 to {USERNAME_MAX_LEN} characters"
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LedgerError::Validation(
            "username may only contain letters, digits, '_' and '-'".to_owned(),
        ));
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken(_) => LedgerError::Conflict(err.to_string()),
            other => LedgerError::Store(other),
        }
    }
}
