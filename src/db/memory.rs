//! In-process ledger store, used by the test suite and for running the api without postgres.
//!
//! The whole state sits behind one async mutex, so every operation is serialized and the
//! balance check + write in [`LedgerStore::debit`] can't interleave with another request.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::db::models::transaction::{LedgerEntry, TokenTransaction, TransactionType};
use crate::db::models::user::{LeaderboardEntry, User, UserId};
use crate::db::{ClaimOutcome, DebitOutcome, LedgerStore, StoreError, StoreResult};
use crate::ledger::bonus::{self, ClaimDecision};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    transactions: Vec<TokenTransaction>,
    last_user_id: i64,
    last_tx_id: i64,
}

impl State {
    fn append(&mut self, user_id: UserId, amount: i64, entry: &LedgerEntry, balance_after: i64) {
        self.last_tx_id += 1;
        self.transactions.push(TokenTransaction {
            id: self.last_tx_id,
            user_id,
            amount,
            tx_type: entry.tx_type,
            reference_id: entry.reference_id,
            description: entry.description.clone(),
            balance_after,
            created_at: Utc::now(),
        });
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    #[instrument(skip(self))]
    async fn create_user(&self, username: &str, signup_bonus: i64) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::UsernameTaken(username.to_owned()));
        }

        state.last_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId(state.last_user_id),
            username: username.to_owned(),
            token_balance: signup_bonus,
            last_daily_bonus_date: None,
            login_streak: 0,
            created_at: now,
            updated_at: now,
        };

        if signup_bonus > 0 {
            let entry = LedgerEntry::new(signup_bonus, TransactionType::SignupBonus)
                .with_description("Welcome to Frequency Factory");
            state.append(user.id, signup_bonus, &entry, signup_bonus);
        }
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    async fn credit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<i64>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        let balance = user
            .token_balance
            .checked_add(entry.amount)
            .ok_or(StoreError::Overflow(id))?;
        user.token_balance = balance;
        user.updated_at = Utc::now();

        state.append(id, entry.amount, entry, balance);
        Ok(Some(balance))
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    async fn debit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<DebitOutcome>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if user.token_balance < entry.amount {
            return Ok(Some(DebitOutcome::Insufficient {
                balance: user.token_balance,
            }));
        }

        user.token_balance -= entry.amount;
        user.updated_at = Utc::now();
        let balance = user.token_balance;

        state.append(id, -entry.amount, entry, balance);
        Ok(Some(DebitOutcome::Applied { balance }))
    }

    #[instrument(skip(self))]
    async fn claim_daily_bonus(
        &self,
        id: UserId,
        today: NaiveDate,
    ) -> StoreResult<Option<ClaimOutcome>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        let decision = bonus::evaluate_claim(user.last_daily_bonus_date, user.login_streak, today);
        let ClaimDecision::Claimed(award) = decision else {
            return Ok(Some(ClaimOutcome {
                decision,
                balance: user.token_balance,
            }));
        };

        let balance = user
            .token_balance
            .checked_add(award.awarded)
            .ok_or(StoreError::Overflow(id))?;
        user.token_balance = balance;
        user.login_streak = award.new_streak;
        user.last_daily_bonus_date = Some(today);
        user.updated_at = Utc::now();

        let entry = LedgerEntry::new(award.awarded, TransactionType::DailyLogin)
            .with_description(award.description());
        state.append(id, award.awarded, &entry, balance);

        Ok(Some(ClaimOutcome { decision, balance }))
    }

    async fn history(&self, id: UserId, limit: i64) -> StoreResult<Vec<TokenTransaction>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LeaderboardEntry>, i64)> {
        let state = self.state.lock().await;

        let mut users: Vec<&User> = state.users.values().collect();
        users.sort_by(|a, b| {
            b.token_balance
                .cmp(&a.token_balance)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.0.cmp(&b.id.0))
        });

        let entries = users
            .into_iter()
            .enumerate()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(idx, u)| LeaderboardEntry {
                rank: idx as i64 + 1,
                user_id: u.id,
                username: u.username.clone(),
                token_balance: u.token_balance,
                login_streak: u.login_streak,
            })
            .collect();

        Ok((entries, state.users.len() as i64))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_signup_bonus_is_logged() {
        let store = MemoryStore::new();
        let user = store.create_user("sine", 50).await.unwrap();

        assert_eq!(user.token_balance, 50);
        let history = store.history(user.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, TransactionType::SignupBonus);
        assert_eq!(history[0].balance_after, 50);
    }

    #[tokio::test]
    async fn test_zero_signup_bonus_writes_no_row() {
        let store = MemoryStore::new();
        let user = store.create_user("square", 0).await.unwrap();
        assert!(store.history(user.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = MemoryStore::new();
        store.create_user("saw", 50).await.unwrap();

        let err = store.create_user("saw", 50).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(name) if name == "saw"));
    }

    #[tokio::test]
    async fn test_debit_guard_leaves_state_untouched() {
        let store = MemoryStore::new();
        let user = store.create_user("pulse", 5).await.unwrap();
        let entry = LedgerEntry::new(6, TransactionType::SkipQueue);

        assert_eq!(
            store.debit(user.id, &entry).await.unwrap(),
            Some(DebitOutcome::Insufficient { balance: 5 })
        );
        assert_eq!(store.history(user.id, 10).await.unwrap().len(), 1);
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().token_balance, 5);
    }

    #[tokio::test]
    async fn test_credit_overflow_is_an_error() {
        let store = MemoryStore::new();
        let user = store.create_user("noise", 1).await.unwrap();
        let entry = LedgerEntry::new(i64::MAX, TransactionType::AdminGrant);

        let err = store.credit(user.id, &entry).await.unwrap_err();
        assert!(matches!(err, StoreError::Overflow(id) if id == user.id));
        assert_eq!(store.history(user.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_ranks_are_global() {
        let store = MemoryStore::new();
        let low = store.create_user("low", 10).await.unwrap();
        let high = store.create_user("high", 90).await.unwrap();
        let mid = store.create_user("mid", 50).await.unwrap();

        let (page, total) = store.leaderboard(2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            page.iter().map(|e| e.user_id).collect::<Vec<_>>(),
            vec![high.id, mid.id]
        );

        let (page, _) = store.leaderboard(2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user_id, low.id);
        assert_eq!(page[0].rank, 3);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let store = MemoryStore::new();
        let entry = LedgerEntry::new(1, TransactionType::Comment);
        let today = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();

        assert_eq!(store.credit(UserId(42), &entry).await.unwrap(), None);
        assert_eq!(store.debit(UserId(42), &entry).await.unwrap(), None);
        assert_eq!(store.claim_daily_bonus(UserId(42), today).await.unwrap(), None);
        assert!(store.get_user(UserId(42)).await.unwrap().is_none());
    }
}
