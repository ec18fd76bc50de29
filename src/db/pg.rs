use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Pool};
use tracing::instrument;

use crate::db::models::transaction::{LedgerEntry, TokenTransaction, TransactionType};
use crate::db::models::user::{LeaderboardEntry, User, UserId};
use crate::db::repositories::Repository;
use crate::db::repositories::Tx;
use crate::db::repositories::leaderboard::LeaderboardRepository;
use crate::db::repositories::transaction::TransactionRepository;
use crate::db::repositories::user::UserRepository;
use crate::db::{ClaimOutcome, DebitOutcome, LedgerStore, StoreError, StoreResult, db_pool};
use crate::ledger::bonus::{self, ClaimDecision};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                      BIGSERIAL PRIMARY KEY,
    username                TEXT NOT NULL UNIQUE,
    token_balance           BIGINT NOT NULL DEFAULT 0 CHECK (token_balance >= 0),
    last_daily_bonus_date   DATE,
    login_streak            BIGINT NOT NULL DEFAULT 0 CHECK (login_streak >= 0),
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS token_transactions (
    id              BIGSERIAL PRIMARY KEY,
    user_id         BIGINT NOT NULL REFERENCES users (id),
    amount          BIGINT NOT NULL CHECK (amount <> 0),
    tx_type         TEXT NOT NULL,
    reference_id    BIGINT,
    description     TEXT,
    balance_after   BIGINT NOT NULL CHECK (balance_after >= 0),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS token_transactions_user_recent
    ON token_transactions (user_id, created_at DESC, id DESC);
"#;

/// Postgres-backed ledger. Every mutation is one database transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: &'static Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    /// Connects through the shared pool and makes sure the tables exist.
    #[instrument]
    pub async fn connect() -> StoreResult<Self> {
        let store = Self::new(db_pool().await?);
        store.ensure_schema().await?;

        Ok(store)
    }

    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(self.pool).await?;
        tracing::debug!("ledger schema ready");

        Ok(())
    }
}

fn map_unique_violation(err: sqlx::Error, username: &str) -> StoreError {
    let taken = matches!(&err, sqlx::Error::Database(db_err) if db_err.is_unique_violation());
    if taken {
        StoreError::UsernameTaken(username.to_owned())
    } else {
        StoreError::SqlxError(err)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    #[instrument(skip(self))]
    async fn create_user(&self, username: &str, signup_bonus: i64) -> StoreResult<User> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result: StoreResult<User> = async {
                let user = tx
                    .insert_user(username, signup_bonus)
                    .await
                    .map_err(|e| map_unique_violation(e, username))?;

                if signup_bonus > 0 {
                    let entry = LedgerEntry::new(signup_bonus, TransactionType::SignupBonus)
                        .with_description("Welcome to Frequency Factory");
                    tx.insert_transaction(user.id, signup_bonus, &entry, user.token_balance)
                        .await?;
                }

                Ok(user)
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(UserRepository::new(self.pool).get_by_id(&id).await?)
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    async fn credit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<i64>> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result: StoreResult<Option<i64>> = async {
                let Some(balance) = tx.credit_balance(id, entry.amount).await? else {
                    return Ok(None);
                };

                tx.insert_transaction(id, entry.amount, entry, balance).await?;
                Ok(Some(balance))
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self, entry), fields(amount = entry.amount, tx_type = %entry.tx_type))]
    async fn debit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<DebitOutcome>> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result: StoreResult<Option<DebitOutcome>> = async {
                match tx.debit_balance(id, entry.amount).await? {
                    Some(balance) => {
                        tx.insert_transaction(id, -entry.amount, entry, balance)
                            .await?;
                        Ok(Some(DebitOutcome::Applied { balance }))
                    }
                    // either the user is gone or the guard in the update rejected it
                    None => Ok(tx
                        .balance_of(id)
                        .await?
                        .map(|balance| DebitOutcome::Insufficient { balance })),
                }
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn claim_daily_bonus(
        &self,
        id: UserId,
        today: NaiveDate,
    ) -> StoreResult<Option<ClaimOutcome>> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result: StoreResult<Option<ClaimOutcome>> = async {
                let Some(user) = tx.lock_user(id).await? else {
                    return Ok(None);
                };

                let decision =
                    bonus::evaluate_claim(user.last_daily_bonus_date, user.login_streak, today);

                let balance = match decision {
                    ClaimDecision::Rejected(_) => user.token_balance,
                    ClaimDecision::Claimed(award) => {
                        let balance = tx
                            .apply_daily_claim(id, award.awarded, award.new_streak, today)
                            .await?;
                        let entry = LedgerEntry::new(award.awarded, TransactionType::DailyLogin)
                            .with_description(award.description());
                        tx.insert_transaction(id, award.awarded, &entry, balance)
                            .await?;

                        balance
                    }
                };

                Ok(Some(ClaimOutcome { decision, balance }))
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn history(&self, id: UserId, limit: i64) -> StoreResult<Vec<TokenTransaction>> {
        Ok(TransactionRepository::new(self.pool)
            .recent_for_user(id, limit)
            .await?)
    }

    #[instrument(skip(self))]
    async fn leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LeaderboardEntry>, i64)> {
        let total = UserRepository::new(self.pool).count().await?;
        let entries = LeaderboardRepository::new(self.pool)
            .get_token_leaderboard(limit, offset)
            .await?;

        Ok((entries, total))
    }
}
