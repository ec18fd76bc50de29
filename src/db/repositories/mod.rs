use core::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;

use crate::db::models::transaction::{LedgerEntry, TokenTransaction};
use crate::db::models::user::{User, UserId};

pub mod leaderboard;
pub mod transaction;
pub mod user;

/// Owned wrapper over a postgres transaction carrying the ledger's write queries.
///
/// Balance changes go through single conditional `UPDATE .. RETURNING` statements so two
/// concurrent requests for the same user can never both act on a stale balance.
pub struct Tx {
    inner: Option<Transaction<'static, Postgres>>,
}

impl Tx {
    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// `f` takes ownership of the `Tx` and hands it back alongside its result, which keeps the
    /// borrow of the transaction out of the returned future's signature.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T, E>(pool: &'static Pool<Postgres>, f: F) -> Result<T, E>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = (Tx, Result<T, E>)>,
        E: From<sqlx::Error> + fmt::Debug,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::trace!(error = ?e, "transacted query failure");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = ?rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &'static Pool<Postgres>) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        match self.inner.take() {
            Some(tx) => tx.commit().await,
            None => Err(sqlx::Error::Protocol("Transaction already completed".into())),
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await,
            None => Err(sqlx::Error::Protocol("Transaction already completed".into())),
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'static, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }

    #[instrument(skip(self))]
    pub async fn insert_user(&mut self, username: &str, balance: i64) -> SqlxResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, token_balance, login_streak, created_at, updated_at)
            VALUES ($1, $2, 0, NOW(), NOW())
            RETURNING {}
            "#,
            sql_fragment::USER_FIELDS
        ))
        .bind(username)
        .bind(balance)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    /// Returns `None` if the user doesn't exist.
    #[instrument(skip(self))]
    pub async fn credit_balance(&mut self, id: UserId, amount: i64) -> SqlxResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET token_balance = token_balance + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING token_balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    /// Returns `None` if the user doesn't exist *or* can't cover `amount`; nothing is written in
    /// either case.
    #[instrument(skip(self))]
    pub async fn debit_balance(&mut self, id: UserId, amount: i64) -> SqlxResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET token_balance = token_balance - $2,
                updated_at = NOW()
            WHERE id = $1
              AND token_balance >= $2
            RETURNING token_balance
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn balance_of(&mut self, id: UserId) -> SqlxResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT token_balance FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **self.inner_mut()?)
            .await
    }

    /// Row-locks the user until the transaction ends.
    #[instrument(skip(self))]
    pub async fn lock_user(&mut self, id: UserId) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            sql_fragment::USER_FIELDS
        ))
        .bind(id)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn apply_daily_claim(
        &mut self,
        id: UserId,
        awarded: i64,
        new_streak: i64,
        today: NaiveDate,
    ) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET token_balance = token_balance + $2,
                login_streak = $3,
                last_daily_bonus_date = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING token_balance
            "#,
        )
        .bind(id)
        .bind(awarded)
        .bind(new_streak)
        .bind(today)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    /// Appends a ledger row. `amount` is signed: callers negate it for spends.
    #[instrument(skip(self, entry), fields(tx_type = %entry.tx_type))]
    pub async fn insert_transaction(
        &mut self,
        id: UserId,
        amount: i64,
        entry: &LedgerEntry,
        balance_after: i64,
    ) -> SqlxResult<TokenTransaction> {
        sqlx::query_as::<_, TokenTransaction>(&format!(
            r#"
            INSERT INTO token_transactions (
                user_id,
                amount,
                tx_type,
                reference_id,
                description,
                balance_after,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            sql_fragment::TRANSACTION_FIELDS
        ))
        .bind(id)
        .bind(amount)
        .bind(entry.tx_type.as_str())
        .bind(entry.reference_id)
        .bind(entry.description.as_deref())
        .bind(balance_after)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }
}

pub mod sql_fragment {
    pub const USER_FIELDS: &str = r#"
        id,
        username,
        token_balance,
        last_daily_bonus_date,
        login_streak,
        created_at,
        updated_at
    "#;

    pub const TRANSACTION_FIELDS: &str = r#"
        id,
        user_id,
        amount,
        tx_type,
        reference_id,
        description,
        balance_after,
        created_at
    "#;
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;

    fn new(pool: &'static Pool<Postgres>) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static Pool<Postgres>;

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
