use core::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::db::models::transaction::{LedgerEntry, TokenTransaction};
use crate::db::models::user::{LeaderboardEntry, User, UserId};
use crate::ledger::bonus::ClaimDecision;
use crate::util::env::{self, Var};
use crate::var;

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;

pub mod prelude {
    pub use crate::db::memory::MemoryStore;
    pub use crate::db::models::transaction::{LedgerEntry, TokenTransaction, TransactionType};
    pub use crate::db::models::user::{LeaderboardEntry, User, UserId};
    pub use crate::db::models::{PaginatedResponse, Pagination};
    pub use crate::db::pg::PgStore;
    pub use crate::db::{ClaimOutcome, DebitOutcome, LedgerStore, StoreError};
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);
pub async fn db_pool() -> StoreResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new_pool() -> StoreResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        let pool = sqlx::PgPool::connect(db_url).await?;

        Ok(Self { pool })
    }
}

/// Result of a conditional debit; an insufficient balance is a normal outcome, not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied { balance: i64 },
    Insufficient { balance: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub decision: ClaimDecision,
    /// Balance after the claim, or the untouched balance if it was rejected
    pub balance: i64,
}

/// Persistence seam for the ledger.
///
/// Every mutating method must apply its balance change and its transaction row atomically, and
/// must serialize against other mutations of the same user. Methods return `Ok(None)` when the
/// user does not exist, in which case nothing was written.
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug {
    /// Creates a user with `signup_bonus` already credited (and logged, if non-zero).
    async fn create_user(&self, username: &str, signup_bonus: i64) -> StoreResult<User>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Adds `entry.amount` to the balance, returning the new balance.
    async fn credit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<i64>>;

    /// Subtracts `entry.amount` only if the balance covers it.
    async fn debit(&self, id: UserId, entry: &LedgerEntry) -> StoreResult<Option<DebitOutcome>>;

    /// Evaluates and, if allowed, applies the daily bonus for `today` in one step.
    async fn claim_daily_bonus(
        &self,
        id: UserId,
        today: NaiveDate,
    ) -> StoreResult<Option<ClaimOutcome>>;

    /// Most recent first.
    async fn history(&self, id: UserId, limit: i64) -> StoreResult<Vec<TokenTransaction>>;

    /// A page of users ranked by balance, plus the total user count.
    async fn leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LeaderboardEntry>, i64)>;
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("balance arithmetic overflow for user {0}")]
    Overflow(UserId),
}
