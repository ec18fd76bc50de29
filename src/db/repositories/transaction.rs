use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::transaction::TokenTransaction;
use crate::db::models::user::UserId;

#[derive(Debug)]
pub struct TransactionRepository {
    pool: &'static Pool<Postgres>,
}

impl TransactionRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Newest first; `id` breaks ties between rows written in the same database transaction
    #[instrument(skip(self))]
    pub async fn recent_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> SqlxResult<Vec<TokenTransaction>> {
        sqlx::query_as::<_, TokenTransaction>(&format!(
            r#"
            SELECT {}
            FROM token_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            sql_fragment::TRANSACTION_FIELDS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
    }
}
