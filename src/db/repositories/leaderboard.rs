use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::user::LeaderboardEntry;

pub struct LeaderboardRepository {
    pool: &'static Pool<Postgres>,
}

impl LeaderboardRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Global ranking by balance; earlier signups win ties
    #[instrument(skip(self))]
    pub async fn get_token_leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> SqlxResult<Vec<LeaderboardEntry>> {
        sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                ROW_NUMBER() OVER (
                    ORDER BY token_balance DESC, created_at ASC, id ASC
                ) AS rank,
                id AS user_id,
                username,
                token_balance,
                login_streak
            FROM users
            ORDER BY rank ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await
    }
}
