use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::user::{User, UserId};
use crate::db::repositories::Repository;

#[derive(Debug)]
pub struct UserRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for UserRepository {
    type Ident = UserId;
    type Output = User;

    const BASE_FIELDS: &'static str = sql_fragment::USER_FIELDS;
    const TABLE_NAME: &'static str = "users";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl UserRepository {
    #[instrument(skip(self))]
    pub async fn count(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
    }
}
