use datasentinel_core::models::{name_from_email, User};
use datasentinel_core::AppError;
use sqlx::{PgPool, Postgres};

const USER_COLUMNS: &str = "id, email, name, is_pro, stripe_customer_id, created_at";

/// Repository for user accounts
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return the user for `email`, creating it on first login.
    ///
    /// `email` is expected to be trimmed and lower-cased already.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "upsert"))]
    pub async fn find_or_create(&self, email: &str) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<Postgres, User>(&sql)
            .bind(email)
            .bind(name_from_email(email))
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<Postgres, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Mark a user as pro. A `None` customer id keeps the stored one.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update"))]
    pub async fn set_pro(
        &self,
        email: &str,
        stripe_customer_id: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            r#"
            UPDATE users
            SET is_pro = TRUE, stripe_customer_id = COALESCE($2, stripe_customer_id)
            WHERE email = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<Postgres, User>(&sql)
            .bind(email)
            .bind(stripe_customer_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(user) = &user {
            tracing::info!(user_id = user.id, "User upgraded to pro");
        }

        Ok(user)
    }
}
