//! Users repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::UserStore;
use crate::{
    error::{AppError, AppResult},
    models::{NewUser, User, UserId},
};

/// Users with their holdings folded into a `books` array
const USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.password, u.role, u.created_at,
           COALESCE(
               ARRAY_AGG(ub.book_id ORDER BY ub.borrowed_at) FILTER (WHERE ub.book_id IS NOT NULL),
               '{}'
           ) AS books
    FROM users u
    LEFT JOIN user_books ub ON ub.user_id = u.id
"#;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(err: sqlx::Error, email: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("E-Mail address {} already exists!", email))
        }
        _ => AppError::Database(err),
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn get_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "{} WHERE u.id = $1 GROUP BY u.id",
            USER_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "{} WHERE LOWER(u.email) = LOWER($1) GROUP BY u.id",
            USER_SELECT
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;

        Ok(User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            books: Vec::new(),
            created_at: now,
        })
    }

    async fn insert_many(&self, users: &[NewUser]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for user in users {
            inserted += sqlx::query(
                r#"
                INSERT INTO users (id, name, email, password, role, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, &user.email))?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn clear(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
