//! Loans repository: borrow and return as single transactions
//!
//! Both operations start by locking the book row (`SELECT ... FOR UPDATE`),
//! so concurrent borrows and returns of one book are serialized while other
//! books proceed independently. The UNIQUE constraint on
//! `user_books.book_id` backs the one-holder rule.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::LoanStore;
use crate::{
    error::AppResult,
    models::{Book, BookId, BorrowOutcome, ReturnOutcome, UserId},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn borrow(&self, book_id: BookId, user_id: UserId) -> AppResult<BorrowOutcome> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;

        let book = match book {
            Some(book) => book,
            None => return Ok(BorrowOutcome::BookMissing),
        };

        if book.count <= 0 {
            return Ok(BorrowOutcome::Unavailable);
        }

        let already_held: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_books WHERE book_id = $1)",
        )
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_held {
            return Ok(BorrowOutcome::AlreadyHeld);
        }

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        if !user_exists {
            return Ok(BorrowOutcome::UserMissing);
        }

        let now = Utc::now();

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET count = count - 1, updated_at = $2
            WHERE id = $1 AND count > 0
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_books (user_id, book_id, borrowed_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(book_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(BorrowOutcome::Borrowed(book))
    }

    async fn give_back(&self, book_id: BookId, user_id: UserId) -> AppResult<ReturnOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<BookId> =
            sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        // Holdings of a deleted book are gone with it
        if locked.is_none() {
            return Ok(ReturnOutcome::NotHeld);
        }

        let holder: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM user_books WHERE book_id = $1")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        match holder {
            None => return Ok(ReturnOutcome::NotHeld),
            Some(holder) if holder != user_id => return Ok(ReturnOutcome::HeldByOther),
            Some(_) => {}
        }

        sqlx::query("DELETE FROM user_books WHERE book_id = $1 AND user_id = $2")
            .bind(book_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET count = count + 1, updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReturnOutcome::Returned(book))
    }
}
