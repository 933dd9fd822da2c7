//! Repository layer for persistence
//!
//! Services only see the [`BookStore`], [`UserStore`] and [`LoanStore`]
//! traits, bundled in a [`Repository`] handle built once at startup.
//! Two backends exist: PostgreSQL through sqlx, and a process-local
//! [`memory::MemoryStore`].

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    config::{DatabaseConfig, StorageBackend},
    error::{AppError, AppResult},
    models::{Book, BookId, BorrowOutcome, NewBook, NewUser, ReturnOutcome, User, UserId},
};

/// Persistent collection of book records
#[async_trait]
pub trait BookStore: Send + Sync {
    /// One page of books in storage order, plus the total number of books
    async fn list(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)>;

    async fn get_by_id(&self, id: BookId) -> AppResult<Option<Book>>;

    async fn create(&self, book: &NewBook) -> AppResult<Book>;

    /// Overwrite title, description, image and count. `None` if the book is gone.
    async fn update(&self, id: BookId, book: &NewBook) -> AppResult<Option<Book>>;

    /// Remove a book and any holding of it. Returns whether it existed.
    async fn delete(&self, id: BookId) -> AppResult<bool>;

    async fn insert_many(&self, books: &[NewBook]) -> AppResult<u64>;

    async fn clear(&self) -> AppResult<u64>;

    async fn ping(&self) -> AppResult<()>;
}

/// Persistent collection of user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn create(&self, user: &NewUser) -> AppResult<User>;

    async fn insert_many(&self, users: &[NewUser]) -> AppResult<u64>;

    async fn clear(&self) -> AppResult<u64>;
}

/// Holding updates spanning both stores, each applied atomically per book
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Check availability and existing holders, then decrement the count and
    /// record the holding, with no other borrow or return of the same book
    /// interleaving.
    async fn borrow(&self, book_id: BookId, user_id: UserId) -> AppResult<BorrowOutcome>;

    /// Remove the caller's holding and increment the count, atomically.
    async fn give_back(&self, book_id: BookId, user_id: UserId) -> AppResult<ReturnOutcome>;
}

/// Handle over the three stores, passed into services at construction
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub loans: Arc<dyn LoanStore>,
}

impl Repository {
    /// Open the configured backend, running migrations for PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            StorageBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .connect(&config.url)
                    .await?;

                tracing::info!("Connected to database");

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;

                tracing::info!("Database migrations completed");
                Ok(Self::postgres(pool))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on shutdown");
                Ok(Self::in_memory())
            }
        }
    }

    /// Create a repository backed by the given PostgreSQL pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool)),
        }
    }

    /// Create a repository living in process memory
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self {
            books: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            loans: Arc::new(store),
        }
    }
}
