//! In-memory implementation of the stores
//!
//! Books and users share one lock, so a borrow or return observes and
//! mutates both collections as a unit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookStore, LoanStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId, BorrowOutcome, NewBook, NewUser, ReturnOutcome, User, UserId},
};

#[derive(Debug, Default)]
struct State {
    /// Insertion order is the listing order
    books: IndexMap<BookId, Book>,
    users: IndexMap<UserId, User>,
}

impl State {
    fn holder_of(&self, book_id: BookId) -> Option<UserId> {
        self.users
            .values()
            .find(|user| user.holds(book_id))
            .map(|user| user.id)
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(email))
    }

    fn insert_book(&mut self, book: &NewBook) -> Book {
        let now = Utc::now();
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            description: book.description.clone(),
            image_url: book.image_url.clone(),
            count: book.count,
            created_at: now,
            updated_at: now,
        };
        self.books.insert(created.id, created.clone());
        created
    }

    fn insert_user(&mut self, user: &NewUser) -> AppResult<User> {
        if self.email_taken(&user.email) {
            return Err(AppError::Conflict(format!(
                "E-Mail address {} already exists!",
                user.email
            )));
        }

        let created = User {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            books: Vec::new(),
            created_at: Utc::now(),
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }
}

/// Process-local book, user and loan store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let state = self.state.read().await;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let page = state
            .books
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok((page, state.books.len() as i64))
    }

    async fn get_by_id(&self, id: BookId) -> AppResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn create(&self, book: &NewBook) -> AppResult<Book> {
        Ok(self.state.write().await.insert_book(book))
    }

    async fn update(&self, id: BookId, book: &NewBook) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        let Some(existing) = state.books.get_mut(&id) else {
            return Ok(None);
        };

        existing.title = book.title.clone();
        existing.description = book.description.clone();
        existing.image_url = book.image_url.clone();
        existing.count = book.count;
        existing.updated_at = Utc::now();

        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: BookId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.books.shift_remove(&id).is_none() {
            return Ok(false);
        }
        for user in state.users.values_mut() {
            user.books.retain(|held| *held != id);
        }
        Ok(true)
    }

    async fn insert_many(&self, books: &[NewBook]) -> AppResult<u64> {
        let mut state = self.state.write().await;
        for book in books {
            state.insert_book(book);
        }
        Ok(books.len() as u64)
    }

    async fn clear(&self) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let removed = state.books.len() as u64;
        state.books.clear();
        for user in state.users.values_mut() {
            user.books.clear();
        }
        Ok(removed)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        self.state.write().await.insert_user(user)
    }

    async fn insert_many(&self, users: &[NewUser]) -> AppResult<u64> {
        let mut state = self.state.write().await;
        for user in users {
            state.insert_user(user)?;
        }
        Ok(users.len() as u64)
    }

    async fn clear(&self) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let removed = state.users.len() as u64;
        state.users.clear();
        Ok(removed)
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn borrow(&self, book_id: BookId, user_id: UserId) -> AppResult<BorrowOutcome> {
        let mut state = self.state.write().await;

        match state.books.get(&book_id) {
            None => return Ok(BorrowOutcome::BookMissing),
            Some(book) if book.count <= 0 => return Ok(BorrowOutcome::Unavailable),
            Some(_) => {}
        }
        if state.holder_of(book_id).is_some() {
            return Ok(BorrowOutcome::AlreadyHeld);
        }
        if !state.users.contains_key(&user_id) {
            return Ok(BorrowOutcome::UserMissing);
        }

        let book = match state.books.get_mut(&book_id) {
            Some(book) => {
                book.count -= 1;
                book.updated_at = Utc::now();
                book.clone()
            }
            None => return Ok(BorrowOutcome::BookMissing),
        };
        if let Some(user) = state.users.get_mut(&user_id) {
            user.books.push(book_id);
        }

        Ok(BorrowOutcome::Borrowed(book))
    }

    async fn give_back(&self, book_id: BookId, user_id: UserId) -> AppResult<ReturnOutcome> {
        let mut state = self.state.write().await;

        match state.holder_of(book_id) {
            None => return Ok(ReturnOutcome::NotHeld),
            Some(holder) if holder != user_id => return Ok(ReturnOutcome::HeldByOther),
            Some(_) => {}
        }

        if let Some(user) = state.users.get_mut(&user_id) {
            user.books.retain(|held| *held != book_id);
        }

        match state.books.get_mut(&book_id) {
            Some(book) => {
                book.count += 1;
                book.updated_at = Utc::now();
                Ok(ReturnOutcome::Returned(book.clone()))
            }
            None => Ok(ReturnOutcome::NotHeld),
        }
    }
}
