//! Borrow/return outcomes reported by the loan store

use super::book::Book;

/// Result of an atomic borrow attempt
#[derive(Debug, Clone, PartialEq)]
pub enum BorrowOutcome {
    /// Count decremented and holding recorded
    Borrowed(Book),
    BookMissing,
    UserMissing,
    /// No copy left
    Unavailable,
    /// Some user already holds the book
    AlreadyHeld,
}

/// Result of an atomic return attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOutcome {
    /// Holding removed and count incremented
    Returned(Book),
    /// Nobody holds the book
    NotHeld,
    /// The book is held, but by another user
    HeldByOther,
}
