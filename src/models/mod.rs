//! Data models

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookId, BookInput, ListQuery, NewBook};
pub use loan::{BorrowOutcome, ReturnOutcome};
pub use user::{NewUser, Role, User, UserClaims, UserId};
