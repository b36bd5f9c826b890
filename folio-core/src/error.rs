//! Error types for folio-core

use thiserror::Error;

/// Main error type for the folio-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Book not found
    #[error("book not found: {0}")]
    BookNotFound(String),

    /// Rating not found
    #[error("rating not found: {0}")]
    RatingNotFound(String),

    /// Comment not found
    #[error("comment not found: {0}")]
    CommentNotFound(String),

    /// A user tried to rate the same book twice under their own name
    #[error("user {user_id} has already rated book {book_id}")]
    DuplicateRating { book_id: String, user_id: String },

    /// Argument outside its accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection mutex was poisoned by a panicking holder
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Result type alias for folio-core
pub type Result<T> = std::result::Result<T, Error>;
