//! Core domain types for folio
//!
//! These types mirror the rows the analytics engine reads and writes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Book** | A published work; carries denormalized view and rating counters |
//! | **ViewEvent** | One counted open of a book, optionally tied to a user |
//! | **Rating** | A 1-5 score with optional review; may be anonymous |
//! | **Comment** | A comment on a book; only counted by analytics |
//!
//! User ids are opaque strings owned by the identity service. `None` means
//! the interaction was anonymous.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lowest accepted rating value
pub const MIN_RATING: u8 = 1;
/// Highest accepted rating value
pub const MAX_RATING: u8 = 5;

/// Format a timestamp the way it is stored in SQLite.
///
/// Fixed-width microsecond precision with a `Z` suffix, so string ordering
/// matches time ordering and SQLite's date functions can parse it.
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================
// Book
// ============================================

/// Editorial status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Draft,
    InReview,
    Published,
    Archived,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Draft => "draft",
            BookStatus::InReview => "in_review",
            BookStatus::Published => "published",
            BookStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BookStatus::Draft),
            "in_review" => Ok(BookStatus::InReview),
            "published" => Ok(BookStatus::Published),
            "archived" => Ok(BookStatus::Archived),
            _ => Err(format!("unknown book status: {}", s)),
        }
    }
}

/// Who can see a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("unknown visibility: {}", s)),
        }
    }
}

/// A book row, including the counters maintained by the analytics engine.
///
/// `view_count`, `average_rating` and `rating_count` are a materialized
/// cache over `view_events` and `ratings`. They are written only by
/// [`Database::record_view`](crate::Database::record_view), the rating
/// write paths, and
/// [`Database::recompute_book_counters`](crate::Database::recompute_book_counters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub language: String,
    pub word_count: i64,
    pub character_count: i64,
    pub status: BookStatus,
    pub visibility: Visibility,
    /// User who created the book
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    /// Number of counted views (post de-duplication)
    pub view_count: i64,
    /// Mean rating rounded to two decimals, 0.0 when unrated
    pub average_rating: f64,
    pub rating_count: i64,
}

/// Fields needed to create a book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub language: String,
    pub word_count: i64,
    pub character_count: i64,
    pub status: BookStatus,
    pub visibility: Visibility,
    pub owner_id: String,
}

impl NewBook {
    /// A published, public book with empty text statistics.
    pub fn published(title: &str, author: &str, genre: &str, owner_id: &str) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            language: "en".to_string(),
            word_count: 0,
            character_count: 0,
            status: BookStatus::Published,
            visibility: Visibility::Public,
            owner_id: owner_id.to_string(),
        }
    }
}

// ============================================
// Events
// ============================================

/// A recorded view of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub id: i64,
    pub book_id: String,
    /// `None` for anonymous readers
    pub user_id: Option<String>,
    pub viewed_at: DateTime<Utc>,
    /// Seconds spent reading, when the client reported it
    pub reading_duration_secs: i64,
}

/// Result of a view recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewOutcome {
    /// A new view event was stored and the book's view count incremented
    Recorded,
    /// The same user viewed the book inside the dedup window; nothing stored
    Suppressed,
}

/// A rating row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub book_id: String,
    pub user_id: Option<String>,
    pub is_anonymous: bool,
    pub anonymous_username: Option<String>,
    /// Score in `MIN_RATING..=MAX_RATING`
    pub rating: u8,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a rating.
#[derive(Debug, Clone)]
pub struct NewRating {
    pub book_id: String,
    pub user_id: Option<String>,
    pub is_anonymous: bool,
    pub anonymous_username: Option<String>,
    pub rating: u8,
    pub review: Option<String>,
}

impl NewRating {
    /// A rating attributed to `user_id`.
    pub fn by_user(book_id: &str, user_id: &str, rating: u8) -> Self {
        Self {
            book_id: book_id.to_string(),
            user_id: Some(user_id.to_string()),
            is_anonymous: false,
            anonymous_username: None,
            rating,
            review: None,
        }
    }

    /// An anonymous rating shown under `username`.
    pub fn anonymous(book_id: &str, username: &str, rating: u8) -> Self {
        Self {
            book_id: book_id.to_string(),
            user_id: None,
            is_anonymous: true,
            anonymous_username: Some(username.to_string()),
            rating,
            review: None,
        }
    }
}

/// A comment row. Content is stored as received; sanitization happens upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub book_id: String,
    pub user_id: Option<String>,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub book_id: String,
    pub user_id: Option<String>,
    pub parent_comment_id: Option<i64>,
    pub content: String,
}
