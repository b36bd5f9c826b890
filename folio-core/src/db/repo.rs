//! Database repository layer
//!
//! Provides query and insert operations for books and their interaction
//! events. Every write that touches a book's denormalized counters runs in
//! an IMMEDIATE transaction so the check, the write and the counter update
//! happen under SQLite's write lock.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const BOOK_COLUMNS: &str = "id, title, author, genre, language, word_count, character_count, \
     status, visibility, owner_id, created_at, view_count, average_rating, rating_count";

const RATING_COLUMNS: &str = "id, book_id, user_id, is_anonymous, anonymous_username, rating, \
     review, created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, book_id, user_id, parent_comment_id, content, is_deleted, created_at";

/// Parse a stored timestamp column.
pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(idx: usize, value: &str) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path with default tuning
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &DatabaseConfig::default())
    }

    /// Open or create a database at the given path
    pub fn open_with_config(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;

        // WAL lets readers proceed while a view or rating write holds the lock
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // ============================================
    // Book operations
    // ============================================

    /// Insert a new book with zeroed counters
    pub fn insert_book(&self, book: &NewBook, now: DateTime<Utc>) -> Result<Book> {
        let conn = self.connection()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO books (id, title, author, genre, language, word_count, character_count,
                               status, visibility, owner_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                id,
                book.title,
                book.author,
                book.genre,
                book.language,
                book.word_count,
                book.character_count,
                book.status.as_str(),
                book.visibility.as_str(),
                book.owner_id,
                to_db_timestamp(now),
            ],
        )?;

        tracing::debug!(book_id = %id, genre = %book.genre, "Inserted book");
        Self::fetch_book(&conn, &id)?.ok_or(Error::BookNotFound(id))
    }

    /// Get a book by ID
    pub fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let conn = self.connection()?;
        Self::fetch_book(&conn, id)
    }

    /// List all books, oldest first
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM books ORDER BY created_at, id",
            BOOK_COLUMNS
        ))?;
        let books = stmt
            .query_map([], Self::row_to_book)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(books)
    }

    pub(crate) fn fetch_book(conn: &Connection, id: &str) -> Result<Option<Book>> {
        conn.query_row(
            &format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS),
            [id],
            Self::row_to_book,
        )
        .optional()
        .map_err(Error::from)
    }

    fn ensure_book_exists(conn: &Connection, id: &str) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)",
            [id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(Error::BookNotFound(id.to_string()))
        }
    }

    pub(crate) fn row_to_book(row: &Row) -> rusqlite::Result<Book> {
        let status: String = row.get(7)?;
        let visibility: String = row.get(8)?;
        let created_at: String = row.get(10)?;

        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            genre: row.get(3)?,
            language: row.get(4)?,
            word_count: row.get(5)?,
            character_count: row.get(6)?,
            status: parse_enum(7, &status)?,
            visibility: parse_enum(8, &visibility)?,
            owner_id: row.get(9)?,
            created_at: parse_ts(10, &created_at)?,
            view_count: row.get(11)?,
            average_rating: row.get(12)?,
            rating_count: row.get(13)?,
        })
    }

    // ============================================
    // View recording
    // ============================================

    /// Record a view unless the same user viewed the book inside `dedup_window`.
    ///
    /// Anonymous views (`user_id = None`) are never de-duplicated. The lookup,
    /// insert and `view_count` increment share one IMMEDIATE transaction, so
    /// concurrent callers for the same (book, user) are serialized and at most
    /// one of them is counted. The increment only happens after a successful
    /// insert; a failed insert leaves the counter untouched.
    pub fn record_view(
        &self,
        book_id: &str,
        user_id: Option<&str>,
        reading_duration_secs: i64,
        now: DateTime<Utc>,
        dedup_window: Duration,
    ) -> Result<ViewOutcome> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(user_id) = user_id {
            let since = to_db_timestamp(now - dedup_window);
            let recent: Option<String> = tx
                .query_row(
                    r#"
                    SELECT viewed_at FROM view_events
                    WHERE book_id = ?1 AND user_id = ?2 AND viewed_at > ?3
                    ORDER BY viewed_at DESC
                    LIMIT 1
                    "#,
                    params![book_id, user_id, since],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(last_viewed_at) = recent {
                tracing::debug!(
                    book_id,
                    user_id,
                    last_viewed_at = %last_viewed_at,
                    "Suppressed duplicate view"
                );
                return Ok(ViewOutcome::Suppressed);
            }
        }

        tx.execute(
            r#"
            INSERT INTO view_events (book_id, user_id, viewed_at, reading_duration_secs)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                book_id,
                user_id,
                to_db_timestamp(now),
                reading_duration_secs.max(0)
            ],
        )?;
        tx.execute(
            "UPDATE books SET view_count = view_count + 1 WHERE id = ?1",
            [book_id],
        )?;
        tx.commit()?;

        tracing::debug!(book_id, user_id, "Recorded view");
        Ok(ViewOutcome::Recorded)
    }

    /// List a book's view events, oldest first
    pub fn list_book_views(&self, book_id: &str) -> Result<Vec<ViewEvent>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, book_id, user_id, viewed_at, reading_duration_secs
            FROM view_events
            WHERE book_id = ?
            ORDER BY viewed_at, id
            "#,
        )?;
        let views = stmt
            .query_map([book_id], |row| {
                let viewed_at: String = row.get(3)?;
                Ok(ViewEvent {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    user_id: row.get(2)?,
                    viewed_at: parse_ts(3, &viewed_at)?,
                    reading_duration_secs: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    // ============================================
    // Rating operations
    // ============================================

    fn validate_rating(value: u8) -> Result<()> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "rating must be between {} and {}, got {}",
                MIN_RATING, MAX_RATING, value
            )))
        }
    }

    /// Create a rating and recompute the book's rating counters.
    pub fn create_rating(&self, rating: &NewRating, now: DateTime<Utc>) -> Result<Rating> {
        Self::validate_rating(rating.rating)?;
        if !rating.is_anonymous && rating.user_id.is_none() {
            return Err(Error::InvalidArgument(
                "a non-anonymous rating needs a user id".to_string(),
            ));
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::ensure_book_exists(&tx, &rating.book_id)?;

        if let (false, Some(user_id)) = (rating.is_anonymous, rating.user_id.as_deref()) {
            let existing: Option<i64> = tx
                .query_row(
                    r#"
                    SELECT id FROM ratings
                    WHERE book_id = ?1 AND user_id = ?2 AND is_anonymous = 0
                    "#,
                    params![rating.book_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(Error::DuplicateRating {
                    book_id: rating.book_id.clone(),
                    user_id: user_id.to_string(),
                });
            }
        }

        let ts = to_db_timestamp(now);
        tx.execute(
            r#"
            INSERT INTO ratings (book_id, user_id, is_anonymous, anonymous_username, rating,
                                 review, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                rating.book_id,
                rating.user_id,
                rating.is_anonymous,
                rating.anonymous_username,
                rating.rating,
                rating.review,
                ts,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let (average, count) = Self::recompute_rating_counters(&tx, &rating.book_id)?;
        let stored = Self::fetch_rating(&tx, id)?.ok_or(Error::RatingNotFound(id.to_string()))?;
        tx.commit()?;

        tracing::info!(
            book_id = %rating.book_id,
            rating_id = id,
            average_rating = average,
            rating_count = count,
            "Created rating"
        );
        Ok(stored)
    }

    /// Change a rating's score and review, then recompute the book's counters.
    pub fn update_rating(
        &self,
        rating_id: i64,
        value: u8,
        review: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Rating> {
        Self::validate_rating(value)?;

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = Self::fetch_rating(&tx, rating_id)?
            .ok_or_else(|| Error::RatingNotFound(rating_id.to_string()))?;

        tx.execute(
            "UPDATE ratings SET rating = ?1, review = ?2, updated_at = ?3 WHERE id = ?4",
            params![value, review, to_db_timestamp(now), rating_id],
        )?;
        Self::recompute_rating_counters(&tx, &existing.book_id)?;
        let stored = Self::fetch_rating(&tx, rating_id)?
            .ok_or_else(|| Error::RatingNotFound(rating_id.to_string()))?;
        tx.commit()?;

        tracing::info!(book_id = %existing.book_id, rating_id, "Updated rating");
        Ok(stored)
    }

    /// Delete a rating and recompute the book's counters.
    pub fn delete_rating(&self, rating_id: i64) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = Self::fetch_rating(&tx, rating_id)?
            .ok_or_else(|| Error::RatingNotFound(rating_id.to_string()))?;

        tx.execute("DELETE FROM ratings WHERE id = ?1", [rating_id])?;
        Self::recompute_rating_counters(&tx, &existing.book_id)?;
        tx.commit()?;

        tracing::info!(book_id = %existing.book_id, rating_id, "Deleted rating");
        Ok(())
    }

    /// Get a rating by ID
    pub fn get_rating(&self, rating_id: i64) -> Result<Option<Rating>> {
        let conn = self.connection()?;
        Self::fetch_rating(&conn, rating_id)
    }

    /// List a book's ratings, oldest first
    pub fn list_book_ratings(&self, book_id: &str) -> Result<Vec<Rating>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ratings WHERE book_id = ? ORDER BY created_at, id",
            RATING_COLUMNS
        ))?;
        let ratings = stmt
            .query_map([book_id], Self::row_to_rating)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ratings)
    }

    fn fetch_rating(conn: &Connection, rating_id: i64) -> Result<Option<Rating>> {
        conn.query_row(
            &format!("SELECT {} FROM ratings WHERE id = ?", RATING_COLUMNS),
            [rating_id],
            Self::row_to_rating,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_rating(row: &Row) -> rusqlite::Result<Rating> {
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        Ok(Rating {
            id: row.get(0)?,
            book_id: row.get(1)?,
            user_id: row.get(2)?,
            is_anonymous: row.get(3)?,
            anonymous_username: row.get(4)?,
            rating: row.get(5)?,
            review: row.get(6)?,
            created_at: parse_ts(7, &created_at)?,
            updated_at: parse_ts(8, &updated_at)?,
        })
    }

    /// Rewrite `average_rating`/`rating_count` from the book's rating rows.
    ///
    /// Must run inside the transaction of the rating write it follows.
    fn recompute_rating_counters(conn: &Connection, book_id: &str) -> Result<(f64, i64)> {
        let (count, mean): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), AVG(rating) FROM ratings WHERE book_id = ?1",
            [book_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let average = mean.map(round2).unwrap_or(0.0);

        conn.execute(
            "UPDATE books SET average_rating = ?1, rating_count = ?2 WHERE id = ?3",
            params![average, count, book_id],
        )?;
        Ok((average, count))
    }

    /// Recompute all of a book's denormalized counters from the event tables.
    ///
    /// This is the repair path for the materialized counters; regular
    /// writes keep them current incrementally (views) or by recompute
    /// (ratings).
    pub fn recompute_book_counters(&self, book_id: &str) -> Result<Book> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = Self::fetch_book(&tx, book_id)?
            .ok_or_else(|| Error::BookNotFound(book_id.to_string()))?;

        tx.execute(
            "UPDATE books
             SET view_count = (SELECT COUNT(*) FROM view_events WHERE book_id = ?1)
             WHERE id = ?1",
            [book_id],
        )?;
        Self::recompute_rating_counters(&tx, book_id)?;
        let after = Self::fetch_book(&tx, book_id)?
            .ok_or_else(|| Error::BookNotFound(book_id.to_string()))?;
        tx.commit()?;

        if before.view_count != after.view_count || before.rating_count != after.rating_count {
            tracing::warn!(
                book_id,
                view_count_before = before.view_count,
                view_count_after = after.view_count,
                rating_count_before = before.rating_count,
                rating_count_after = after.rating_count,
                "Book counters drifted from event tables"
            );
        }
        Ok(after)
    }

    // ============================================
    // Comment operations
    // ============================================

    /// Insert a comment on an existing book
    pub fn insert_comment(&self, comment: &NewComment, now: DateTime<Utc>) -> Result<Comment> {
        let conn = self.connection()?;
        Self::ensure_book_exists(&conn, &comment.book_id)?;

        conn.execute(
            r#"
            INSERT INTO comments (book_id, user_id, parent_comment_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                comment.book_id,
                comment.user_id,
                comment.parent_comment_id,
                comment.content,
                to_db_timestamp(now),
            ],
        )?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS),
            [id],
            Self::row_to_comment,
        )
        .map_err(Error::from)
    }

    /// Mark a comment deleted; it no longer counts toward any statistic
    pub fn soft_delete_comment(&self, comment_id: i64) -> Result<()> {
        let conn = self.connection()?;
        let changed = conn.execute(
            "UPDATE comments SET is_deleted = 1 WHERE id = ?1",
            [comment_id],
        )?;
        if changed == 0 {
            return Err(Error::CommentNotFound(comment_id.to_string()));
        }
        Ok(())
    }

    fn row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
        let created_at: String = row.get(6)?;

        Ok(Comment {
            id: row.get(0)?,
            book_id: row.get(1)?,
            user_id: row.get(2)?,
            parent_comment_id: row.get(3)?,
            content: row.get(4)?,
            is_deleted: row.get(5)?,
            created_at: parse_ts(6, &created_at)?,
        })
    }
}
