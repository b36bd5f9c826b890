//! Read-path aggregation queries
//!
//! Raw counts pulled from the event tables. Scoring and ranking happen in
//! [`crate::analytics`]; these queries only group and count. Windows are
//! closed `[since, now]` ranges computed once by the caller, except the
//! genre windows used for trending, which are left-open.

use super::repo::Database;
use crate::error::Result;
use crate::types::{round2, to_db_timestamp, Book};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;

/// Audited all-time totals for one book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookTotals {
    pub title: String,
    pub total_views: i64,
    pub unique_viewers: i64,
    pub total_comments: i64,
    pub total_ratings: i64,
    /// Mean over rating rows, rounded to two decimals
    pub average_rating: f64,
}

/// One book's totals plus its windowed view buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct BookActivity {
    pub totals: BookTotals,
    /// Views per UTC calendar date, ascending; days without views absent
    pub daily_views: Vec<(NaiveDate, i64)>,
    /// Views per UTC hour of day, index 0-23
    pub hourly_views: [i64; 24],
}

/// A book with the raw signals the popularity score blends.
#[derive(Debug, Clone)]
pub struct BookSignals {
    pub book: Book,
    pub recent_views: i64,
    pub comment_count: i64,
}

/// A user's activity counts inside one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserActivity {
    pub views: i64,
    pub ratings: i64,
    pub comments: i64,
}

/// Sitewide totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformTotals {
    pub total_books: i64,
    pub total_users: i64,
    pub total_views: i64,
    pub total_ratings: i64,
    pub total_comments: i64,
    pub active_users: i64,
    pub average_rating: f64,
}

impl Database {
    /// Totals, daily views and the hourly distribution for one book, read
    /// from a single snapshot. Returns `None` if the book does not exist.
    ///
    /// Daily and hourly buckets come straight from the fixed-width stored
    /// timestamp text, so they agree with each other and with the window
    /// filter down to the microsecond.
    pub fn get_book_activity(
        &self,
        book_id: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<BookActivity>> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let Some(totals) = book_totals(&tx, book_id)? else {
            return Ok(None);
        };
        let since = to_db_timestamp(since);
        let now = to_db_timestamp(now);
        let daily_views = daily_views(&tx, book_id, &since, &now)?;
        let hourly_views = hourly_views(&tx, book_id, &since, &now)?;
        tx.commit()?;

        Ok(Some(BookActivity {
            totals,
            daily_views,
            hourly_views,
        }))
    }

    /// Every book with its view count in `[since, now]` and its live comment count.
    pub fn get_book_signals(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookSignals>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT b.id, b.title, b.author, b.genre, b.language, b.word_count, b.character_count,
                   b.status, b.visibility, b.owner_id, b.created_at, b.view_count,
                   b.average_rating, b.rating_count,
                   (SELECT COUNT(*) FROM view_events v
                        WHERE v.book_id = b.id AND v.viewed_at >= ?1 AND v.viewed_at <= ?2),
                   (SELECT COUNT(*) FROM comments c
                        WHERE c.book_id = b.id AND c.is_deleted = 0)
            FROM books b
            ORDER BY b.id
            "#,
        )?;

        let signals = stmt
            .query_map(params![to_db_timestamp(since), to_db_timestamp(now)], |row| {
                Ok(BookSignals {
                    book: Database::row_to_book(row)?,
                    recent_views: row.get(14)?,
                    comment_count: row.get(15)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(signals)
    }

    /// View counts per genre in `(start, end]`, genres with no views omitted.
    ///
    /// Left-open so two adjacent windows never count the same event.
    pub fn get_genre_views(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(String, i64)>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT b.genre, COUNT(*) as cnt
            FROM view_events v
            JOIN books b ON v.book_id = b.id
            WHERE v.viewed_at > ?1 AND v.viewed_at <= ?2
            GROUP BY b.genre
            ORDER BY b.genre
            "#,
        )?;

        let rows = stmt
            .query_map(params![to_db_timestamp(start), to_db_timestamp(end)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// A user's views, ratings and live comments in `[since, now]`.
    pub fn get_user_activity(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<UserActivity> {
        let conn = self.connection()?;
        let since = to_db_timestamp(since);
        let now = to_db_timestamp(now);

        let activity = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM view_events
                    WHERE user_id = ?1 AND viewed_at >= ?2 AND viewed_at <= ?3),
                (SELECT COUNT(*) FROM ratings
                    WHERE user_id = ?1 AND created_at >= ?2 AND created_at <= ?3),
                (SELECT COUNT(*) FROM comments
                    WHERE user_id = ?1 AND is_deleted = 0
                      AND created_at >= ?2 AND created_at <= ?3)
            "#,
            params![user_id, since, now],
            |row| {
                Ok(UserActivity {
                    views: row.get(0)?,
                    ratings: row.get(1)?,
                    comments: row.get(2)?,
                })
            },
        )?;

        Ok(activity)
    }

    /// How often a user viewed each genre, all time.
    pub fn get_user_genre_views(&self, user_id: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT b.genre, COUNT(*) as cnt
            FROM view_events v
            JOIN books b ON v.book_id = b.id
            WHERE v.user_id = ?1
            GROUP BY b.genre
            "#,
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Books the user has viewed or rated under their own id.
    pub fn get_user_seen_books(&self, user_id: &str) -> Result<HashSet<String>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT book_id FROM view_events WHERE user_id = ?1
            UNION
            SELECT book_id FROM ratings WHERE user_id = ?1
            "#,
        )?;

        let seen = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;

        Ok(seen)
    }

    /// Books in any of `genres` that have at least one rating.
    pub fn get_rated_books_in_genres(&self, genres: &[String]) -> Result<Vec<Book>> {
        if genres.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection()?;
        let placeholders = vec!["?"; genres.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id, title, author, genre, language, word_count, character_count,
                   status, visibility, owner_id, created_at, view_count,
                   average_rating, rating_count
            FROM books
            WHERE rating_count > 0 AND genre IN ({})
            "#,
            placeholders
        ))?;

        let books = stmt
            .query_map(params_from_iter(genres.iter()), Database::row_to_book)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(books)
    }

    /// Sitewide totals; `active_users` counts viewers in `[since, now]`.
    pub fn get_platform_totals(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PlatformTotals> {
        let conn = self.connection()?;

        let totals = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books),
                (SELECT COUNT(DISTINCT user_id) FROM view_events WHERE user_id IS NOT NULL),
                (SELECT COUNT(*) FROM view_events),
                (SELECT COUNT(*) FROM ratings),
                (SELECT COUNT(*) FROM comments WHERE is_deleted = 0),
                (SELECT COUNT(DISTINCT user_id) FROM view_events
                    WHERE user_id IS NOT NULL AND viewed_at >= ?1 AND viewed_at <= ?2),
                (SELECT AVG(rating) FROM ratings)
            "#,
            params![to_db_timestamp(since), to_db_timestamp(now)],
            |row| {
                let mean: Option<f64> = row.get(6)?;
                Ok(PlatformTotals {
                    total_books: row.get(0)?,
                    total_users: row.get(1)?,
                    total_views: row.get(2)?,
                    total_ratings: row.get(3)?,
                    total_comments: row.get(4)?,
                    active_users: row.get(5)?,
                    average_rating: mean.map(round2).unwrap_or(0.0),
                })
            },
        )?;

        Ok(totals)
    }

    /// Per-genre (genre, book_count, view_count), all time.
    pub fn get_genre_totals(&self) -> Result<Vec<(String, i64, i64)>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT b.genre, COUNT(DISTINCT b.id) as books, COUNT(v.id) as views
            FROM books b
            LEFT JOIN view_events v ON v.book_id = b.id
            GROUP BY b.genre
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

fn book_totals(conn: &Connection, book_id: &str) -> Result<Option<BookTotals>> {
    let totals = conn
        .query_row(
            r#"
            SELECT
                b.title,
                (SELECT COUNT(*) FROM view_events WHERE book_id = b.id),
                (SELECT COUNT(DISTINCT user_id) FROM view_events
                    WHERE book_id = b.id AND user_id IS NOT NULL),
                (SELECT COUNT(*) FROM comments WHERE book_id = b.id AND is_deleted = 0),
                (SELECT COUNT(*) FROM ratings WHERE book_id = b.id),
                (SELECT AVG(rating) FROM ratings WHERE book_id = b.id)
            FROM books b
            WHERE b.id = ?1
            "#,
            [book_id],
            |row| {
                let mean: Option<f64> = row.get(5)?;
                Ok(BookTotals {
                    title: row.get(0)?,
                    total_views: row.get(1)?,
                    unique_viewers: row.get(2)?,
                    total_comments: row.get(3)?,
                    total_ratings: row.get(4)?,
                    average_rating: mean.map(round2).unwrap_or(0.0),
                })
            },
        )
        .optional()?;

    Ok(totals)
}

/// Views per date in `[since, now]`. The date is the first ten characters
/// of the stored timestamp.
fn daily_views(
    conn: &Connection,
    book_id: &str,
    since: &str,
    now: &str,
) -> Result<Vec<(NaiveDate, i64)>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT substr(viewed_at, 1, 10) as day, COUNT(*) as cnt
        FROM view_events
        WHERE book_id = ?1 AND viewed_at >= ?2 AND viewed_at <= ?3
        GROUP BY day
        ORDER BY day
        "#,
    )?;

    let rows = stmt.query_map(params![book_id, since, now], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut days = Vec::new();
    for row in rows {
        let (day, count) = row?;
        match NaiveDate::parse_from_str(&day, "%Y-%m-%d") {
            Ok(date) => days.push((date, count)),
            Err(e) => tracing::warn!(day = %day, error = %e, "Skipping unparseable view date"),
        }
    }

    Ok(days)
}

/// Views per hour of day in `[since, now]`, read from characters 12-13 of
/// the stored timestamp.
fn hourly_views(conn: &Connection, book_id: &str, since: &str, now: &str) -> Result<[i64; 24]> {
    let mut distribution = [0i64; 24];

    let mut stmt = conn.prepare(
        r#"
        SELECT CAST(substr(viewed_at, 12, 2) AS INTEGER) as hour, COUNT(*) as cnt
        FROM view_events
        WHERE book_id = ?1 AND viewed_at >= ?2 AND viewed_at <= ?3
        GROUP BY hour
        "#,
    )?;

    let rows = stmt.query_map(params![book_id, since, now], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    for row in rows {
        let (hour, count) = row?;
        if (0..24).contains(&hour) {
            distribution[hour as usize] = count;
        }
    }

    Ok(distribution)
}
