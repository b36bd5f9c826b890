//! Popularity ranking.
//!
//! Each signal is normalized against its own cap before blending, so one
//! viral signal saturates instead of dominating the score:
//!
//! | Signal | Cap | Weight |
//! |--------|-----|--------|
//! | Views in the stats window | 100 | 0.4 |
//! | Rating count | 50 | 0.3 |
//! | Average rating (out of 5) | - | 0.2 |
//! | Live comment count | 20 | 0.1 |

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{BookSignals, Database};
use crate::error::Result;

const VIEW_CAP: f64 = 100.0;
const RATING_COUNT_CAP: f64 = 50.0;
const COMMENT_CAP: f64 = 20.0;
const MAX_AVERAGE_RATING: f64 = 5.0;

const VIEW_WEIGHT: f64 = 0.4;
const RATING_COUNT_WEIGHT: f64 = 0.3;
const AVERAGE_RATING_WEIGHT: f64 = 0.2;
const COMMENT_WEIGHT: f64 = 0.1;

/// Raw per-book counters that feed the popularity score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PopularitySignals {
    pub recent_views: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub comment_count: i64,
}

impl PopularitySignals {
    /// Weighted blend of the capped signals, in `[0.0, 1.0]`.
    pub fn score(&self) -> f64 {
        let normalized_views = (self.recent_views as f64 / VIEW_CAP).min(1.0);
        let normalized_ratings = (self.total_ratings as f64 / RATING_COUNT_CAP).min(1.0);
        let normalized_avg_rating = self.average_rating / MAX_AVERAGE_RATING;
        let normalized_comments = (self.comment_count as f64 / COMMENT_CAP).min(1.0);

        VIEW_WEIGHT * normalized_views
            + RATING_COUNT_WEIGHT * normalized_ratings
            + AVERAGE_RATING_WEIGHT * normalized_avg_rating
            + COMMENT_WEIGHT * normalized_comments
    }
}

/// A ranked entry in the popular books list.
#[derive(Debug, Clone, Serialize)]
pub struct PopularBook {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub recent_views: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub comment_count: i64,
    pub score: f64,
}

impl From<BookSignals> for PopularBook {
    fn from(signals: BookSignals) -> Self {
        let book = signals.book;
        let score = PopularitySignals {
            recent_views: signals.recent_views,
            total_ratings: book.rating_count,
            average_rating: book.average_rating,
            comment_count: signals.comment_count,
        }
        .score();

        Self {
            book_id: book.id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            recent_views: signals.recent_views,
            total_ratings: book.rating_count,
            average_rating: book.average_rating,
            comment_count: signals.comment_count,
            score,
        }
    }
}

/// Order by score descending with book id as the deterministic tie-break.
pub fn rank_popular(mut books: Vec<PopularBook>, top_n: usize) -> Vec<PopularBook> {
    books.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.book_id.cmp(&b.book_id),
        other => other,
    });
    books.truncate(top_n);
    books
}

/// Score every book as of `now` and return the `top_n` most popular.
pub fn popular_books(
    db: &Database,
    top_n: usize,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<PopularBook>> {
    let signals = db.get_book_signals(now - window, now)?;
    let scored: Vec<PopularBook> = signals.into_iter().map(PopularBook::from).collect();

    tracing::debug!(books = scored.len(), top_n, "Ranking popular books");
    Ok(rank_popular(scored, top_n))
}
