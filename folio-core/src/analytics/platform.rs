//! Sitewide analytics for the admin view.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::Result;

/// Number of genres listed in the platform summary
pub const TOP_GENRE_COUNT: usize = 10;

/// A genre's share of the catalogue and of all views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreSummary {
    pub genre: String,
    pub book_count: i64,
    pub view_count: i64,
}

/// Sitewide totals.
///
/// `total_users` counts distinct user ids that ever appear in view events,
/// so registered users who never opened a book are not included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    pub total_books: i64,
    pub total_users: i64,
    pub total_views: i64,
    pub total_ratings: i64,
    pub total_comments: i64,
    pub active_users_last_30_days: i64,
    pub average_rating_across_platform: f64,
    pub top_genres: Vec<GenreSummary>,
}

/// Rank genres by views, then by name.
pub fn rank_genres(rows: Vec<(String, i64, i64)>, n: usize) -> Vec<GenreSummary> {
    let mut genres: Vec<GenreSummary> = rows
        .into_iter()
        .map(|(genre, book_count, view_count)| GenreSummary {
            genre,
            book_count,
            view_count,
        })
        .collect();

    genres.sort_by(|a, b| {
        b.view_count
            .cmp(&a.view_count)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    genres.truncate(n);
    genres
}

/// Roll up sitewide totals as of `now`.
pub fn platform_stats(
    db: &Database,
    now: DateTime<Utc>,
    active_window: Duration,
) -> Result<PlatformStats> {
    let totals = db.get_platform_totals(now - active_window, now)?;
    let top_genres = rank_genres(db.get_genre_totals()?, TOP_GENRE_COUNT);

    Ok(PlatformStats {
        total_books: totals.total_books,
        total_users: totals.total_users,
        total_views: totals.total_views,
        total_ratings: totals.total_ratings,
        total_comments: totals.total_comments,
        active_users_last_30_days: totals.active_users,
        average_rating_across_platform: totals.average_rating,
        top_genres,
    })
}
