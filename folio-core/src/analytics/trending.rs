//! Trending genre detection.
//!
//! Compares each genre's views in the current window against the window of
//! equal length immediately before it.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::Result;

/// A genre's view growth between two adjacent windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingGenre {
    pub genre: String,
    pub current_views: i64,
    pub previous_views: i64,
    /// Percentage change from the previous window
    pub growth_pct: f64,
}

impl TrendingGenre {
    /// Format growth for display (e.g., "+23.0%" or "-15.5%").
    pub fn format_growth(&self) -> String {
        if self.growth_pct >= 0.0 {
            format!("+{:.1}%", self.growth_pct)
        } else {
            format!("{:.1}%", self.growth_pct)
        }
    }
}

/// Percentage change between two window counts.
///
/// Growth from nothing is reported as 100%; nothing to nothing is 0%.
pub fn growth_pct(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        100.0 * (current - previous) as f64 / previous as f64
    } else if current > 0 {
        100.0
    } else {
        0.0
    }
}

/// Build the ranked trending list from per-genre window counts.
///
/// Genres without views in the current window are dropped, whatever their
/// history. Ordered by growth descending, then current views descending,
/// then genre name.
pub fn rank_trending(
    current: &[(String, i64)],
    previous: &[(String, i64)],
    top_n: usize,
) -> Vec<TrendingGenre> {
    let previous: HashMap<&str, i64> = previous
        .iter()
        .map(|(genre, views)| (genre.as_str(), *views))
        .collect();

    let mut genres: Vec<TrendingGenre> = current
        .iter()
        .filter(|(_, views)| *views > 0)
        .map(|(genre, views)| {
            let previous_views = previous.get(genre.as_str()).copied().unwrap_or(0);
            TrendingGenre {
                genre: genre.clone(),
                current_views: *views,
                previous_views,
                growth_pct: growth_pct(*views, previous_views),
            }
        })
        .collect();

    genres.sort_by(|a, b| match b.growth_pct.total_cmp(&a.growth_pct) {
        Ordering::Equal => b
            .current_views
            .cmp(&a.current_views)
            .then_with(|| a.genre.cmp(&b.genre)),
        other => other,
    });
    genres.truncate(top_n);
    genres
}

/// Trending genres as of `now`, each window `window` long.
pub fn trending_genres(
    db: &Database,
    top_n: usize,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<TrendingGenre>> {
    let current_start = now - window;
    let previous_start = current_start - window;

    let current = db.get_genre_views(current_start, now)?;
    let previous = db.get_genre_views(previous_start, current_start)?;

    tracing::debug!(
        current_genres = current.len(),
        previous_genres = previous.len(),
        "Comparing genre windows"
    );
    Ok(rank_trending(&current, &previous, top_n))
}
