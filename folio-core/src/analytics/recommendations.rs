//! Personalized recommendations from genre affinity.
//!
//! A user's affinity is the handful of genres they view most. Candidates are
//! rated books in those genres the user has neither viewed nor rated, best
//! rated first.
//!
//! Users with no view history get no recommendations. There is deliberately
//! no fallback to the global popularity list.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::types::Book;

/// A genre and how many times the user viewed books in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreAffinity {
    pub genre: String,
    pub views: i64,
}

/// The user's `n` most viewed genres, ties broken by genre name.
pub fn top_genres(genre_views: Vec<(String, i64)>, n: usize) -> Vec<GenreAffinity> {
    let mut affinity: Vec<GenreAffinity> = genre_views
        .into_iter()
        .filter(|(_, views)| *views > 0)
        .map(|(genre, views)| GenreAffinity { genre, views })
        .collect();

    affinity.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.genre.cmp(&b.genre)));
    affinity.truncate(n);
    affinity
}

/// Drop books the user has seen, keep rated ones, rank by average rating,
/// then rating count, then book id.
pub fn select_candidates(
    candidates: Vec<Book>,
    seen: &HashSet<String>,
    count: usize,
) -> Vec<Book> {
    let mut picks: Vec<Book> = candidates
        .into_iter()
        .filter(|book| book.rating_count > 0 && !seen.contains(&book.id))
        .collect();

    picks.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| a.id.cmp(&b.id))
    });
    picks.truncate(count);
    picks
}

/// Recommend up to `count` unseen books in the user's favourite genres.
pub fn recommend_books(
    db: &Database,
    user_id: &str,
    count: usize,
    affinity_genres: usize,
) -> Result<Vec<Book>> {
    let affinity = top_genres(db.get_user_genre_views(user_id)?, affinity_genres);
    if affinity.is_empty() {
        tracing::debug!(user_id, "No view history, nothing to recommend");
        return Ok(Vec::new());
    }

    let genres: Vec<String> = affinity.into_iter().map(|a| a.genre).collect();
    let seen = db.get_user_seen_books(user_id)?;
    let candidates = db.get_rated_books_in_genres(&genres)?;

    let picks = select_candidates(candidates, &seen, count);
    tracing::debug!(
        user_id,
        genres = ?genres,
        excluded = seen.len(),
        recommended = picks.len(),
        "Selected recommendations"
    );
    Ok(picks)
}
