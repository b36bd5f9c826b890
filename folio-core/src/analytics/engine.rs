//! Analytics engine facade.
//!
//! Binds a [`Database`] to the configured analytics windows and exposes one
//! method per analytics operation. Every time-dependent method captures a
//! single UTC `now` at the start of the call and derives all of its windows
//! from it; the `*_at` variants take `now` explicitly for backfills and tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use folio_core::analytics::AnalyticsEngine;
//! use folio_core::config::AnalyticsConfig;
//! use folio_core::Database;
//!
//! let db = Database::open_in_memory()?;
//! db.migrate()?;
//! let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());
//!
//! for book in engine.popular_books(10)? {
//!     println!("{:.3} {}", book.score, book.title);
//! }
//! # Ok::<(), folio_core::Error>(())
//! ```

use chrono::{DateTime, Utc};

use crate::config::AnalyticsConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{Book, ViewOutcome};

use super::book_stats::{compute_book_stats, BookStats};
use super::engagement::{user_engagement, Engagement};
use super::platform::{platform_stats, PlatformStats};
use super::popularity::{popular_books, PopularBook};
use super::recommendations::recommend_books;
use super::trending::{trending_genres, TrendingGenre};

/// Analytics operations over one database.
pub struct AnalyticsEngine<'a> {
    db: &'a Database,
    config: AnalyticsConfig,
}

impl<'a> AnalyticsEngine<'a> {
    pub fn new(db: &'a Database, config: AnalyticsConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    // ============================================
    // Writes
    // ============================================

    /// Record a view, suppressing repeats by the same user inside the
    /// dedup window.
    pub fn record_view(&self, book_id: &str, user_id: Option<&str>) -> Result<ViewOutcome> {
        self.record_view_at(book_id, user_id, 0, Utc::now())
    }

    /// Record a view with the reading duration reported by the client.
    pub fn record_view_with_duration(
        &self,
        book_id: &str,
        user_id: Option<&str>,
        reading_duration_secs: i64,
    ) -> Result<ViewOutcome> {
        self.record_view_at(book_id, user_id, reading_duration_secs, Utc::now())
    }

    pub fn record_view_at(
        &self,
        book_id: &str,
        user_id: Option<&str>,
        reading_duration_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<ViewOutcome> {
        self.db.record_view(
            book_id,
            user_id,
            reading_duration_secs,
            now,
            self.config.dedup_window(),
        )
    }

    // ============================================
    // Reads
    // ============================================

    /// Per-book statistics. Fails with `BookNotFound` for unknown ids.
    pub fn book_stats(&self, book_id: &str) -> Result<BookStats> {
        self.book_stats_at(book_id, Utc::now())
    }

    pub fn book_stats_at(&self, book_id: &str, now: DateTime<Utc>) -> Result<BookStats> {
        compute_book_stats(self.db, book_id, now, self.config.stats_window())
    }

    /// The `top_n` highest scoring books.
    pub fn popular_books(&self, top_n: usize) -> Result<Vec<PopularBook>> {
        self.popular_books_at(top_n, Utc::now())
    }

    pub fn popular_books_at(&self, top_n: usize, now: DateTime<Utc>) -> Result<Vec<PopularBook>> {
        popular_books(self.db, top_n, now, self.config.stats_window())
    }

    /// The `top_n` genres with the strongest view growth.
    pub fn trending_genres(&self, top_n: usize) -> Result<Vec<TrendingGenre>> {
        self.trending_genres_at(top_n, Utc::now())
    }

    pub fn trending_genres_at(
        &self,
        top_n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingGenre>> {
        trending_genres(self.db, top_n, now, self.config.trending_window())
    }

    /// A user's recent activity score and level.
    pub fn engagement(&self, user_id: &str) -> Result<Engagement> {
        self.engagement_at(user_id, Utc::now())
    }

    pub fn engagement_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<Engagement> {
        user_engagement(self.db, user_id, now, self.config.engagement_window())
    }

    /// Up to `count` unseen, rated books in the user's favourite genres.
    ///
    /// Depends only on history, so there is no `_at` variant.
    pub fn recommendations(&self, user_id: &str, count: usize) -> Result<Vec<Book>> {
        recommend_books(self.db, user_id, count, self.config.affinity_genres)
    }

    /// Sitewide totals.
    pub fn platform_analytics(&self) -> Result<PlatformStats> {
        self.platform_analytics_at(Utc::now())
    }

    pub fn platform_analytics_at(&self, now: DateTime<Utc>) -> Result<PlatformStats> {
        platform_stats(self.db, now, self.config.engagement_window())
    }
}
