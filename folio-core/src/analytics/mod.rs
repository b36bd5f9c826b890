//! Analytics over books, views, ratings and comments.
//!
//! - Per-book statistics (totals, daily views, peak hours)
//! - Popularity ranking
//! - Trending genres
//! - User engagement
//! - Genre-affinity recommendations
//! - Platform-wide totals
//!
//! Each module keeps its scoring as pure functions over plain values and a
//! thin entry point that pulls the inputs from [`Database`](crate::Database).
//! [`AnalyticsEngine`] ties them to the configured windows.

pub mod book_stats;
pub mod engagement;
pub mod engine;
pub mod platform;
pub mod popularity;
pub mod recommendations;
pub mod trending;

/// Largest `top_n` accepted for the popular books list
pub const MAX_POPULAR: usize = 50;
/// Largest `top_n` accepted for the trending genres list
pub const MAX_TRENDING: usize = 20;
/// Largest `count` accepted for recommendations
pub const MAX_RECOMMENDATIONS: usize = 20;

pub use book_stats::{BookStats, DailyViews, HourlyViews};
pub use engagement::{Engagement, EngagementLevel};
pub use engine::AnalyticsEngine;
pub use platform::{GenreSummary, PlatformStats};
pub use popularity::{PopularBook, PopularitySignals};
pub use recommendations::GenreAffinity;
pub use trending::TrendingGenre;
