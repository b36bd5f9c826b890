//! Per-book analytics.
//!
//! Totals are the audited figures computed from the event tables, not the
//! denormalized counters on the book row.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};

/// Number of peak hours reported per book
pub const PEAK_HOUR_COUNT: usize = 5;

/// Detailed statistics for a single book.
#[derive(Debug, Clone, Serialize)]
pub struct BookStats {
    pub book_id: String,
    pub title: String,
    /// Count of view events (audited, not the cached counter)
    pub total_views: i64,
    /// Distinct signed-in viewers; anonymous views never count here
    pub unique_viewers: i64,
    pub total_comments: i64,
    pub total_ratings: i64,
    /// Mean rating rounded half away from zero to two decimals
    pub average_rating: f64,
    /// Views per day over the stats window, ascending, days without views omitted
    pub daily_views: Vec<DailyViews>,
    /// Busiest hours of day over the stats window
    pub peak_hours: Vec<HourlyViews>,
}

/// View count for one UTC calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub views: i64,
}

/// View count for one UTC hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyViews {
    /// Hour of day (0-23)
    pub hour: u8,
    pub views: i64,
}

impl HourlyViews {
    /// Format the hour as a one-hour range for display (e.g., "2pm-3pm").
    pub fn label(&self) -> String {
        let hour = self.hour as u32;
        let next_hour = (hour + 1) % 24;

        let format_hour = |h: u32| -> String {
            match h {
                0 => "12am".to_string(),
                1..=11 => format!("{}am", h),
                12 => "12pm".to_string(),
                13..=23 => format!("{}pm", h - 12),
                _ => format!("{}h", h),
            }
        };

        format!("{}-{}", format_hour(hour), format_hour(next_hour))
    }
}

/// Pick the `n` busiest hours that had any views.
///
/// Ordered by views descending, ties by hour ascending.
pub fn peak_hours(distribution: &[i64; 24], n: usize) -> Vec<HourlyViews> {
    let mut hours: Vec<HourlyViews> = distribution
        .iter()
        .enumerate()
        .filter(|(_, &views)| views > 0)
        .map(|(hour, &views)| HourlyViews {
            hour: hour as u8,
            views,
        })
        .collect();

    hours.sort_by(|a, b| b.views.cmp(&a.views).then(a.hour.cmp(&b.hour)));
    hours.truncate(n);
    hours
}

/// Compute statistics for one book as of `now`.
///
/// Fails with [`Error::BookNotFound`] if the book does not exist.
pub fn compute_book_stats(
    db: &Database,
    book_id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<BookStats> {
    let activity = db
        .get_book_activity(book_id, now - window, now)?
        .ok_or_else(|| Error::BookNotFound(book_id.to_string()))?;
    let totals = activity.totals;

    let daily_views = activity
        .daily_views
        .into_iter()
        .map(|(date, views)| DailyViews { date, views })
        .collect();

    Ok(BookStats {
        book_id: book_id.to_string(),
        title: totals.title,
        total_views: totals.total_views,
        unique_viewers: totals.unique_viewers,
        total_comments: totals.total_comments,
        total_ratings: totals.total_ratings,
        average_rating: totals.average_rating,
        daily_views,
        peak_hours: peak_hours(&activity.hourly_views, PEAK_HOUR_COUNT),
    })
}
