//! User engagement classification.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{Database, UserActivity};
use crate::error::Result;

const VIEW_POINTS: i64 = 1;
const RATING_POINTS: i64 = 3;
const COMMENT_POINTS: i64 = 5;

/// Coarse engagement bucket derived from the weighted activity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EngagementLevel {
    Inactive,
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    /// Classify a weighted activity score.
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 50 => EngagementLevel::High,
            s if s >= 20 => EngagementLevel::Medium,
            s if s >= 5 => EngagementLevel::Low,
            _ => EngagementLevel::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Inactive => "Inactive",
            EngagementLevel::Low => "Low",
            EngagementLevel::Medium => "Medium",
            EngagementLevel::High => "High",
        }
    }
}

/// A user's recent activity and its classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Engagement {
    pub user_id: String,
    pub views_last_30d: i64,
    pub ratings_last_30d: i64,
    pub comments_last_30d: i64,
    pub score: i64,
    pub level: EngagementLevel,
}

/// Weighted activity score: views 1, ratings 3, comments 5.
pub fn engagement_score(activity: &UserActivity) -> i64 {
    activity.views * VIEW_POINTS
        + activity.ratings * RATING_POINTS
        + activity.comments * COMMENT_POINTS
}

impl Engagement {
    pub fn from_activity(user_id: &str, activity: UserActivity) -> Self {
        let score = engagement_score(&activity);
        Self {
            user_id: user_id.to_string(),
            views_last_30d: activity.views,
            ratings_last_30d: activity.ratings,
            comments_last_30d: activity.comments,
            score,
            level: EngagementLevel::from_score(score),
        }
    }
}

/// Score a user's activity in the window ending at `now`.
///
/// Unknown users are simply `Inactive` with zero counts.
pub fn user_engagement(
    db: &Database,
    user_id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Engagement> {
    let activity = db.get_user_activity(user_id, now - window, now)?;
    Ok(Engagement::from_activity(user_id, activity))
}
