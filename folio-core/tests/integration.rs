//! Integration tests for folio view tracking and analytics
//!
//! These tests drive the public API end to end against in-memory and
//! on-disk databases, with fixed timestamps so every window is exact.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use folio_core::analytics::{AnalyticsEngine, EngagementLevel};
use folio_core::config::AnalyticsConfig;
use folio_core::types::{round2, NewBook, NewComment, NewRating, ViewOutcome};
use folio_core::{Database, Error};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap()
}

fn memory_db() -> Database {
    folio_core::logging::init_test();
    let db = Database::open_in_memory().expect("open in-memory database");
    db.migrate().expect("migrate");
    db
}

fn add_book(db: &Database, title: &str, genre: &str) -> String {
    db.insert_book(
        &NewBook::published(title, "Some Author", genre, "owner"),
        now() - Duration::days(90),
    )
    .expect("insert book")
    .id
}

fn anonymous_views(engine: &AnalyticsEngine, book_id: &str, count: usize, at: DateTime<Utc>) {
    for _ in 0..count {
        engine
            .record_view_at(book_id, None, 0, at)
            .expect("record anonymous view");
    }
}

fn comment(db: &Database, book_id: &str, user_id: &str) -> i64 {
    db.insert_comment(
        &NewComment {
            book_id: book_id.to_string(),
            user_id: Some(user_id.to_string()),
            parent_comment_id: None,
            content: "Loved the ending".to_string(),
        },
        now() - Duration::days(1),
    )
    .expect("insert comment")
    .id
}

// ============================================
// View de-duplication
// ============================================

#[test]
fn test_repeat_views_within_hour_count_once() {
    let db = memory_db();
    let book = add_book(&db, "The Hollow", "Mystery");
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    let mut recorded = 0;
    for minute in 0..30 {
        let at = now() + Duration::minutes(minute * 2);
        if engine.record_view_at(&book, Some("alice"), 45, at).unwrap() == ViewOutcome::Recorded {
            recorded += 1;
        }
    }

    assert_eq!(recorded, 1);
    assert_eq!(db.get_book(&book).unwrap().unwrap().view_count, 1);
    assert_eq!(db.list_book_views(&book).unwrap()[0].reading_duration_secs, 45);
}

#[test]
fn test_concurrent_views_on_shared_handle_count_once() {
    let db = Arc::new(memory_db());
    let book = add_book(&db, "The Hollow", "Mystery");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            let book = book.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    db.record_view(&book, Some("alice"), 0, now(), Duration::hours(1))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.get_book(&book).unwrap().unwrap().view_count, 1);
    assert_eq!(db.list_book_views(&book).unwrap().len(), 1);
}

#[test]
fn test_concurrent_views_on_separate_handles_count_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("folio.db");

    let setup = Database::open(&path).unwrap();
    setup.migrate().unwrap();
    let book = add_book(&setup, "The Hollow", "Mystery");
    drop(setup);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            let book = book.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let mut recorded = 0;
                for _ in 0..5 {
                    if db
                        .record_view(&book, Some("alice"), 0, now(), Duration::hours(1))
                        .unwrap()
                        == ViewOutcome::Recorded
                    {
                        recorded += 1;
                    }
                }
                recorded
            })
        })
        .collect();
    let recorded: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let db = Database::open(&path).unwrap();
    assert_eq!(recorded, 1);
    assert_eq!(db.get_book(&book).unwrap().unwrap().view_count, 1);
}

// ============================================
// Rating counters
// ============================================

#[test]
fn test_rating_counters_match_rows_after_mixed_writes() {
    let db = memory_db();
    let book = add_book(&db, "Night Garden", "Fantasy");
    let t = now();

    let a = db.create_rating(&NewRating::by_user(&book, "alice", 2), t).unwrap();
    let b = db.create_rating(&NewRating::by_user(&book, "bob", 5), t).unwrap();
    db.create_rating(&NewRating::anonymous(&book, "reader7", 3), t).unwrap();
    db.create_rating(&NewRating::anonymous(&book, "reader7", 4), t).unwrap();
    db.update_rating(a.id, 4, None, t).unwrap();
    db.delete_rating(b.id).unwrap();
    db.create_rating(&NewRating::by_user(&book, "bob", 1), t).unwrap();

    let ratings = db.list_book_ratings(&book).unwrap();
    let expected_avg =
        round2(ratings.iter().map(|r| r.rating as f64).sum::<f64>() / ratings.len() as f64);

    let stored = db.get_book(&book).unwrap().unwrap();
    assert_eq!(stored.rating_count, ratings.len() as i64);
    assert_eq!(stored.rating_count, 4);
    assert_eq!(stored.average_rating, expected_avg);
    assert_eq!(stored.average_rating, 3.0);

    // Recompute is a no-op when the cache is already consistent
    assert_eq!(db.recompute_book_counters(&book).unwrap(), stored);
}

#[test]
fn test_duplicate_named_rating_rejected() {
    let db = memory_db();
    let book = add_book(&db, "Night Garden", "Fantasy");

    db.create_rating(&NewRating::by_user(&book, "alice", 4), now()).unwrap();
    let err = db
        .create_rating(&NewRating::by_user(&book, "alice", 1), now())
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRating { .. }));
    assert_eq!(db.get_book(&book).unwrap().unwrap().average_rating, 4.0);
}

#[test]
fn test_concurrent_ratings_on_separate_handles_keep_counters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("folio.db");

    let setup = Database::open(&path).unwrap();
    setup.migrate().unwrap();
    let book = add_book(&setup, "Night Garden", "Fantasy");
    drop(setup);

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let path = path.clone();
            let book = book.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                for i in 0..5u8 {
                    let user = format!("reader{t}-{i}");
                    let value = (t + i) % 5 + 1;
                    db.create_rating(&NewRating::by_user(&book, &user, value), now())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let ratings = db.list_book_ratings(&book).unwrap();
    let expected_avg =
        round2(ratings.iter().map(|r| r.rating as f64).sum::<f64>() / ratings.len() as f64);

    let stored = db.get_book(&book).unwrap().unwrap();
    assert_eq!(ratings.len(), 40);
    assert_eq!(stored.rating_count, ratings.len() as i64);
    assert_eq!(stored.average_rating, expected_avg);
}

// ============================================
// Book statistics
// ============================================

#[test]
fn test_book_stats_totals_and_histograms() {
    let db = memory_db();
    let book = add_book(&db, "The Hollow", "Mystery");
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    let day1 = Utc.with_ymd_and_hms(2024, 6, 28, 14, 10, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 6, 29, 9, 30, 0).unwrap();

    engine.record_view_at(&book, Some("alice"), 0, day1).unwrap();
    engine.record_view_at(&book, Some("bob"), 0, day1).unwrap();
    engine.record_view_at(&book, None, 0, day1).unwrap();
    engine.record_view_at(&book, Some("alice"), 0, day2).unwrap();
    // Outside the 30 day window: counted in totals, not in histograms
    engine
        .record_view_at(&book, Some("carol"), 0, now() - Duration::days(45))
        .unwrap();

    db.create_rating(&NewRating::by_user(&book, "alice", 5), now()).unwrap();
    db.create_rating(&NewRating::by_user(&book, "bob", 4), now()).unwrap();
    comment(&db, &book, "alice");
    let deleted = comment(&db, &book, "bob");
    db.soft_delete_comment(deleted).unwrap();

    let stats = engine.book_stats_at(&book, now()).unwrap();
    assert_eq!(stats.total_views, 5);
    assert_eq!(stats.unique_viewers, 3);
    assert_eq!(stats.total_comments, 1);
    assert_eq!(stats.total_ratings, 2);
    assert_eq!(stats.average_rating, 4.5);

    let days: Vec<(NaiveDate, i64)> = stats.daily_views.iter().map(|d| (d.date, d.views)).collect();
    assert_eq!(
        days,
        vec![
            (NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(), 3),
            (NaiveDate::from_ymd_opt(2024, 6, 29).unwrap(), 1),
        ]
    );

    let hours: Vec<(u8, i64)> = stats.peak_hours.iter().map(|h| (h.hour, h.views)).collect();
    assert_eq!(hours, vec![(14, 3), (9, 1)]);
}

#[test]
fn test_book_stats_missing_book() {
    let db = memory_db();
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());
    assert!(matches!(
        engine.book_stats_at("no-such-book", now()),
        Err(Error::BookNotFound(_))
    ));
}

#[test]
fn test_daily_and_hourly_buckets_use_stored_microseconds() {
    let db = memory_db();
    let book = add_book(&db, "The Hollow", "Mystery");
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    // One microsecond before midnight; millisecond rounding would push
    // both views into the next day and hour 0.
    let late = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap()
        + Duration::microseconds(999_999);
    anonymous_views(&engine, &book, 1, late);
    anonymous_views(&engine, &book, 1, late - Duration::days(30));

    let stats = engine.book_stats_at(&book, late).unwrap();
    let days: Vec<(NaiveDate, i64)> = stats.daily_views.iter().map(|d| (d.date, d.views)).collect();
    assert_eq!(
        days,
        vec![
            (NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), 1),
            (NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 1),
        ]
    );
    assert!(days.iter().all(|(date, _)| *date <= late.date_naive()));

    let hours: Vec<(u8, i64)> = stats.peak_hours.iter().map(|h| (h.hour, h.views)).collect();
    assert_eq!(hours, vec![(23, 2)]);
}

// ============================================
// Popularity
// ============================================

#[test]
fn test_popularity_worked_example() {
    let db = memory_db();
    let hit = add_book(&db, "The Hollow", "Mystery");
    let quiet = add_book(&db, "Quiet Pages", "Poetry");
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    anonymous_views(&engine, &hit, 120, now() - Duration::days(2));
    for i in 0..10 {
        db.create_rating(&NewRating::by_user(&hit, &format!("reader{}", i), 4), now())
            .unwrap();
    }
    for user in ["alice", "bob", "carol"] {
        comment(&db, &hit, user);
    }
    // Old views do not count toward recency
    anonymous_views(&engine, &quiet, 500, now() - Duration::days(40));

    let popular = engine.popular_books_at(10, now()).unwrap();
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0].book_id, hit);
    assert_eq!(popular[0].recent_views, 120);
    assert_eq!(popular[0].comment_count, 3);
    assert!((popular[0].score - 0.635).abs() < 1e-9);
    assert_eq!(popular[1].book_id, quiet);
    assert_eq!(popular[1].score, 0.0);

    assert_eq!(engine.popular_books_at(1, now()).unwrap().len(), 1);
}

// ============================================
// Trending
// ============================================

#[test]
fn test_trending_growth_and_exclusion() {
    let db = memory_db();
    let mystery = add_book(&db, "The Hollow", "Mystery");
    let poetry = add_book(&db, "Quiet Pages", "Poetry");
    let horror = add_book(&db, "Cellar", "Horror");
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    anonymous_views(&engine, &mystery, 60, now() - Duration::days(3));
    anonymous_views(&engine, &mystery, 40, now() - Duration::days(45));
    // Popular last period, silent now
    anonymous_views(&engine, &poetry, 200, now() - Duration::days(40));
    // New this period
    anonymous_views(&engine, &horror, 5, now() - Duration::days(1));

    let trending = engine.trending_genres_at(10, now()).unwrap();
    let genres: Vec<&str> = trending.iter().map(|t| t.genre.as_str()).collect();
    assert_eq!(genres, vec!["Horror", "Mystery"]);

    assert_eq!(trending[0].growth_pct, 100.0);
    assert_eq!(trending[1].current_views, 60);
    assert_eq!(trending[1].previous_views, 40);
    assert_eq!(trending[1].growth_pct, 50.0);
}

// ============================================
// Engagement
// ============================================

#[test]
fn test_engagement_counts_recent_activity_only() {
    let db = memory_db();
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());
    let books: Vec<String> = (0..12)
        .map(|i| add_book(&db, &format!("Book {}", i), "Mystery"))
        .collect();

    engine
        .record_view_at(&books[0], Some("alice"), 0, now() - Duration::days(60))
        .unwrap();
    for book in &books {
        engine
            .record_view_at(book, Some("alice"), 0, now() - Duration::days(2))
            .unwrap();
    }
    db.create_rating(&NewRating::by_user(&books[0], "alice", 5), now() - Duration::days(1))
        .unwrap();
    comment(&db, &books[0], "alice");
    let removed = comment(&db, &books[1], "alice");
    db.soft_delete_comment(removed).unwrap();

    let engagement = engine.engagement_at("alice", now()).unwrap();
    assert_eq!(engagement.views_last_30d, 12);
    assert_eq!(engagement.ratings_last_30d, 1);
    assert_eq!(engagement.comments_last_30d, 1);
    assert_eq!(engagement.score, 12 + 3 + 5);
    assert_eq!(engagement.level, EngagementLevel::Medium);

    let stranger = engine.engagement_at("stranger", now()).unwrap();
    assert_eq!(stranger.score, 0);
    assert_eq!(stranger.level, EngagementLevel::Inactive);
}

// ============================================
// Recommendations
// ============================================

#[test]
fn test_recommendations_exclude_seen_books() {
    let db = memory_db();
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    let read = add_book(&db, "Already Read", "Mystery");
    let rated = add_book(&db, "Already Rated", "Mystery");
    let top = add_book(&db, "Top Pick", "Mystery");
    let second = add_book(&db, "Second Pick", "Mystery");
    let unrated = add_book(&db, "Unrated", "Mystery");
    let other_genre = add_book(&db, "Elsewhere", "Romance");

    engine
        .record_view_at(&read, Some("alice"), 0, now() - Duration::days(1))
        .unwrap();
    db.create_rating(&NewRating::by_user(&read, "bob", 5), now()).unwrap();
    db.create_rating(&NewRating::by_user(&rated, "alice", 5), now()).unwrap();
    db.create_rating(&NewRating::by_user(&top, "bob", 5), now()).unwrap();
    db.create_rating(&NewRating::by_user(&second, "bob", 3), now()).unwrap();
    db.create_rating(&NewRating::by_user(&other_genre, "bob", 5), now()).unwrap();

    let picks = engine.recommendations("alice", 10).unwrap();
    let ids: Vec<&str> = picks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec![top.as_str(), second.as_str()]);
    assert!(!ids.contains(&unrated.as_str()));

    assert_eq!(engine.recommendations("alice", 1).unwrap().len(), 1);
}

#[test]
fn test_recommendations_cold_start_is_empty() {
    let db = memory_db();
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());
    let book = add_book(&db, "Top Pick", "Mystery");
    db.create_rating(&NewRating::by_user(&book, "bob", 5), now()).unwrap();

    assert!(engine.recommendations("newcomer", 5).unwrap().is_empty());
}

// ============================================
// Platform
// ============================================

#[test]
fn test_platform_totals() {
    let db = memory_db();
    let engine = AnalyticsEngine::new(&db, AnalyticsConfig::default());

    let mystery = add_book(&db, "The Hollow", "Mystery");
    let fantasy = add_book(&db, "Night Garden", "Fantasy");
    add_book(&db, "Second Garden", "Fantasy");

    engine
        .record_view_at(&mystery, Some("alice"), 0, now() - Duration::days(1))
        .unwrap();
    engine
        .record_view_at(&mystery, Some("bob"), 0, now() - Duration::days(50))
        .unwrap();
    engine
        .record_view_at(&fantasy, None, 0, now() - Duration::days(1))
        .unwrap();
    db.create_rating(&NewRating::by_user(&mystery, "alice", 5), now()).unwrap();
    db.create_rating(&NewRating::anonymous(&fantasy, "anon", 2), now()).unwrap();
    comment(&db, &fantasy, "carol");

    let stats = engine.platform_analytics_at(now()).unwrap();
    assert_eq!(stats.total_books, 3);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_views, 3);
    assert_eq!(stats.total_ratings, 2);
    assert_eq!(stats.total_comments, 1);
    assert_eq!(stats.active_users_last_30_days, 1);
    assert_eq!(stats.average_rating_across_platform, 3.5);

    let genres: Vec<(&str, i64, i64)> = stats
        .top_genres
        .iter()
        .map(|g| (g.genre.as_str(), g.book_count, g.view_count))
        .collect();
    assert_eq!(genres, vec![("Mystery", 1, 2), ("Fantasy", 2, 1)]);
}
