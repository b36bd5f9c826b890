//! Text and JSON output for each command.

use anyhow::Result;
use folio_core::analytics::{BookStats, Engagement, PlatformStats, PopularBook, TrendingGenre};
use folio_core::types::{Book, Comment, Rating, ViewOutcome};
use serde::Serialize;
use serde_json::json;

use crate::OutputFormat;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten an id for tables
fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

pub fn message(format: OutputFormat, text: &str) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "message": text })),
        OutputFormat::Text => {
            println!("{}", text);
            Ok(())
        }
    }
}

pub fn book(format: OutputFormat, book: &Book) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(book);
    }
    println!("Added book {}", book.id);
    println!("  {} by {} ({})", book.title, book.author, book.genre);
    Ok(())
}

pub fn view(format: OutputFormat, book_id: &str, outcome: ViewOutcome) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&json!({ "book_id": book_id, "outcome": outcome }));
    }
    match outcome {
        ViewOutcome::Recorded => println!("View recorded for {}", book_id),
        ViewOutcome::Suppressed => println!("Repeat view of {} suppressed", book_id),
    }
    Ok(())
}

pub fn rating(format: OutputFormat, rating: &Rating) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(rating);
    }
    let who = rating
        .user_id
        .as_deref()
        .or(rating.anonymous_username.as_deref())
        .unwrap_or("anonymous");
    println!(
        "Rating {} saved: {} gave {} {}/5",
        rating.id, who, rating.book_id, rating.rating
    );
    Ok(())
}

pub fn comment(format: OutputFormat, comment: &Comment) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(comment);
    }
    println!("Comment {} added to {}", comment.id, comment.book_id);
    Ok(())
}

pub fn book_stats(format: OutputFormat, stats: &BookStats, window_days: u32) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(stats);
    }

    println!("Book: {} ({})", stats.title, stats.book_id);
    println!(
        "  Views:    {} ({} unique viewers)",
        stats.total_views, stats.unique_viewers
    );
    println!(
        "  Ratings:  {} (avg {:.2})",
        stats.total_ratings, stats.average_rating
    );
    println!("  Comments: {}", stats.total_comments);

    println!("\nDaily views (last {} days):", window_days);
    if stats.daily_views.is_empty() {
        println!("  (none)");
    }
    for day in &stats.daily_views {
        println!("  {}  {}", day.date, day.views);
    }

    println!("\nPeak hours (UTC):");
    if stats.peak_hours.is_empty() {
        println!("  (none)");
    }
    for hour in &stats.peak_hours {
        println!("  {:<10} {}", hour.label(), hour.views);
    }
    Ok(())
}

pub fn popular(format: OutputFormat, books: &[PopularBook]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(books);
    }
    if books.is_empty() {
        println!("No books yet.");
        return Ok(());
    }

    println!(
        "{:>3}  {:<8}  {:<30}  {:>6}  {:>7}  {:>4}  {:>8}  {:>5}",
        "#", "ID", "TITLE", "SCORE", "VIEWS", "AVG", "RATINGS", "CMTS"
    );
    for (rank, book) in books.iter().enumerate() {
        println!(
            "{:>3}  {:<8}  {:<30}  {:>6.3}  {:>7}  {:>4.2}  {:>8}  {:>5}",
            rank + 1,
            short_id(&book.book_id),
            truncate(&book.title, 30),
            book.score,
            book.recent_views,
            book.average_rating,
            book.total_ratings,
            book.comment_count
        );
    }
    Ok(())
}

pub fn trending(format: OutputFormat, genres: &[TrendingGenre]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(genres);
    }
    if genres.is_empty() {
        println!("No genre activity in the current window.");
        return Ok(());
    }

    println!(
        "{:<20}  {:>8}  {:>8}  {:>9}",
        "GENRE", "CURRENT", "PREVIOUS", "GROWTH"
    );
    for genre in genres {
        println!(
            "{:<20}  {:>8}  {:>8}  {:>9}",
            truncate(&genre.genre, 20),
            genre.current_views,
            genre.previous_views,
            genre.format_growth()
        );
    }
    Ok(())
}

pub fn engagement(format: OutputFormat, engagement: &Engagement) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(engagement);
    }
    println!("User: {}", engagement.user_id);
    println!("  Views:    {}", engagement.views_last_30d);
    println!("  Ratings:  {}", engagement.ratings_last_30d);
    println!("  Comments: {}", engagement.comments_last_30d);
    println!(
        "  Score:    {} ({})",
        engagement.score,
        engagement.level.as_str()
    );
    Ok(())
}

pub fn recommendations(format: OutputFormat, user_id: &str, books: &[Book]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(books);
    }
    if books.is_empty() {
        println!("No recommendations for {} yet.", user_id);
        return Ok(());
    }

    println!("Recommended for {}:", user_id);
    for book in books {
        println!(
            "  {:<8}  {:<30}  {:<15}  {:.2} ({} ratings)",
            short_id(&book.id),
            truncate(&book.title, 30),
            truncate(&book.genre, 15),
            book.average_rating,
            book.rating_count
        );
    }
    Ok(())
}

pub fn platform(
    format: OutputFormat,
    stats: &PlatformStats,
    active_window_days: u32,
) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(stats);
    }

    println!("Platform");
    println!("  Books:        {}", stats.total_books);
    println!("  Readers:      {}", stats.total_users);
    println!(
        "  Active ({}d): {}",
        active_window_days, stats.active_users_last_30_days
    );
    println!("  Views:        {}", stats.total_views);
    println!(
        "  Ratings:      {} (avg {:.2})",
        stats.total_ratings, stats.average_rating_across_platform
    );
    println!("  Comments:     {}", stats.total_comments);

    if !stats.top_genres.is_empty() {
        println!("\nTop genres:");
        for genre in &stats.top_genres {
            println!(
                "  {:<20}  {:>6} views  {:>4} books",
                truncate(&genre.genre, 20),
                genre.view_count,
                genre.book_count
            );
        }
    }
    Ok(())
}

pub fn recomputed(format: OutputFormat, books: &[Book]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(books);
    }
    for book in books {
        println!(
            "{}  views={}  ratings={}  avg={:.2}",
            book.id, book.view_count, book.rating_count, book.average_rating
        );
    }
    println!("Recomputed counters for {} book(s)", books.len());
    Ok(())
}

/// Truncate to `max` characters, marking the cut with "..."
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
