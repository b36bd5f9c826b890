//! folio-analytics - CLI for book view tracking, ratings and analytics
//!
//! Records reader activity and prints the analytics the platform exposes:
//! per-book statistics, popular books, trending genres, user engagement,
//! recommendations and sitewide totals.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/folio/folio.db (~/.local/share/folio/folio.db)
//! - Config: $XDG_CONFIG_HOME/folio/config.toml (~/.config/folio/config.toml)
//! - Logs: $XDG_STATE_HOME/folio/folio.log

mod render;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use folio_core::analytics::{AnalyticsEngine, MAX_POPULAR, MAX_RECOMMENDATIONS, MAX_TRENDING};
use folio_core::types::{NewBook, NewComment, NewRating, MAX_RATING, MIN_RATING};
use folio_core::{Config, Database};

#[derive(Parser)]
#[command(name = "folio-analytics")]
#[command(about = "Track reader activity and report book analytics")]
#[command(version)]
struct Args {
    /// Database file (default: $XDG_DATA_HOME/folio/folio.db)
    #[arg(long, global = true, env = "FOLIO_DB")]
    db: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a published book
    AddBook {
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        genre: String,
        /// Owning user
        #[arg(long, default_value = "admin")]
        owner: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value_t = 0)]
        word_count: i64,
    },

    /// Record a book view
    View {
        book_id: String,
        /// Viewing user; omit for an anonymous reader
        #[arg(short, long)]
        user: Option<String>,
        /// Seconds spent reading
        #[arg(long, default_value_t = 0)]
        duration: i64,
    },

    /// Rate a book
    Rate {
        book_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(MIN_RATING as i64..=MAX_RATING as i64))]
        rating: u8,
        /// Rating user
        #[arg(short, long, required_unless_present = "anonymous_name")]
        user: Option<String>,
        /// Post anonymously under this display name
        #[arg(long, conflicts_with = "user")]
        anonymous_name: Option<String>,
        #[arg(long)]
        review: Option<String>,
    },

    /// Delete a rating
    Unrate { rating_id: i64 },

    /// Comment on a book
    Comment {
        book_id: String,
        content: String,
        #[arg(short, long)]
        user: Option<String>,
        /// Comment being replied to
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Show statistics for one book
    Stats { book_id: String },

    /// List the most popular books
    Popular {
        #[arg(short = 'n', long, default_value_t = 10,
              value_parser = clap::value_parser!(u64).range(1..=MAX_POPULAR as u64))]
        top: u64,
    },

    /// List genres with the strongest view growth
    Trending {
        #[arg(short = 'n', long, default_value_t = 10,
              value_parser = clap::value_parser!(u64).range(1..=MAX_TRENDING as u64))]
        top: u64,
    },

    /// Show a user's engagement level
    Engagement { user_id: String },

    /// Recommend books for a user
    Recommend {
        user_id: String,
        #[arg(short = 'n', long, default_value_t = 5,
              value_parser = clap::value_parser!(u64).range(1..=MAX_RECOMMENDATIONS as u64))]
        count: u64,
    },

    /// Show platform-wide totals
    Platform,

    /// Rebuild denormalized book counters from the event tables
    Recompute {
        /// Book to repair; all books when omitted
        book_id: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        folio_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = args.db.clone().unwrap_or_else(Config::database_path);
    let db = Database::open_with_config(&db_path, &config.database)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    db.migrate().context("failed to run database migrations")?;
    tracing::debug!(db = %db_path.display(), "Database ready");

    let engine = AnalyticsEngine::new(&db, config.analytics.clone());
    run(args.command, args.format, &db, &engine)
}

fn run(
    command: Command,
    format: OutputFormat,
    db: &Database,
    engine: &AnalyticsEngine,
) -> Result<()> {
    match command {
        Command::AddBook {
            title,
            author,
            genre,
            owner,
            language,
            word_count,
        } => {
            let mut new_book = NewBook::published(&title, &author, &genre, &owner);
            new_book.language = language;
            new_book.word_count = word_count;
            let book = db.insert_book(&new_book, Utc::now()).context("failed to add book")?;
            render::book(format, &book)
        }

        Command::View {
            book_id,
            user,
            duration,
        } => {
            let outcome = engine
                .record_view_with_duration(&book_id, user.as_deref(), duration)
                .with_context(|| format!("failed to record view of {}", book_id))?;
            render::view(format, &book_id, outcome)
        }

        Command::Rate {
            book_id,
            rating,
            user,
            anonymous_name,
            review,
        } => {
            let mut new_rating = match (user, anonymous_name) {
                (Some(user), _) => NewRating::by_user(&book_id, &user, rating),
                (None, Some(name)) => NewRating::anonymous(&book_id, &name, rating),
                (None, None) => bail!("either --user or --anonymous-name is required"),
            };
            new_rating.review = review;
            let stored = db
                .create_rating(&new_rating, Utc::now())
                .context("failed to rate book")?;
            render::rating(format, &stored)
        }

        Command::Unrate { rating_id } => {
            db.delete_rating(rating_id)
                .with_context(|| format!("failed to delete rating {}", rating_id))?;
            render::message(format, &format!("Deleted rating {}", rating_id))
        }

        Command::Comment {
            book_id,
            content,
            user,
            parent,
        } => {
            let comment = db
                .insert_comment(
                    &NewComment {
                        book_id,
                        user_id: user,
                        parent_comment_id: parent,
                        content,
                    },
                    Utc::now(),
                )
                .context("failed to add comment")?;
            render::comment(format, &comment)
        }

        Command::Stats { book_id } => {
            let stats = engine.book_stats(&book_id)?;
            render::book_stats(format, &stats, engine.config().stats_window_days)
        }

        Command::Popular { top } => {
            let books = engine.popular_books(top as usize)?;
            render::popular(format, &books)
        }

        Command::Trending { top } => {
            let genres = engine.trending_genres(top as usize)?;
            render::trending(format, &genres)
        }

        Command::Engagement { user_id } => {
            let engagement = engine.engagement(&user_id)?;
            render::engagement(format, &engagement)
        }

        Command::Recommend { user_id, count } => {
            let books = engine.recommendations(&user_id, count as usize)?;
            render::recommendations(format, &user_id, &books)
        }

        Command::Platform => {
            let stats = engine.platform_analytics()?;
            render::platform(format, &stats, engine.config().engagement_window_days)
        }

        Command::Recompute { book_id } => {
            let ids = match book_id {
                Some(id) => vec![id],
                None => db.list_books()?.into_iter().map(|b| b.id).collect(),
            };
            let mut repaired = Vec::with_capacity(ids.len());
            for id in &ids {
                repaired.push(
                    db.recompute_book_counters(id)
                        .with_context(|| format!("failed to recompute counters for {}", id))?,
                );
            }
            render::recomputed(format, &repaired)
        }
    }
}
