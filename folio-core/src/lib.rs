//! # folio-core
//!
//! Core library for Folio - view tracking, ratings and reading analytics for
//! a self-publishing platform.
//!
//! This library provides:
//! - Domain types for books, views, ratings and comments
//! - Database storage layer with SQLite
//! - Analytics: book statistics, popularity, trending genres, engagement,
//!   recommendations and platform totals
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Data model
//!
//! View events, ratings and comments are the source of truth. The counters
//! on each book (`view_count`, `average_rating`, `rating_count`) are a
//! materialized cache maintained by the write paths and repairable with
//! [`Database::recompute_book_counters`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use folio_core::analytics::AnalyticsEngine;
//! use folio_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open_with_config(&Config::database_path(), &config.database)
//!     .expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let engine = AnalyticsEngine::new(&db, config.analytics.clone());
//! let trending = engine.trending_genres(5).expect("failed to compute trends");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
