//! Database layer for folio
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository operations for books, views, ratings and comments
//! - Aggregation queries for the analytics engine

pub mod repo;
pub mod schema;
pub mod stats;

pub use repo::Database;
pub use stats::{BookActivity, BookSignals, BookTotals, PlatformTotals, UserActivity};
