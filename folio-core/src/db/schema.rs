//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Books and interaction events
    r#"
    -- ============================================
    -- Aggregate root
    -- ============================================

    CREATE TABLE IF NOT EXISTS books (
        id               TEXT PRIMARY KEY,
        title            TEXT NOT NULL,
        author           TEXT NOT NULL,
        genre            TEXT NOT NULL,
        language         TEXT NOT NULL,
        word_count       INTEGER NOT NULL DEFAULT 0,
        character_count  INTEGER NOT NULL DEFAULT 0,
        status           TEXT NOT NULL,      -- 'draft', 'in_review', 'published', 'archived'
        visibility       TEXT NOT NULL,      -- 'public', 'private'
        owner_id         TEXT NOT NULL,
        created_at       DATETIME NOT NULL,

        -- Denormalized counters (materialized from the tables below)
        view_count       INTEGER NOT NULL DEFAULT 0,
        average_rating   REAL NOT NULL DEFAULT 0,
        rating_count     INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_books_genre ON books(genre);

    -- ============================================
    -- Append-only events
    -- ============================================

    CREATE TABLE IF NOT EXISTS view_events (
        id                    INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id               TEXT NOT NULL REFERENCES books(id),
        user_id               TEXT,          -- NULL for anonymous readers
        viewed_at             DATETIME NOT NULL,
        reading_duration_secs INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_view_events_book_ts ON view_events(book_id, viewed_at);
    CREATE INDEX IF NOT EXISTS idx_view_events_user_ts ON view_events(user_id, viewed_at);
    CREATE INDEX IF NOT EXISTS idx_view_events_ts ON view_events(viewed_at);
    CREATE INDEX IF NOT EXISTS idx_view_events_dedup
        ON view_events(book_id, user_id, viewed_at DESC);

    CREATE TABLE IF NOT EXISTS ratings (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id            TEXT NOT NULL REFERENCES books(id),
        user_id            TEXT,
        is_anonymous       INTEGER NOT NULL DEFAULT 0,
        anonymous_username TEXT,
        rating             INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        review             TEXT,
        created_at         DATETIME NOT NULL,
        updated_at         DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ratings_book ON ratings(book_id);
    CREATE INDEX IF NOT EXISTS idx_ratings_user_ts ON ratings(user_id, created_at);

    -- One named rating per reader per book; anonymous ratings are unconstrained
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ratings_one_per_user
        ON ratings(book_id, user_id)
        WHERE is_anonymous = 0 AND user_id IS NOT NULL;

    CREATE TABLE IF NOT EXISTS comments (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id           TEXT NOT NULL REFERENCES books(id),
        user_id           TEXT,
        parent_comment_id INTEGER REFERENCES comments(id),
        content           TEXT NOT NULL,
        is_deleted        INTEGER NOT NULL DEFAULT 0,
        created_at        DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_comments_book ON comments(book_id);
    CREATE INDEX IF NOT EXISTS idx_comments_user_ts ON comments(user_id, created_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
