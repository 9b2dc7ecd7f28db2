//! SQL DDL for initializing the DevSync store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `users.github_id` UNIQUE (login upsert key)
/// - `repositories` UNIQUE on (user_id, github_id)
/// - `contributions` UNIQUE on (user_id, date, repo_id); `repo_id = 0` means unattributed
///   because SQLite treats NULLs as distinct inside UNIQUE constraints
/// - `daily_stats` UNIQUE on (user_id, date)
/// - timestamps stored as RFC3339 text, dates as `YYYY-MM-DD`
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    github_id INTEGER NOT NULL UNIQUE,
    username TEXT NOT NULL,
    email TEXT NULL,
    avatar_url TEXT NULL,
    access_token TEXT NOT NULL DEFAULT '',
    session_token TEXT NULL UNIQUE,
    last_synced_at TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    github_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    stars INTEGER NOT NULL DEFAULT 0,
    forks INTEGER NOT NULL DEFAULT 0,
    language TEXT NOT NULL DEFAULT '',
    is_private INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL,
    UNIQUE (user_id, github_id)
);

CREATE TABLE IF NOT EXISTS contributions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    count INTEGER NOT NULL,
    repo_id INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, date, repo_id)
);

CREATE TABLE IF NOT EXISTS daily_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    commits INTEGER NOT NULL DEFAULT 0,
    prs INTEGER NOT NULL DEFAULT 0,
    issues INTEGER NOT NULL DEFAULT 0,
    stars_received INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, date)
);

CREATE INDEX IF NOT EXISTS idx_repositories_user_stars ON repositories(user_id, stars DESC, forks DESC);
CREATE INDEX IF NOT EXISTS idx_contributions_user_date ON contributions(user_id, date);
CREATE INDEX IF NOT EXISTS idx_daily_stats_user_date ON daily_stats(user_id, date)
"#;
