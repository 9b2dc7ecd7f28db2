//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the sqlx-backed store used by sync and the read path

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbContribution, DbDailyStats, DbRepo, DbUser, NewUser, UserId};
pub use schema::SQLITE_INIT;
pub use sqlite::{DevsyncStorage, SqlitePool};
