use crate::db::models::{DbContribution, DbDailyStats, DbRepo, DbUser, NewUser, UserId};
use crate::db::schema::SQLITE_INIT;
use crate::error::DevsyncError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct DevsyncStorage {
    pool: SqlitePool,
}

impl DevsyncStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and bootstrap the schema.
    ///
    /// In-memory URLs get a single never-recycled connection, otherwise every pooled
    /// connection would see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self, DevsyncError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let mut pool_opts = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), DevsyncError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- users ----

    /// Upsert by unique github_id. Returns the row id.
    pub async fn upsert_user(&self, user: NewUser) -> Result<UserId, DevsyncError> {
        let now = Utc::now().to_rfc3339();
        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (
                github_id, username, email, avatar_url, access_token, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(github_id) DO UPDATE SET
                username=excluded.username,
                email=excluded.email,
                avatar_url=excluded.avatar_url,
                access_token=excluded.access_token,
                updated_at=excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(user.github_id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.avatar_url)
        .bind(user.access_token)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.0)
    }

    pub async fn update_access_token(
        &self,
        id: UserId,
        access_token: &str,
    ) -> Result<(), DevsyncError> {
        sqlx::query("UPDATE users SET access_token = ?, updated_at = ? WHERE id = ?")
            .bind(access_token)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_session_token(&self, id: UserId, token: &str) -> Result<(), DevsyncError> {
        sqlx::query("UPDATE users SET session_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn user_id_by_session_token(
        &self,
        token: &str,
    ) -> Result<Option<UserId>, DevsyncError> {
        let rec: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE session_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rec.map(|r| r.0))
    }

    /// Full profile including the access token.
    pub async fn get_user(&self, id: UserId) -> Result<DbUser, DevsyncError> {
        let row = sqlx::query(
            r#"SELECT id, github_id, username, email, avatar_url, access_token,
               last_synced_at, created_at, updated_at
               FROM users WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DevsyncError::UserNotFound(id))?;
        Self::row_to_user(row)
    }

    pub async fn list_users_with_credential(&self) -> Result<Vec<UserId>, DevsyncError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE access_token != '' ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn mark_synced(&self, id: UserId) -> Result<(), DevsyncError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET last_synced_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- repositories ----

    /// Batch upsert keyed by (user_id, github_id) using a single transaction.
    pub async fn upsert_repos(&self, user_id: UserId, repos: &[DbRepo]) -> Result<(), DevsyncError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for repo in repos {
            sqlx::query(
                r#"
                INSERT INTO repositories (
                    user_id, github_id, name, full_name, description,
                    stars, forks, language, is_private, last_updated
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, github_id) DO UPDATE SET
                    name=excluded.name,
                    full_name=excluded.full_name,
                    description=excluded.description,
                    stars=excluded.stars,
                    forks=excluded.forks,
                    language=excluded.language,
                    is_private=excluded.is_private,
                    last_updated=excluded.last_updated
                "#,
            )
            .bind(user_id)
            .bind(repo.github_id)
            .bind(&repo.name)
            .bind(&repo.full_name)
            .bind(&repo.description)
            .bind(repo.stars)
            .bind(repo.forks)
            .bind(&repo.language)
            .bind(repo.is_private)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Repositories ordered by stars then forks. `limit <= 0` falls back to 50.
    pub async fn list_repos(&self, user_id: UserId, limit: i64) -> Result<Vec<DbRepo>, DevsyncError> {
        let limit = if limit <= 0 { 50 } else { limit };
        let rows = sqlx::query(
            r#"SELECT github_id, name, full_name, description, stars, forks, language, is_private
               FROM repositories WHERE user_id = ?
               ORDER BY stars DESC, forks DESC, github_id LIMIT ?"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_repo).collect()
    }

    pub async fn count_repos(&self, user_id: UserId) -> Result<i64, DevsyncError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repositories WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    // ---- contributions ----

    /// Upsert one (user, date, repo) count; the stored count is replaced, not summed.
    pub async fn upsert_contribution(
        &self,
        user_id: UserId,
        date: NaiveDate,
        count: i64,
        repo_id: Option<i64>,
    ) -> Result<(), DevsyncError> {
        sqlx::query(
            r#"
            INSERT INTO contributions (user_id, date, count, repo_id) VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, date, repo_id) DO UPDATE SET count=excluded.count
            "#,
        )
        .bind(user_id)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(count)
        .bind(repo_id.unwrap_or(0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Per-date totals (summed across repositories) in `[from, to]`, ordered by date.
    pub async fn contributions_in_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbContribution>, DevsyncError> {
        let rows = sqlx::query(
            r#"SELECT date, COALESCE(SUM(count), 0) AS total FROM contributions
               WHERE user_id = ? AND date >= ? AND date <= ?
               GROUP BY date ORDER BY date"#,
        )
        .bind(user_id)
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<DbContribution, DevsyncError> {
                Ok(DbContribution {
                    date: parse_date(row.try_get("date")?)?,
                    count: row.try_get("total")?,
                })
            })
            .collect()
    }

    // ---- daily stats ----

    pub async fn upsert_daily_stats(&self, stats: &DbDailyStats) -> Result<(), DevsyncError> {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (user_id, date, commits, prs, issues, stars_received)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, date) DO UPDATE SET
                commits=excluded.commits,
                prs=excluded.prs,
                issues=excluded.issues,
                stars_received=excluded.stars_received
            "#,
        )
        .bind(stats.user_id)
        .bind(stats.date.format(DATE_FORMAT).to_string())
        .bind(stats.commits)
        .bind(stats.prs)
        .bind(stats.issues)
        .bind(stats.stars_received)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn daily_stats_in_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbDailyStats>, DevsyncError> {
        let rows = sqlx::query(
            r#"SELECT user_id, date, commits, prs, issues, stars_received FROM daily_stats
               WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date"#,
        )
        .bind(user_id)
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<DbDailyStats, DevsyncError> {
                Ok(DbDailyStats {
                    user_id: row.try_get("user_id")?,
                    date: parse_date(row.try_get("date")?)?,
                    commits: row.try_get("commits")?,
                    prs: row.try_get("prs")?,
                    issues: row.try_get("issues")?,
                    stars_received: row.try_get("stars_received")?,
                })
            })
            .collect()
    }

    fn row_to_user(row: SqliteRow) -> Result<DbUser, DevsyncError> {
        let last_synced: Option<String> = row.try_get("last_synced_at")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(DbUser {
            id: row.try_get("id")?,
            github_id: row.try_get("github_id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            avatar_url: row.try_get("avatar_url")?,
            access_token: row.try_get("access_token")?,
            last_synced_at: last_synced.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_repo(row: SqliteRow) -> Result<DbRepo, DevsyncError> {
        Ok(DbRepo {
            github_id: row.try_get("github_id")?,
            name: row.try_get("name")?,
            full_name: row.try_get("full_name")?,
            description: row.try_get("description")?,
            stars: row.try_get("stars")?,
            forks: row.try_get("forks")?,
            language: row.try_get("language")?,
            is_private: row.try_get("is_private")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DevsyncError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

fn parse_date(s: String) -> Result<NaiveDate, DevsyncError> {
    Ok(NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))?)
}
