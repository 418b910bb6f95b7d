use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::models::{ReportRecord, UserPreference};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://saleasy_db.sqlite";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

// Every operation opens its own connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct Store {
    options: SqliteConnectOptions,
}

impl Store {
    /// Accepts a `sqlite:` URL or a plain file path.
    pub fn open(target: &str) -> Result<Self, StoreError> {
        if target.starts_with("sqlite:") {
            Self::from_url(target)
        } else {
            Ok(Self::at_path(Path::new(target)))
        }
    }

    pub fn from_url(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Ok(Self { options })
    }

    pub fn at_path(path: &Path) -> Self {
        Self {
            options: SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        }
    }

    async fn connect(&self) -> Result<SqliteConnection, StoreError> {
        Ok(self.options.connect().await?)
    }

    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        sqlx::migrate!("./migrations").run(&mut conn).await?;
        conn.close().await?;
        info!("schema ready");
        Ok(())
    }

    pub async fn find_password_hash(&self, username: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connect().await?;
        let hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(hash)
    }

    #[instrument(skip(self, password_hash, preference))]
    pub async fn register_user(
        &self,
        username: &str,
        password_hash: &str,
        preference: &UserPreference,
    ) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        sqlx::query(
            r#"
            INSERT INTO users (username, password, analysis_type, report_schedule)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (username) DO UPDATE
            SET password = excluded.password
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(&preference.analysis_kind)
        .bind(&preference.report_schedule)
        .execute(&mut conn)
        .await?;
        conn.close().await?;
        info!("registered user");
        Ok(())
    }

    // Leaves an existing password hash untouched.
    #[instrument(skip(self))]
    pub async fn upsert_preference(
        &self,
        username: &str,
        analysis_kind: &str,
        report_schedule: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        sqlx::query(
            r#"
            INSERT INTO users (username, password, analysis_type, report_schedule)
            VALUES (?, '', ?, ?)
            ON CONFLICT (username) DO UPDATE
            SET analysis_type = excluded.analysis_type,
                report_schedule = excluded.report_schedule
            "#,
        )
        .bind(username)
        .bind(analysis_kind)
        .bind(report_schedule)
        .execute(&mut conn)
        .await?;
        conn.close().await?;
        debug!("preference saved");
        Ok(())
    }

    pub async fn get_preference(&self, username: &str) -> Result<UserPreference, StoreError> {
        let mut conn = self.connect().await?;
        let row = sqlx::query(
            "SELECT analysis_type, report_schedule FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&mut conn)
        .await?;
        conn.close().await?;

        Ok(match row {
            Some(row) => UserPreference {
                username: username.to_string(),
                analysis_kind: row.get("analysis_type"),
                report_schedule: row.get("report_schedule"),
            },
            None => UserPreference::default_for(username),
        })
    }

    #[instrument(skip(self))]
    pub async fn append_report_record(
        &self,
        username: &str,
        report_file: &str,
    ) -> Result<ReportRecord, StoreError> {
        let report_time = now_seconds();
        let mut conn = self.connect().await?;
        let id: i64 = sqlx::query(
            r#"
            INSERT INTO reports (username, report_time, report_file)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(report_time)
        .bind(report_file)
        .fetch_one(&mut conn)
        .await?
        .get("id");
        conn.close().await?;
        info!(id, "report recorded");

        Ok(ReportRecord {
            id,
            username: username.to_string(),
            report_time,
            report_file: report_file.to_string(),
        })
    }

    /// Export history for `username`, newest first.
    pub async fn list_reports(&self, username: &str) -> Result<Vec<ReportRecord>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, username, report_time, report_file
            FROM reports
            WHERE username = ?
            ORDER BY id DESC
            "#,
        )
        .bind(username)
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(ReportRecord {
                id: row.get("id"),
                username: row.get("username"),
                report_time: row.get("report_time"),
                report_file: row.get("report_file"),
            });
        }

        Ok(reports)
    }
}

fn now_seconds() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
