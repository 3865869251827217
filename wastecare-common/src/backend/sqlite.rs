//! Local relational store
//!
//! SQLite-backed implementation of the backend traits for offline
//! development and tests. Mirrors the hosted schema closely enough that the
//! report pipeline cannot tell the difference: `profiles`, `reports` and
//! `revalidations` tables plus the remote procedures the app calls.

use async_trait::async_trait;
use rand::RngCore;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthService, BackendError, BackendResult, PersistenceService};
use crate::models::{
    CreatedRecord, Credentials, ReportPayload, RevalidationPayload, RevalidationStatus, Session,
    SignUpData, UserFilter, UserSummary, WasteDistribution,
};
use crate::Result;

const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        password_hash TEXT NOT NULL,
        salt TEXT NOT NULL,
        exp INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        photos TEXT NOT NULL,
        notes TEXT,
        waste_type TEXT,
        waste_volume TEXT,
        location_category TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS revalidations (
        id TEXT PRIMARY KEY,
        report_id TEXT NOT NULL REFERENCES reports(id),
        user_id TEXT NOT NULL,
        status TEXT NOT NULL,
        photo TEXT,
        notes TEXT,
        created_at TEXT NOT NULL
    )
    "#,
];

/// SQLite implementation of [`PersistenceService`] and [`AuthService`]
pub struct SqliteBackend {
    db: SqlitePool,
    session: RwLock<Option<Session>>,
}

impl SqliteBackend {
    /// Open (creating if missing) a database file and ensure the schema
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        tracing::info!("Local store opened at {}", db_path.display());
        Self::from_pool(db).await
    }

    /// Private in-memory database (single connection so all queries share it)
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&db).await?;
        }
        Ok(Self {
            db,
            session: RwLock::new(None),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Current experience total for a user
    pub async fn user_exp(&self, user_id: &str) -> BackendResult<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT exp FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_error)?;
        row.map(|(exp,)| exp)
            .ok_or_else(|| not_found(format!("user {} not found", user_id)))
    }

    async fn add_user_exp(&self, args: &Value) -> BackendResult<Value> {
        let user_id = str_arg(args, "user_id")?;
        let amount = args
            .get("exp_amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| bad_request("exp_amount must be an integer"))?;

        let result = sqlx::query("UPDATE profiles SET exp = exp + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(not_found(format!("user {} not found", user_id)));
        }

        Ok(json!(self.user_exp(user_id).await?))
    }

    async fn get_leaderboard(&self, args: &Value) -> BackendResult<Value> {
        let limit = args
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT);

        // Same order as `leaderboard::rank`, so LIMIT cuts ties the same way
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT id, full_name, exp FROM profiles
            ORDER BY exp DESC, full_name IS NULL, LOWER(full_name), id
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(db_error)?;

        Ok(Value::Array(
            rows.into_iter()
                .map(|(user_id, full_name, exp)| {
                    json!({ "user_id": user_id, "full_name": full_name, "exp": exp })
                })
                .collect(),
        ))
    }

    async fn get_waste_distribution(&self) -> BackendResult<Value> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT waste_type, COUNT(*) FROM reports GROUP BY waste_type ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.db)
        .await
        .map_err(db_error)?;

        let distribution: Vec<WasteDistribution> = rows
            .into_iter()
            .map(|(waste_type, total)| WasteDistribution {
                waste_type: waste_type.and_then(|t| serde_json::from_value(Value::String(t)).ok()),
                total,
            })
            .collect();
        serde_json::to_value(distribution).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn get_user_stats(&self, args: &Value) -> BackendResult<Value> {
        let user_id = str_arg(args, "user_id")?;
        let exp = self.user_exp(user_id).await?;
        let (reports,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .map_err(db_error)?;
        let (revalidations,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM revalidations WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.db)
                .await
                .map_err(db_error)?;

        Ok(json!({
            "user_id": user_id,
            "exp": exp,
            "report_count": reports,
            "revalidation_count": revalidations,
        }))
    }
}

fn db_error(err: sqlx::Error) -> BackendError {
    BackendError::from(crate::Error::Database(err))
}

fn not_found(message: String) -> BackendError {
    BackendError::Service {
        status: 404,
        message: Some(message),
    }
}

fn bad_request(message: &str) -> BackendError {
    BackendError::Service {
        status: 400,
        message: Some(message.to_string()),
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> BackendResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request(&format!("{} must be a string", key)))
}

/// Stored text form of a serde enum (`"1_to_5kg"`, `"still_dirty"`, ...)
fn enum_text<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl PersistenceService for SqliteBackend {
    async fn create_report(&self, payload: &ReportPayload) -> BackendResult<CreatedRecord> {
        if payload.photos.is_empty() {
            return Err(bad_request("a report needs at least one photo"));
        }
        let photos =
            serde_json::to_string(&payload.photos).map_err(|e| BackendError::Decode(e.to_string()))?;
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO reports (id, user_id, latitude, longitude, photos, notes,
                                 waste_type, waste_volume, location_category, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&payload.user_id)
        .bind(payload.latitude)
        .bind(payload.longitude)
        .bind(photos)
        .bind(&payload.notes)
        .bind(payload.waste_type.as_ref().and_then(enum_text))
        .bind(payload.waste_volume.as_ref().and_then(enum_text))
        .bind(payload.location_category.as_ref().and_then(enum_text))
        .bind(enum_text(&payload.status))
        .bind(now())
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        tracing::debug!(report_id = %id, "Report stored locally");
        Ok(CreatedRecord { id })
    }

    async fn create_revalidation(
        &self,
        payload: &RevalidationPayload,
    ) -> BackendResult<CreatedRecord> {
        let mut tx = self.db.begin().await.map_err(db_error)?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM reports WHERE id = ?")
            .bind(&payload.report_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(not_found(format!("report {} not found", payload.report_id)));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO revalidations (id, report_id, user_id, status, photo, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&payload.report_id)
        .bind(&payload.user_id)
        .bind(enum_text(&payload.status))
        .bind(&payload.photo)
        .bind(&payload.notes)
        .bind(now())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if payload.status == RevalidationStatus::Clean {
            sqlx::query("UPDATE reports SET status = 'cleaned' WHERE id = ?")
                .bind(&payload.report_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(CreatedRecord { id })
    }

    async fn rpc(&self, name: &str, args: Value) -> BackendResult<Value> {
        match name {
            "add_user_exp" => self.add_user_exp(&args).await,
            "get_leaderboard" => self.get_leaderboard(&args).await,
            "get_waste_distribution" => self.get_waste_distribution().await,
            "get_user_stats" => self.get_user_stats(&args).await,
            other => Err(not_found(format!(
                "function {} is not available in the local store",
                other
            ))),
        }
    }
}

#[async_trait]
impl AuthService for SqliteBackend {
    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session> {
        let row: Option<(String, String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT id, email, full_name, password_hash, salt FROM profiles WHERE email = ?",
        )
        .bind(&credentials.email)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        let (id, email, full_name) = match row {
            Some((id, email, full_name, password_hash, salt))
                if hash_password(&salt, &credentials.password) == password_hash =>
            {
                (id, email, full_name)
            }
            _ => return Err(bad_request("Invalid login credentials")),
        };

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            user: UserSummary {
                id,
                email,
                full_name,
            },
        };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, data: &SignUpData) -> BackendResult<UserSummary> {
        if data.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::Service {
                status: 422,
                message: Some(format!(
                    "Password should be at least {} characters",
                    MIN_PASSWORD_LEN
                )),
            });
        }

        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM profiles WHERE email = ?")
            .bind(&data.email)
            .fetch_optional(&self.db)
            .await
            .map_err(db_error)?;
        if taken.is_some() {
            return Err(BackendError::Service {
                status: 422,
                message: Some("User already registered".to_string()),
            });
        }

        let id = Uuid::new_v4().to_string();
        let salt = new_salt();
        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, full_name, password_hash, salt, exp, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&id)
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(hash_password(&salt, &data.password))
        .bind(&salt)
        .bind(now())
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        tracing::info!(user_id = %id, "User registered in local store");
        Ok(UserSummary {
            id,
            email: data.email.clone(),
            full_name: Some(data.full_name.clone()),
        })
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.session.write().await.take();
        Ok(())
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn list_users(&self, filter: &UserFilter) -> BackendResult<Vec<UserSummary>> {
        let rows: Vec<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, email, full_name FROM profiles ORDER BY created_at")
                .fetch_all(&self.db)
                .await
                .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .filter(|(id, _, _)| filter.matches(id))
            .map(|(id, email, full_name)| UserSummary {
                id,
                email,
                full_name,
            })
            .collect())
    }
}
