//! Hosted backend client
//!
//! Talks to a hosted backend-as-a-service exposing PostgREST-style tables
//! (`/rest/v1/...`), remote procedures (`/rest/v1/rpc/...`) and a GoTrue-style
//! auth API (`/auth/v1/...`). Photo classification runs as a hosted function
//! (`/functions/v1/classify-waste`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    extract_error_message, AuthService, BackendError, BackendResult, ClassificationService,
    PersistenceService,
};
use crate::config::{BackendConfig, ServiceCredentials};
use crate::models::{
    Classification, CreatedRecord, Credentials, ReportPayload, RevalidationPayload, Session, SignUpData,
    UserFilter, UserSummary,
};

const USER_AGENT: &str = concat!("wastecare/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ADMIN_USERS_PAGE_SIZE: usize = 1000;
const CLASSIFY_FUNCTION: &str = "/functions/v1/classify-waste";

/// Hosted REST backend client
pub struct RemoteBackend {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: Option<String>,
    session: RwLock<Option<Session>>,
}

/// Auth user as returned by the hosted auth API
#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl From<RemoteUser> for UserSummary {
    fn from(user: RemoteUser) -> Self {
        let full_name = user
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("full_name"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        UserSummary {
            id: user.id,
            email: user.email.unwrap_or_default(),
            full_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct AdminUsersResponse {
    users: Vec<RemoteUser>,
}

impl RemoteBackend {
    /// Client using the anonymous key (and the service role key when present)
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let base_url = config
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BackendError::Configuration("backend URL not configured".into()))?;
        let anon_key = config
            .anon_key
            .clone()
            .filter(|k| crate::config::is_valid_key(k))
            .ok_or_else(|| BackendError::Configuration("anonymous key not configured".into()))?;

        Ok(Self {
            http_client: build_http_client()?,
            base_url,
            anon_key,
            service_role_key: config.service_role_key.clone(),
            session: RwLock::new(None),
        })
    }

    /// Server-side client authenticated with the service role key only
    pub fn with_service_role(credentials: &ServiceCredentials) -> BackendResult<Self> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: credentials.url.clone(),
            anon_key: credentials.service_role_key.clone(),
            service_role_key: Some(credentials.service_role_key.clone()),
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token for data calls: the user's session when signed in
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    async fn post_json(&self, path: &str, body: &Value) -> BackendResult<Value> {
        let response = self
            .http_client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;

        read_json(response).await
    }

    async fn insert_row(&self, table: &str, row: Value) -> BackendResult<CreatedRecord> {
        let rows = self.post_json(&format!("/rest/v1/{}", table), &row).await?;

        // PostgREST returns the inserted rows as an array
        let first = match rows {
            Value::Array(items) => items.into_iter().next(),
            Value::Object(map) => Some(Value::Object(map)),
            _ => None,
        }
        .ok_or_else(|| {
            BackendError::Decode(format!("empty insert response for {}", table))
        })?;

        match first.get("id") {
            Some(Value::String(id)) => Ok(CreatedRecord { id: id.clone() }),
            Some(Value::Number(n)) => Ok(CreatedRecord { id: n.to_string() }),
            _ => Err(BackendError::Decode(format!(
                "inserted {} row has no id",
                table
            ))),
        }
    }
}

fn build_http_client() -> BackendResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| BackendError::Configuration(format!("HTTP client: {}", e)))
}

fn map_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Transport("request timed out".to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Turn a response into JSON, mapping non-2xx statuses to `BackendError`
async fn read_json(response: reqwest::Response) -> BackendResult<Value> {
    let status = response.status();
    let body = response.text().await.map_err(map_transport)?;

    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "Backend rejected request");
        return Err(BackendError::Service {
            status: status.as_u16(),
            message: extract_error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl PersistenceService for RemoteBackend {
    async fn create_report(&self, payload: &ReportPayload) -> BackendResult<CreatedRecord> {
        let row = serde_json::to_value(payload).map_err(|e| BackendError::Decode(e.to_string()))?;
        let record = self.insert_row("reports", row).await?;
        tracing::info!(report_id = %record.id, photos = payload.photos.len(), "Report created");
        Ok(record)
    }

    async fn create_revalidation(
        &self,
        payload: &RevalidationPayload,
    ) -> BackendResult<CreatedRecord> {
        let row = serde_json::to_value(payload).map_err(|e| BackendError::Decode(e.to_string()))?;
        let record = self.insert_row("revalidations", row).await?;
        tracing::info!(
            revalidation_id = %record.id,
            report_id = %payload.report_id,
            status = ?payload.status,
            "Revalidation created"
        );
        Ok(record)
    }

    async fn rpc(&self, name: &str, args: Value) -> BackendResult<Value> {
        tracing::debug!(function = name, "Calling remote procedure");
        self.post_json(&format!("/rest/v1/rpc/{}", name), &args).await
    }
}

#[async_trait]
impl AuthService for RemoteBackend {
    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session> {
        let response = self
            .http_client
            .post(self.url("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(map_transport)?;

        let token: TokenResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user.into(),
        };

        *self.session.write().await = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(&self, data: &SignUpData) -> BackendResult<UserSummary> {
        let response = self
            .http_client
            .post(self.url("/auth/v1/signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": data.email,
                "password": data.password,
                "data": { "full_name": data.full_name },
            }))
            .send()
            .await
            .map_err(map_transport)?;

        let body = read_json(response).await?;
        // Depending on email confirmation settings the user is either the
        // body itself or nested under `user`
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: RemoteUser =
            serde_json::from_value(user_value).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(user.into())
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let session = self.session.write().await.take();
        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.url("/auth/v1/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(map_transport)?;
        read_json(response).await?;
        tracing::info!(user_id = %session.user.id, "Signed out");
        Ok(())
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn list_users(&self, filter: &UserFilter) -> BackendResult<Vec<UserSummary>> {
        let service_key = self.service_role_key.as_deref().ok_or_else(|| {
            BackendError::Configuration("service role key required to list users".into())
        })?;

        // Walk pages until every requested id is seen or the directory runs out
        let mut outstanding: HashSet<&str> = filter.ids.iter().map(String::as_str).collect();
        let mut users = Vec::new();
        let mut page = 1usize;
        loop {
            let batch = self.admin_users_page(service_key, page).await?;
            let last_page = batch.len() < ADMIN_USERS_PAGE_SIZE;
            for user in batch.into_iter().filter(|u| filter.matches(&u.id)) {
                outstanding.remove(user.id.as_str());
                users.push(UserSummary::from(user));
            }
            if last_page || (!filter.ids.is_empty() && outstanding.is_empty()) {
                break;
            }
            page += 1;
        }

        tracing::debug!(pages = page, found = users.len(), "Listed directory users");
        Ok(users)
    }
}

impl RemoteBackend {
    async fn admin_users_page(&self, service_key: &str, page: usize) -> BackendResult<Vec<RemoteUser>> {
        let response = self
            .http_client
            .get(self.url("/auth/v1/admin/users"))
            .query(&[
                ("page", page.to_string()),
                ("per_page", ADMIN_USERS_PAGE_SIZE.to_string()),
            ])
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .send()
            .await
            .map_err(map_transport)?;

        let body: AdminUsersResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(body.users)
    }
}

#[async_trait]
impl ClassificationService for RemoteBackend {
    async fn classify(&self, photo: &str) -> BackendResult<Option<Classification>> {
        let body = self.post_json(CLASSIFY_FUNCTION, &json!({ "image": photo })).await?;

        // Partial or unrecognised answers count as no classification
        match serde_json::from_value::<Classification>(body) {
            Ok(classification) => Ok(Some(classification)),
            Err(e) => {
                tracing::debug!(error = %e, "Classifier returned no usable result");
                Ok(None)
            }
        }
    }
}
