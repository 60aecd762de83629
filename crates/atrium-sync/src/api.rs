//! # Portal Backend Client
//!
//! The HTTP client for the student-portal backend, behind an object-safe
//! trait so the engine can be driven against a programmable backend in
//! tests.
//!
//! ## Consumed Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Backend Contract (REST)                             │
//! │                                                                         │
//! │  POST /auth/login {identifier, password} → {accessToken, user}          │
//! │       401 on bad credentials                                            │
//! │  POST /auth/logout            (bearer)   → best-effort, any response    │
//! │  GET  /auth/verify            (bearer)   → 200 if valid                 │
//! │  GET  /auth/me                (bearer)   → User                         │
//! │  GET  /notifications?studentId&page&pageSize                            │
//! │       → {success, data:{notifications:[…], pagination:{pages}}}         │
//! │  POST /notifications/{id}/read (bearer)                                 │
//! │  POST /push/register {studentId, token} → {success}                     │
//! │                                                                         │
//! │  STATUS MAPPING:                                                       │
//! │  ───────────────                                                       │
//! │  login 401            → InvalidCredentials                             │
//! │  bearer 401/403       → Unauthorized (definitive rejection)            │
//! │  any 5xx              → ServerUnavailable (retryable)                  │
//! │  transport failure    → Network (retryable)                            │
//! │  logout               → Ok for ANY http response                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use atrium_core::{Notification, Session, User, UserType};

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Portal API Trait
// =============================================================================

/// Backend operations the engine depends on.
///
/// The production implementation is [`HttpPortalApi`]; tests inject a
/// programmable fake so state-machine behavior is deterministic.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Exchanges credentials for a session. 401 maps to `InvalidCredentials`.
    async fn login(&self, identifier: &str, password: &str) -> SyncResult<Session>;

    /// Best-effort remote invalidation. Any HTTP response counts as success;
    /// only transport failures error (and callers swallow those too).
    async fn logout(&self, token: &str) -> SyncResult<()>;

    /// One verification round-trip for the held token.
    async fn verify(&self, token: &str) -> SyncResult<()>;

    /// Fetches the current profile.
    async fn me(&self, token: &str) -> SyncResult<User>;

    /// Fetches one page of the user's notification feed.
    async fn notifications(
        &self,
        token: &str,
        student_id: &str,
        page: u32,
        page_size: u32,
    ) -> SyncResult<NotificationPage>;

    /// Acknowledges a notification server-side.
    async fn mark_read(&self, token: &str, notification_id: &str) -> SyncResult<()>;

    /// Associates a platform device token with the user for push delivery.
    async fn register_push(
        &self,
        token: &str,
        student_id: &str,
        device_token: &str,
    ) -> SyncResult<()>;
}

// =============================================================================
// Page Type
// =============================================================================

/// One fetched page of the notification feed.
#[derive(Debug, Clone, Default)]
pub struct NotificationPage {
    /// The page's entries, server order.
    pub notifications: Vec<Notification>,

    /// Total page count reported by the backend.
    pub total_pages: u32,
}

impl NotificationPage {
    /// Number of unread entries on this page; the authoritative value the
    /// unread counter derives from page 1.
    pub fn unread_count(&self) -> u32 {
        self.notifications.iter().filter(|n| !n.is_read).count() as u32
    }
}

// =============================================================================
// Wire DTOs
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    user: UserDto,
}

/// User as the backend serializes it. `user_type` stays a raw string on the
/// wire so unknown roles degrade to [`UserType::Unknown`] instead of failing
/// the whole login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: String,
    first_name: String,
    last_name: String,
    #[serde(default)]
    user_type: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    student_number: Option<String>,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        User {
            id: dto.id,
            first_name: dto.first_name,
            last_name: dto.last_name,
            user_type: UserType::from_wire(&dto.user_type),
            email: dto.email,
            student_number: dto.student_number,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: NotificationsData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationsData {
    #[serde(default)]
    notifications: Vec<NotificationDto>,
    #[serde(default)]
    pagination: PaginationDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationDto {
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDto {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    is_read: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<NotificationDto> for Notification {
    fn from(dto: NotificationDto) -> Self {
        Notification {
            id: dto.id,
            title: dto.title,
            message: dto.message,
            is_read: dto.is_read,
            created_at: dto.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRegisterRequest<'a> {
    student_id: &'a str,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AckEnvelope {
    #[serde(default)]
    success: bool,
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed [`PortalApi`] implementation.
#[derive(Debug, Clone)]
pub struct HttpPortalApi {
    base_url: String,
    client: Client,
}

impl HttpPortalApi {
    /// Creates a client from API settings.
    pub fn new(settings: &ApiSettings) -> SyncResult<Self> {
        let trimmed = settings.base_url.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(SyncError::InvalidConfig(
                "API base URL cannot be empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("atrium-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpPortalApi {
            base_url: trimmed,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn login(&self, identifier: &str, password: &str) -> SyncResult<Session> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                identifier,
                password,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let body: LoginResponse = response.json().await?;
        debug!(user_id = %body.user.id, "Login response received");

        Ok(Session {
            token: body.access_token,
            user: body.user.into(),
        })
    }

    async fn logout(&self, token: &str) -> SyncResult<()> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await?;

        // Best-effort: the session is being discarded locally no matter what
        // the server thinks of the request.
        debug!(status = %response.status(), "Logout response received");
        Ok(())
    }

    async fn verify(&self, token: &str) -> SyncResult<()> {
        let response = self
            .client
            .get(self.url("/auth/verify"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(error_for_status(status, response).await)
    }

    async fn me(&self, token: &str) -> SyncResult<User> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let dto: UserDto = response.json().await?;
        Ok(dto.into())
    }

    async fn notifications(
        &self,
        token: &str,
        student_id: &str,
        page: u32,
        page_size: u32,
    ) -> SyncResult<NotificationPage> {
        let page = page.to_string();
        let page_size = page_size.to_string();
        let response = self
            .client
            .get(self.url("/notifications"))
            .bearer_auth(token)
            .query(&[
                ("studentId", student_id),
                ("page", page.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let envelope: NotificationsEnvelope = response.json().await?;
        if !envelope.success {
            warn!("Notifications endpoint reported success=false");
        }

        Ok(NotificationPage {
            notifications: envelope
                .data
                .notifications
                .into_iter()
                .map(Notification::from)
                .collect(),
            total_pages: envelope.data.pagination.pages,
        })
    }

    async fn mark_read(&self, token: &str, notification_id: &str) -> SyncResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/notifications/{notification_id}/read")))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(error_for_status(status, response).await)
    }

    async fn register_push(
        &self,
        token: &str,
        student_id: &str,
        device_token: &str,
    ) -> SyncResult<()> {
        let response = self
            .client
            .post(self.url("/push/register"))
            .bearer_auth(token)
            .json(&PushRegisterRequest {
                student_id,
                token: device_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let ack: AckEnvelope = response.json().await.unwrap_or(AckEnvelope { success: true });
        if !ack.success {
            return Err(SyncError::Internal(
                "backend declined push registration".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Status Mapping
// =============================================================================

/// Maps a non-success response to the engine's error taxonomy.
async fn error_for_status(status: StatusCode, response: Response) -> SyncError {
    let message = extract_message(&response.text().await.unwrap_or_default());

    if status.is_server_error() {
        return SyncError::ServerUnavailable {
            status: status.as_u16(),
            message,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(message),
        _ => SyncError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls a human-readable message out of an error body, tolerating both
/// `{message}` and `{error}` envelopes as well as plain text.
fn extract_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        message: Option<String>,
        error: Option<String>,
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "request failed".to_string();
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(trimmed) {
        if let Some(message) = envelope.message.or(envelope.error) {
            return message;
        }
    }

    truncate_for_error(trimmed, 240)
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}
