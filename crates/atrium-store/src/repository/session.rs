//! # Session Store Repository
//!
//! Persistence for the authenticated session (token + cached user).
//!
//! ## The Both-Or-Neither Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Session Persistence Invariant                          │
//! │                                                                         │
//! │  save(session)                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPSERT session_store(auth_token  → "<bearer>")             │   │
//! │  │  2. UPSERT session_store(user_data   → "<user JSON>")          │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both keys land or neither does                               │
//! │                                                                         │
//! │  load() tolerance matrix:                                              │
//! │  ┌──────────────┬──────────────┬──────────────────────────────┐        │
//! │  │ auth_token   │ user_data    │ result                       │        │
//! │  ├──────────────┼──────────────┼──────────────────────────────┤        │
//! │  │ present      │ present+valid│ Some(Session)                │        │
//! │  │ present      │ missing      │ None (logged)                │        │
//! │  │ missing      │ present      │ None (logged)                │        │
//! │  │ present      │ malformed    │ None (logged)                │        │
//! │  │ missing      │ missing      │ None                         │        │
//! │  └──────────────┴──────────────┴──────────────────────────────┘        │
//! │                                                                         │
//! │  A damaged store must never lock the user out of the login screen:     │
//! │  every degraded shape restarts the app as Unauthenticated.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use atrium_core::{Session, User, STORE_KEY_AUTH_TOKEN, STORE_KEY_USER_DATA};

use crate::error::{StoreError, StoreResult};

/// Repository for the persisted session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Creates a new SessionStore.
    pub fn new(pool: SqlitePool) -> Self {
        SessionStore { pool }
    }

    /// Loads the persisted session, if a complete and intact one exists.
    ///
    /// Absent keys, a lone key, and malformed user JSON all yield
    /// `Ok(None)`; only store-level failures (connection, query) are errors.
    pub async fn load(&self) -> StoreResult<Option<Session>> {
        let token = self.get_value(STORE_KEY_AUTH_TOKEN).await?;
        let user_json = self.get_value(STORE_KEY_USER_DATA).await?;

        let (token, user_json) = match (token, user_json) {
            (Some(t), Some(u)) => (t, u),
            (None, None) => return Ok(None),
            (token, user_json) => {
                warn!(
                    has_token = token.is_some(),
                    has_user = user_json.is_some(),
                    "Token store holds a partial session; treating as absent"
                );
                return Ok(None);
            }
        };

        let user = match serde_json::from_str::<User>(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!(?e, "Stored user record is malformed; treating as absent");
                return Ok(None);
            }
        };

        debug!(user_id = %user.id, "Loaded persisted session");
        Ok(Some(Session { token, user }))
    }

    /// Persists the session, upserting both keys in one transaction.
    pub async fn save(&self, session: &Session) -> StoreResult<()> {
        let user_json = serde_json::to_string(&session.user)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for (key, value) in [
            (STORE_KEY_AUTH_TOKEN, session.token.as_str()),
            (STORE_KEY_USER_DATA, user_json.as_str()),
        ] {
            sqlx::query(
                "INSERT INTO session_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(user_id = %session.user.id, "Persisted session");
        Ok(())
    }

    /// Removes the persisted session, deleting both keys in one transaction.
    ///
    /// Idempotent: clearing an empty store succeeds.
    pub async fn clear(&self) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM session_store WHERE key IN (?1, ?2)")
            .bind(STORE_KEY_AUTH_TOKEN)
            .bind(STORE_KEY_USER_DATA)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!("Cleared persisted session");
        Ok(())
    }

    /// Returns true if a complete, intact session is persisted.
    pub async fn has_session(&self) -> StoreResult<bool> {
        Ok(self.load().await?.is_some())
    }

    async fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM session_store WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Storage, StorageConfig};
    use atrium_core::UserType;

    fn sample_session() -> Session {
        Session {
            token: "abc".to_string(),
            user: User {
                id: "u1".to_string(),
                first_name: "A".to_string(),
                last_name: "Ng".to_string(),
                user_type: UserType::Student,
                email: None,
                student_number: Some("ANG123".to_string()),
            },
        }
    }

    async fn store() -> SessionStore {
        Storage::new(StorageConfig::in_memory())
            .await
            .unwrap()
            .sessions()
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = store().await;
        assert!(store.load().await.unwrap().is_none());

        let session = sample_session();
        store.save(&session).await.unwrap();

        let loaded = store.load().await.unwrap().expect("session persisted");
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.user.id, "u1");
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_save_overwrites_in_place() {
        let store = store().await;
        store.save(&sample_session()).await.unwrap();

        let mut renewed = sample_session();
        renewed.token = "def".to_string();
        store.save(&renewed).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.token, "def");
    }

    #[tokio::test]
    async fn test_clear_empties_both_keys() {
        let store = store().await;
        store.save(&sample_session()).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(!store.has_session().await.unwrap());

        // Clearing again is a no-op, not an error.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_user_record_treated_as_absent() {
        let storage = Storage::new(StorageConfig::in_memory()).await.unwrap();
        let store = storage.sessions();
        store.save(&sample_session()).await.unwrap();

        // Corrupt the user record behind the repository's back.
        sqlx::query("UPDATE session_store SET value = ?1 WHERE key = ?2")
            .bind("{not json")
            .bind(STORE_KEY_USER_DATA)
            .execute(storage.pool())
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lone_token_treated_as_absent() {
        let storage = Storage::new(StorageConfig::in_memory()).await.unwrap();
        let store = storage.sessions();
        store.save(&sample_session()).await.unwrap();

        sqlx::query("DELETE FROM session_store WHERE key = ?1")
            .bind(STORE_KEY_USER_DATA)
            .execute(storage.pool())
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_none());
    }
}
