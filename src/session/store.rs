use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{retry_with_backoff, ApiError, RetryConfig, SessionsHandler};
use crate::types::{SessionStatus, WorkflowSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not save screening progress: {0}")]
    Api(#[from] ApiError),

    #[error("stored session document is unusable: {reason}")]
    Corrupt { reason: String },
}

/// Durable checkpointing for [`WorkflowSession`] documents.
///
/// `save_progress` is an upsert from the caller's perspective: the first
/// call creates (the store assigns `session_id`), every later call updates
/// the same document. Repeating a save at the same step with unchanged data
/// touches nothing but the timestamp.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_progress(&self, session: &WorkflowSession)
        -> Result<WorkflowSession, StoreError>;
    async fn load_session(&self, session_id: &str) -> Result<WorkflowSession, StoreError>;
    async fn complete_session(
        &self,
        session: &WorkflowSession,
    ) -> Result<WorkflowSession, StoreError>;
}

/// Session store over the screening-sessions REST endpoints, with bounded
/// exponential backoff for transient failures. Non-transient failures (401,
/// validation) surface immediately.
pub struct RestSessionStore {
    sessions: SessionsHandler,
    retry: RetryConfig,
}

impl RestSessionStore {
    pub fn new(sessions: SessionsHandler) -> Self {
        Self {
            sessions,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn upsert(
        &self,
        session: &WorkflowSession,
        operation: &str,
    ) -> Result<WorkflowSession, StoreError> {
        let mut document = session.clone();
        document.updated_at = Utc::now();

        let stored = match document.session_id.clone() {
            None => {
                let sessions = self.sessions.clone();
                let document = document.clone();
                retry_with_backoff(&self.retry, operation, move || {
                    let sessions = sessions.clone();
                    let document = document.clone();
                    async move { sessions.create(&document).await }
                })
                .await?
            }
            Some(session_id) => {
                let sessions = self.sessions.clone();
                let document = document.clone();
                retry_with_backoff(&self.retry, operation, move || {
                    let sessions = sessions.clone();
                    let document = document.clone();
                    let session_id = session_id.clone();
                    async move { sessions.update(&session_id, &document).await }
                })
                .await?
            }
        };

        if stored.session_id.is_none() {
            return Err(StoreError::Corrupt {
                reason: "the store returned a session without an id".to_string(),
            });
        }
        Ok(stored)
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn save_progress(
        &self,
        session: &WorkflowSession,
    ) -> Result<WorkflowSession, StoreError> {
        let stored = self.upsert(session, "save screening progress").await?;
        info!(
            session_id = ?stored.session_id,
            step = %stored.current_step,
            "Screening progress saved"
        );
        Ok(stored)
    }

    async fn load_session(&self, session_id: &str) -> Result<WorkflowSession, StoreError> {
        let sessions = self.sessions.clone();
        let id = session_id.to_string();
        let loaded = retry_with_backoff(&self.retry, "load screening session", move || {
            let sessions = sessions.clone();
            let id = id.clone();
            async move { sessions.fetch(&id).await }
        })
        .await
        .map_err(|err| match err {
            // A document whose step index fails range validation arrives as
            // a decode error; report it as corruption, never reattach at 0.
            ApiError::Decode(decode) => StoreError::Corrupt {
                reason: decode.to_string(),
            },
            other => StoreError::Api(other),
        })?;

        info!(
            session_id = %session_id,
            step = %loaded.current_step,
            status = ?loaded.status,
            "Screening session loaded"
        );
        Ok(loaded)
    }

    async fn complete_session(
        &self,
        session: &WorkflowSession,
    ) -> Result<WorkflowSession, StoreError> {
        if session.is_completed() {
            // Domain no-op: observed state never regresses and the store is
            // not asked to complete twice.
            warn!(
                session_id = ?session.session_id,
                "Completion requested for an already-completed session; ignoring"
            );
            return Ok(session.clone());
        }

        let mut terminal = session.clone();
        terminal.status = SessionStatus::Completed;
        let stored = self.upsert(&terminal, "complete screening session").await?;
        info!(session_id = ?stored.session_id, "Screening session completed in store");
        Ok(stored)
    }
}
