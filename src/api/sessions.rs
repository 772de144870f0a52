use crate::types::WorkflowSession;

use super::client::ApiClient;
use super::error::ApiError;

/// Screening Session Store endpoints. The store assigns `session_id` on
/// create; updates and reads are addressed by that id.
#[derive(Debug, Clone)]
pub struct SessionsHandler {
    api: ApiClient,
}

impl SessionsHandler {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn create(&self, session: &WorkflowSession) -> Result<WorkflowSession, ApiError> {
        self.api
            .post_json("/screening-sessions", session, "screening session")
            .await
    }

    pub async fn update(
        &self,
        session_id: &str,
        session: &WorkflowSession,
    ) -> Result<WorkflowSession, ApiError> {
        self.api
            .put_json(
                &format!("/screening-sessions/{session_id}"),
                session,
                "screening session",
            )
            .await
    }

    pub async fn fetch(&self, session_id: &str) -> Result<WorkflowSession, ApiError> {
        self.api
            .get_json(
                &format!("/screening-sessions/{session_id}"),
                &[],
                "screening session",
            )
            .await
    }
}
