use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::types::Patient;

use super::client::ApiClient;
use super::error::ApiError;

/// Creation payload for `POST /patients/from-student/{studentId}`. The
/// registration service fills the rest from the student record it holds.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterFromStudent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citizen_id: Option<String>,
    pub phone: String,
    pub email: String,
}

/// Patient Registration Service endpoints.
#[derive(Debug, Clone)]
pub struct PatientsHandler {
    api: ApiClient,
}

impl PatientsHandler {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Look up the patient derived from a student, if one exists. The
    /// backend keys patients by originating student id, so at most one
    /// record comes back.
    pub async fn find_by_student(&self, student_id: &str) -> Result<Option<Patient>, ApiError> {
        let query = [("student_id", student_id.to_string())];
        let patients: Vec<Patient> = self.api.get_json("/patients", &query, "patient").await?;
        debug!(
            student_id = %student_id,
            found = !patients.is_empty(),
            "Patient lookup by student"
        );
        Ok(patients.into_iter().next())
    }

    pub async fn register_from_student(
        &self,
        student_id: &str,
        request: &RegisterFromStudent,
    ) -> Result<Patient, ApiError> {
        let patient: Patient = self
            .api
            .post_json(
                &format!("/patients/from-student/{student_id}"),
                request,
                "patient registration",
            )
            .await?;
        self.api.invalidate_cache("/students").await;
        Ok(patient)
    }
}
