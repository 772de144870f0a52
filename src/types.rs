use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::step_data::StepDataMap;
use crate::workflow::steps::ScreeningStep;

/// Student record as returned by the Directory Service. Read-only on this
/// side; the directory owns the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Canonical identifier. Older directory documents carry `_id` instead;
    /// accepted on read, never written back.
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub citizen_id: Option<String>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub screening_status: Option<String>,
}

/// Patient record owned by the Patient Registration Service. Stable once
/// created; derived from exactly one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// The workflow session document exchanged with the Screening Session Store.
///
/// `session_id` is absent until the store assigns one on first persist.
/// `current_step` travels as a 0-based index into the step sequence and is
/// range-checked on deserialization, so a corrupt document fails loudly
/// instead of reattaching at the wrong step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(with = "crate::workflow::steps::step_index")]
    pub current_step: ScreeningStep,
    #[serde(default)]
    pub step_data: StepDataMap,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: None,
            patient_id: None,
            student_id: None,
            current_step: ScreeningStep::first(),
            step_data: StepDataMap::default(),
            status: SessionStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

impl Default for WorkflowSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_accepts_legacy_id_field() {
        let legacy = serde_json::json!({
            "_id": "S1",
            "name": "Anan P.",
        });

        let student: Student = serde_json::from_value(legacy).unwrap();
        assert_eq!(student.id, "S1");
        assert!(!student.consent);
    }

    #[test]
    fn session_round_trips_with_integer_step_index() {
        let mut session = WorkflowSession::new();
        session.current_step = ScreeningStep::VaScreening;

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["current_step"], serde_json::json!(3));
        assert!(value.get("session_id").is_none());

        let back: WorkflowSession = serde_json::from_value(value).unwrap();
        assert_eq!(back.current_step, ScreeningStep::VaScreening);
    }

    #[test]
    fn session_with_out_of_range_step_fails_to_load() {
        let mut value = serde_json::to_value(WorkflowSession::new()).unwrap();
        value["current_step"] = serde_json::json!(42);

        let result: Result<WorkflowSession, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }
}
