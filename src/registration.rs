//! Registration gate: guarantees a durable patient record exists before any
//! step past `StudentRegistration` captures clinical data.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, PatientsHandler, RegisterFromStudent};
use crate::types::{Patient, Student};

/// Deterministic stand-in when the student record has no phone on file.
pub const FALLBACK_PHONE: &str = "000-0000000";
/// Deterministic stand-in email; the reserved `.invalid` TLD can never
/// resolve to a real mailbox.
pub const FALLBACK_EMAIL: &str = "unregistered@screening.invalid";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("could not register the student: {0}")]
    Api(#[from] ApiError),

    #[error("the student record cannot be registered: {reason}")]
    IncompleteStudent { reason: String },
}

/// Seam over the Patient Registration Service so the gate can be exercised
/// against counting test doubles.
#[async_trait]
pub trait PatientRegistry: Send + Sync {
    async fn find_by_student(&self, student_id: &str)
        -> Result<Option<Patient>, RegistrationError>;
    async fn create_from_student(&self, student: &Student) -> Result<Patient, RegistrationError>;
}

/// REST-backed registry over the patients endpoints.
pub struct RestPatientRegistry {
    patients: PatientsHandler,
}

impl RestPatientRegistry {
    pub fn new(patients: PatientsHandler) -> Self {
        Self { patients }
    }
}

#[async_trait]
impl PatientRegistry for RestPatientRegistry {
    async fn find_by_student(
        &self,
        student_id: &str,
    ) -> Result<Option<Patient>, RegistrationError> {
        Ok(self.patients.find_by_student(student_id).await?)
    }

    async fn create_from_student(&self, student: &Student) -> Result<Patient, RegistrationError> {
        let request = RegisterFromStudent {
            name: student.name.clone(),
            date_of_birth: student.date_of_birth,
            citizen_id: student.citizen_id.clone(),
            phone: FALLBACK_PHONE.to_string(),
            email: FALLBACK_EMAIL.to_string(),
        };
        Ok(self
            .patients
            .register_from_student(&student.id, &request)
            .await?)
    }
}

/// The gate itself: lookup-or-create, idempotent by student id.
pub struct RegistrationGate {
    registry: Box<dyn PatientRegistry>,
}

impl RegistrationGate {
    pub fn new(registry: Box<dyn PatientRegistry>) -> Self {
        Self { registry }
    }

    /// Return the patient derived from `student`, creating it on first call.
    ///
    /// An existing patient is returned unchanged: repeated calls for the
    /// same student id yield the same `patient_id` and trigger at most one
    /// creation request. On failure nothing is created and the caller's
    /// step data stays untouched for a retry.
    pub async fn ensure_patient(&self, student: &Student) -> Result<Patient, RegistrationError> {
        if student.id.trim().is_empty() {
            return Err(RegistrationError::IncompleteStudent {
                reason: "the student has no identifier".to_string(),
            });
        }

        if let Some(existing) = self.registry.find_by_student(&student.id).await? {
            info!(
                student_id = %student.id,
                patient_id = %existing.id,
                "Student already registered; reusing patient"
            );
            return Ok(existing);
        }

        match self.registry.create_from_student(student).await {
            Ok(patient) => {
                info!(
                    student_id = %student.id,
                    patient_id = %patient.id,
                    "Registered student as new patient"
                );
                Ok(patient)
            }
            Err(err) => {
                warn!(
                    student_id = %student.id,
                    error = %err,
                    "Patient registration failed; step data retained for retry"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Registry double that counts creations and remembers what it created.
    #[derive(Clone)]
    struct CountingRegistry(Arc<CountingRegistryInner>);

    struct CountingRegistryInner {
        created: Mutex<Option<Patient>>,
        creation_calls: AtomicU32,
        fail_creation: bool,
    }

    impl CountingRegistry {
        fn new(fail_creation: bool) -> Self {
            Self(Arc::new(CountingRegistryInner {
                created: Mutex::new(None),
                creation_calls: AtomicU32::new(0),
                fail_creation,
            }))
        }

        fn creation_calls(&self) -> u32 {
            self.0.creation_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PatientRegistry for CountingRegistry {
        async fn find_by_student(
            &self,
            student_id: &str,
        ) -> Result<Option<Patient>, RegistrationError> {
            let created = self.0.created.lock().unwrap();
            Ok(created
                .as_ref()
                .filter(|p| p.student_id.as_deref() == Some(student_id))
                .cloned())
        }

        async fn create_from_student(
            &self,
            student: &Student,
        ) -> Result<Patient, RegistrationError> {
            self.0.creation_calls.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_creation {
                return Err(RegistrationError::Api(ApiError::Server {
                    status: 503,
                    message: "registration service down".to_string(),
                }));
            }
            let patient = Patient {
                id: format!("P-{}", student.id),
                student_id: Some(student.id.clone()),
                name: student.name.clone(),
                date_of_birth: student.date_of_birth,
                phone: Some(FALLBACK_PHONE.to_string()),
                email: Some(FALLBACK_EMAIL.to_string()),
            };
            *self.0.created.lock().unwrap() = Some(patient.clone());
            Ok(patient)
        }
    }

    fn student(id: &str) -> Student {
        Student {
            id: id.to_string(),
            name: "Test Student".to_string(),
            date_of_birth: None,
            school: None,
            grade: None,
            citizen_id: None,
            consent: true,
            screening_status: None,
        }
    }

    #[test]
    fn ensure_patient_is_idempotent_by_student_id() {
        let registry = CountingRegistry::new(false);
        let gate = RegistrationGate::new(Box::new(registry.clone()));

        tokio_test::block_on(async {
            let first = gate.ensure_patient(&student("S1")).await.unwrap();
            let second = gate.ensure_patient(&student("S1")).await.unwrap();
            assert_eq!(first.id, second.id);
        });

        assert_eq!(registry.creation_calls(), 1);
    }

    #[test]
    fn creation_failure_surfaces_and_creates_nothing() {
        let gate = RegistrationGate::new(Box::new(CountingRegistry::new(true)));

        tokio_test::block_on(async {
            let err = gate.ensure_patient(&student("S1")).await.unwrap_err();
            assert!(matches!(err, RegistrationError::Api(_)));
        });
    }

    #[test]
    fn blank_student_id_is_rejected_before_any_call() {
        let gate = RegistrationGate::new(Box::new(CountingRegistry::new(false)));

        tokio_test::block_on(async {
            let err = gate.ensure_patient(&student("  ")).await.unwrap_err();
            assert!(matches!(err, RegistrationError::IncompleteStudent { .. }));
        });
    }
}
