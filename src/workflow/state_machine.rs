use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::registration::RegistrationError;
use crate::session::StoreError;
use crate::types::{SessionStatus, Student, WorkflowSession};

use super::step_data::StepData;
use super::steps::ScreeningStep;

/// Errors surfaced by the screening workflow. Messages are operator-facing:
/// they name the failed action and, where known, the remediation.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("register the student before continuing past registration")]
    RegistrationRequired,

    #[error("no patient has been selected for this session")]
    NoPatientSelected,

    #[error("the {step} form has not been filled in yet")]
    MissingStepData { step: ScreeningStep },

    #[error("the {step} form is incomplete: {reason}")]
    InvalidStepData { step: ScreeningStep, reason: String },

    #[error("this form belongs to {entered}, but the session is at {current}")]
    StepMismatch {
        current: ScreeningStep,
        entered: ScreeningStep,
    },

    #[error("already at the first step")]
    AtFirstStep,

    #[error("already at the final step; finish the session instead")]
    AtFinalStep,

    #[error("the session can only be finished from the final step")]
    NotAtFinalStep,

    #[error("a patient can only be picked while still at the appointment step")]
    SelectionUnavailable,

    #[error("this screening session is already completed")]
    SessionCompleted,

    #[error("another request for this session is still in flight; wait for it to finish")]
    OperationInFlight,

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What caused a step change; kept with each history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    Next,
    Back,
    PatientSelected,
    PatientSwitched,
    Resumed,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ScreeningStep,
    pub to: ScreeningStep,
    pub trigger: TransitionTrigger,
    pub at: DateTime<Utc>,
}

/// The step sequencer: a pure, I/O-free state machine over the fixed
/// screening sequence.
///
/// It owns the in-memory [`WorkflowSession`] and enforces the transition
/// rules: ordering, the registration gate out of `StudentRegistration`,
/// per-step data validation, and the terminal `completed` state. All network
/// effects (the gate call itself, persistence, presence) live in the
/// controller; by the time a method here returns `Ok`, the transition has
/// happened, and on `Err` nothing changed.
#[derive(Debug, Clone)]
pub struct ScreeningWorkflow {
    session: WorkflowSession,
    selected_student: Option<Student>,
    history: Vec<TransitionRecord>,
}

impl ScreeningWorkflow {
    /// Fresh workflow: step 0, no patient selected.
    pub fn new() -> Self {
        Self {
            session: WorkflowSession::new(),
            selected_student: None,
            history: Vec::new(),
        }
    }

    /// Reattach to a previously persisted session at exactly its saved step.
    pub fn from_session(session: WorkflowSession) -> Self {
        info!(
            session_id = ?session.session_id,
            step = %session.current_step,
            status = ?session.status,
            "Reattached workflow from persisted session"
        );
        Self {
            session,
            selected_student: None,
            history: Vec::new(),
        }
    }

    pub fn current_step(&self) -> ScreeningStep {
        self.session.current_step
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn session(&self) -> &WorkflowSession {
        &self.session
    }

    pub fn selected_student(&self) -> Option<&Student> {
        self.selected_student.as_ref()
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Set by the registration gate once a durable patient exists. The gate
    /// is the only path that introduces a patient id.
    pub fn set_patient(&mut self, patient_id: String) {
        info!(patient_id = %patient_id, "Patient registered for session");
        self.session.patient_id = Some(patient_id);
        self.session.updated_at = Utc::now();
    }

    /// Adopt the store-assigned id after the first successful persist.
    pub fn set_session_id(&mut self, session_id: String) {
        self.session.session_id = Some(session_id);
    }

    /// Pick a patient from the roster: jumps straight to `ParentConsent`.
    /// Only valid while still at the appointment step; the patient record
    /// itself is not created yet (`patient_id` stays unset until the
    /// registration gate runs).
    pub fn select_patient(&mut self, student: Student) -> Result<ScreeningStep, WorkflowError> {
        self.reject_if_completed()?;
        if self.session.current_step != ScreeningStep::AppointmentSchedule {
            return Err(WorkflowError::SelectionUnavailable);
        }

        self.session.student_id = Some(student.id.clone());
        self.selected_student = Some(student);
        self.transition(ScreeningStep::ParentConsent, TransitionTrigger::PatientSelected);
        Ok(self.session.current_step)
    }

    /// Switch to a *different* patient mid-workflow. Destructive by design:
    /// unpersisted step data, the patient id, and the session identity are
    /// all discarded so the next save opens a fresh document. Callers must
    /// treat this as a distinct user action, never a side effect of browsing
    /// a roster.
    pub fn switch_patient(&mut self, student: Student) -> Result<ScreeningStep, WorkflowError> {
        self.reject_if_completed()?;

        warn!(
            previous_student = ?self.session.student_id,
            new_student = %student.id,
            discarded_steps = self.session.step_data.len(),
            "Switching patient; discarding unpersisted session state"
        );

        self.session.step_data.clear();
        self.session.patient_id = None;
        self.session.session_id = None;
        self.session.student_id = Some(student.id.clone());
        self.selected_student = Some(student);
        self.transition(ScreeningStep::ParentConsent, TransitionTrigger::PatientSwitched);
        Ok(self.session.current_step)
    }

    /// Record the current step's form state. Entries accumulate per step and
    /// survive backward navigation; recording again replaces only that
    /// step's entry.
    pub fn record_step(&mut self, data: StepData) -> Result<(), WorkflowError> {
        self.reject_if_completed()?;
        let entered = data.step();
        if entered != self.session.current_step {
            return Err(WorkflowError::StepMismatch {
                current: self.session.current_step,
                entered,
            });
        }
        self.session.step_data.record(data);
        self.session.updated_at = Utc::now();
        Ok(())
    }

    /// Move forward one step. Refused, with no state change, when the
    /// current step's form is missing or incomplete, or when leaving
    /// `StudentRegistration` without a registered patient.
    pub fn advance(&mut self) -> Result<ScreeningStep, WorkflowError> {
        self.reject_if_completed()?;
        let current = self.session.current_step;
        let next = current.next().ok_or(WorkflowError::AtFinalStep)?;

        self.validate_step_exit(current)?;

        if current == ScreeningStep::StudentRegistration && self.session.patient_id.is_none() {
            return Err(WorkflowError::RegistrationRequired);
        }

        self.transition(next, TransitionTrigger::Next);
        Ok(next)
    }

    /// Move back one step. Unconditional above step 0; captured data is
    /// never discarded.
    pub fn back(&mut self) -> Result<ScreeningStep, WorkflowError> {
        self.reject_if_completed()?;
        let prev = self
            .session
            .current_step
            .prev()
            .ok_or(WorkflowError::AtFirstStep)?;
        self.transition(prev, TransitionTrigger::Back);
        Ok(prev)
    }

    /// Everything that must hold before the terminal save may be attempted.
    /// Split from [`mark_completed`] so the controller can verify first,
    /// persist second, and flip the status only once the store accepted the
    /// terminal write.
    pub fn ensure_completable(&self) -> Result<(), WorkflowError> {
        if self.session.is_completed() {
            return Err(WorkflowError::SessionCompleted);
        }
        if !self.session.current_step.is_last() {
            return Err(WorkflowError::NotAtFinalStep);
        }
        if self.session.patient_id.is_none() {
            return Err(WorkflowError::RegistrationRequired);
        }
        self.validate_step_exit(self.session.current_step)
    }

    /// Flip the session into its terminal state. Only called after the
    /// terminal persistence call succeeded.
    pub fn mark_completed(&mut self) {
        let step = self.session.current_step;
        self.session.status = SessionStatus::Completed;
        self.session.updated_at = Utc::now();
        self.history.push(TransitionRecord {
            from: step,
            to: step,
            trigger: TransitionTrigger::Completed,
            at: Utc::now(),
        });
        info!(
            session_id = ?self.session.session_id,
            patient_id = ?self.session.patient_id,
            "Screening session completed"
        );
    }

    fn validate_step_exit(&self, step: ScreeningStep) -> Result<(), WorkflowError> {
        match self.session.step_data.get(step) {
            Some(data) => data
                .validate()
                .map_err(|reason| WorkflowError::InvalidStepData { step, reason }),
            None if step.requires_captured_data() => {
                Err(WorkflowError::MissingStepData { step })
            }
            None => Ok(()),
        }
    }

    fn reject_if_completed(&self) -> Result<(), WorkflowError> {
        if self.session.is_completed() {
            return Err(WorkflowError::SessionCompleted);
        }
        Ok(())
    }

    fn transition(&mut self, to: ScreeningStep, trigger: TransitionTrigger) {
        let from = self.session.current_step;
        self.session.current_step = to;
        self.session.updated_at = Utc::now();
        self.history.push(TransitionRecord {
            from,
            to,
            trigger,
            at: Utc::now(),
        });
        info!(
            from = %from,
            to = %to,
            trigger = ?trigger,
            session_id = ?self.session.session_id,
            "Workflow step transition"
        );
    }
}

impl Default for ScreeningWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
