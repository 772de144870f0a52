//! The screening workflow: step sequencer, captured step data, and the
//! controller that ties the sequencer to the registration gate, the session
//! store, and the advisory presence channel.

pub mod state_machine;
pub mod step_data;
pub mod steps;

pub use state_machine::{
    ScreeningWorkflow, TransitionRecord, TransitionTrigger, WorkflowError,
};
pub use step_data::{
    AcuityReading, AppointmentData, ConsentData, DeliveryData, DeliveryMethod, DiagnosisData,
    GlassesData, InventoryData, Prescription, RegistrationData, StepData, StepDataMap,
    VisualAcuityData,
};
pub use steps::{ScreeningStep, STEP_SEQUENCE};

use chrono::Utc;
use tracing::{debug, info};

use crate::presence::{PresenceNotifier, PresenceUpdate};
use crate::registration::RegistrationGate;
use crate::session::SessionStore;
use crate::types::{SessionStatus, WorkflowSession};

/// Orchestrates one operator's screening session end to end.
///
/// The controller owns the pure sequencer and wires its guarded transitions
/// to the async collaborators: the registration gate runs before the
/// sequencer may leave `StudentRegistration`, saves go through the session
/// store with bounded retry, and every step change is announced on the
/// presence channel without ever waiting on it.
///
/// One operation at a time: a busy flag refuses overlapping `next` / `save`
/// / `complete` submissions so a double-click can never create two session
/// documents. In-flight saves and registrations always run to completion;
/// nothing here aborts a write midway.
pub struct WorkflowController {
    machine: ScreeningWorkflow,
    gate: RegistrationGate,
    store: Box<dyn SessionStore>,
    presence: Box<dyn PresenceNotifier>,
    operator: String,
    in_flight: bool,
}

impl WorkflowController {
    /// Controller for a brand-new session at the appointment step.
    pub fn new(
        gate: RegistrationGate,
        store: Box<dyn SessionStore>,
        presence: Box<dyn PresenceNotifier>,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            machine: ScreeningWorkflow::new(),
            gate,
            store,
            presence,
            operator: operator.into(),
            in_flight: false,
        }
    }

    /// Resume an interrupted session: loads the document and reattaches the
    /// sequencer at exactly the persisted step.
    pub async fn resume(
        gate: RegistrationGate,
        store: Box<dyn SessionStore>,
        presence: Box<dyn PresenceNotifier>,
        operator: impl Into<String>,
        session_id: &str,
    ) -> Result<Self, WorkflowError> {
        let session = store.load_session(session_id).await?;
        let controller = Self {
            machine: ScreeningWorkflow::from_session(session),
            gate,
            store,
            presence,
            operator: operator.into(),
            in_flight: false,
        };
        controller.announce();
        Ok(controller)
    }

    pub fn current_step(&self) -> ScreeningStep {
        self.machine.current_step()
    }

    pub fn status(&self) -> SessionStatus {
        self.machine.status()
    }

    pub fn session(&self) -> &WorkflowSession {
        self.machine.session()
    }

    pub fn history(&self) -> &[TransitionRecord] {
        self.machine.history()
    }

    /// Whether a network operation for this session is still in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Pick a patient from the roster; jumps to the consent step. The
    /// patient record is not created yet; that happens at the
    /// registration gate.
    pub fn select_patient(
        &mut self,
        student: crate::types::Student,
    ) -> Result<ScreeningStep, WorkflowError> {
        let step = self.machine.select_patient(student)?;
        self.announce();
        Ok(step)
    }

    /// Switch to a *different* patient mid-workflow. Destructive: discards
    /// unpersisted step data and the session identity. Must be driven by a
    /// deliberate user action, not roster browsing.
    pub fn switch_patient(
        &mut self,
        student: crate::types::Student,
    ) -> Result<ScreeningStep, WorkflowError> {
        let step = self.machine.switch_patient(student)?;
        self.announce();
        Ok(step)
    }

    /// Record the current step's form state. Local only; nothing is sent.
    pub fn record_step(&mut self, data: StepData) -> Result<(), WorkflowError> {
        self.machine.record_step(data)
    }

    /// Go back one step. Never touches captured data, never hits the
    /// network.
    pub fn back(&mut self) -> Result<ScreeningStep, WorkflowError> {
        let step = self.machine.back()?;
        self.announce();
        Ok(step)
    }

    /// Move forward one step. Leaving `StudentRegistration` runs the
    /// registration gate first; on gate failure the step does not change
    /// and everything entered so far is retained for a retry.
    pub async fn next(&mut self) -> Result<ScreeningStep, WorkflowError> {
        self.reject_if_busy()?;

        if self.machine.current_step() == ScreeningStep::StudentRegistration
            && self.machine.session().patient_id.is_none()
        {
            let student = self
                .machine
                .selected_student()
                .cloned()
                .ok_or(WorkflowError::NoPatientSelected)?;

            self.in_flight = true;
            let gated = self.gate.ensure_patient(&student).await;
            self.in_flight = false;

            let patient = gated?;
            self.machine.set_patient(patient.id);
        }

        let step = self.machine.advance()?;
        self.announce();
        Ok(step)
    }

    /// Checkpoint the session. First save creates the document and adopts
    /// the store-assigned id; every later save updates it. Safe to call
    /// repeatedly at the same step.
    pub async fn save_progress(&mut self) -> Result<(), WorkflowError> {
        self.reject_if_busy()?;

        self.in_flight = true;
        let saved = self.store.save_progress(self.machine.session()).await;
        self.in_flight = false;

        let stored = saved?;
        if self.machine.session().session_id.is_none() {
            if let Some(id) = stored.session_id {
                debug!(session_id = %id, "Adopted store-assigned session id");
                self.machine.set_session_id(id);
            }
        }
        Ok(())
    }

    /// Finish the session from the final step. The terminal save runs
    /// first; only its success flips the session to `completed`. Calling
    /// again afterwards is a no-op; no second completion is recorded.
    pub async fn complete(&mut self) -> Result<(), WorkflowError> {
        if self.machine.status() == SessionStatus::Completed {
            info!(
                session_id = ?self.machine.session().session_id,
                "Completion requested again; session already completed"
            );
            return Ok(());
        }

        self.machine.ensure_completable()?;
        self.reject_if_busy()?;

        self.in_flight = true;
        let completed = self.store.complete_session(self.machine.session()).await;
        self.in_flight = false;

        let stored = completed?;
        if self.machine.session().session_id.is_none() {
            if let Some(id) = stored.session_id {
                self.machine.set_session_id(id);
            }
        }
        self.machine.mark_completed();
        self.announce();
        Ok(())
    }

    fn reject_if_busy(&self) -> Result<(), WorkflowError> {
        if self.in_flight {
            return Err(WorkflowError::OperationInFlight);
        }
        Ok(())
    }

    /// Advisory broadcast of where this operator is. Never awaited, never
    /// allowed to fail the workflow.
    fn announce(&self) {
        self.presence.publish(PresenceUpdate {
            operator: self.operator.clone(),
            step: self.machine.current_step(),
            patient_id: self.machine.session().patient_id.clone(),
            at: Utc::now(),
        });
    }
}
