// Screenflow Library - Vision Screening Workflow Coordination
// This exposes the workflow controller and service clients for the application shell

pub mod api;
pub mod config;
pub mod presence;
pub mod registration;
pub mod session;
pub mod telemetry;
pub mod types;
pub mod workflow;

// Re-export key types for easy access
pub use api::{
    ApiClient, ApiError, CredentialProvider, PatientsHandler, RetryConfig, SessionsHandler,
    StaticCredentials, StudentDirectory, StudentFilter,
};
pub use config::{config, init_config, ScreenflowConfig};
pub use presence::{BroadcastPresence, NoopPresence, PresenceNotifier, PresenceUpdate};
pub use registration::{
    PatientRegistry, RegistrationError, RegistrationGate, RestPatientRegistry, FALLBACK_EMAIL,
    FALLBACK_PHONE,
};
pub use session::{RestSessionStore, SessionStore, StoreError};
pub use telemetry::{
    create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
pub use types::{Patient, SessionStatus, Student, WorkflowSession};
pub use workflow::{
    ScreeningStep, ScreeningWorkflow, StepData, StepDataMap, TransitionRecord, TransitionTrigger,
    WorkflowController, WorkflowError, STEP_SEQUENCE,
};
