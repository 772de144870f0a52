pub mod client;
pub mod error;
pub mod patients;
pub mod retry;
pub mod sessions;
pub mod students;

pub use client::{ApiClient, CredentialProvider, StaticCredentials};
pub use error::ApiError;
pub use patients::{PatientsHandler, RegisterFromStudent};
pub use retry::{retry_with_backoff, RetryConfig};
pub use sessions::SessionsHandler;
pub use students::{StudentDirectory, StudentFilter};
