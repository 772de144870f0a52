pub mod store;

pub use store::{RestSessionStore, SessionStore, StoreError};
