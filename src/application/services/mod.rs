//! Application services

pub mod session;

pub use session::{ConfigSession, SaveOptions, SaveOutcome, SessionState};
