//! Domain models for the FinBot service.

pub mod preferences;
pub mod transcript;
pub mod turn;

pub use preferences::{ExpertiseLevel, Preferences, RiskTolerance};
pub use transcript::Transcript;
pub use turn::{Role, Turn};
