pub mod advisor;
pub mod markdown;
pub mod metrics;
pub mod prompt;
pub mod providers;

pub use advisor::{Advisor, ChatError, ProviderState, Reply};
pub use prompt::PromptBuilder;
