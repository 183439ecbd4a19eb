pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use services::Advisor;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<Advisor>,
}

impl AppState {
    pub fn new(advisor: Advisor) -> Self {
        Self {
            advisor: Arc::new(advisor),
        }
    }
}
