//! HTTP handlers for the FinBot service.

pub mod api;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod session;
