//! Typed access to the per-visitor chat state kept in the HTTP session.

use crate::models::{Preferences, Transcript};
use serde::{de::DeserializeOwned, Serialize};
use service_core::error::AppError;
use tower_sessions::Session;

const TRANSCRIPT_KEY: &str = "transcript";
const PREFERENCES_KEY: &str = "preferences";
const FLASH_ERROR_KEY: &str = "flash_error";
const SUGGESTIONS_KEY: &str = "follow_ups";

pub struct ChatSession {
    session: Session,
}

impl ChatSession {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn transcript(&self) -> Result<Transcript, AppError> {
        self.get(TRANSCRIPT_KEY).await
    }

    pub async fn save_transcript(&self, transcript: &Transcript) -> Result<(), AppError> {
        self.insert(TRANSCRIPT_KEY, transcript).await
    }

    pub async fn preferences(&self) -> Result<Preferences, AppError> {
        self.get(PREFERENCES_KEY).await
    }

    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<(), AppError> {
        self.insert(PREFERENCES_KEY, preferences).await
    }

    pub async fn follow_ups(&self) -> Result<Vec<String>, AppError> {
        self.get(SUGGESTIONS_KEY).await
    }

    pub async fn save_follow_ups(&self, follow_ups: &[String]) -> Result<(), AppError> {
        self.insert(SUGGESTIONS_KEY, follow_ups).await
    }

    pub async fn set_flash_error(&self, message: &str) -> Result<(), AppError> {
        self.insert(FLASH_ERROR_KEY, message).await
    }

    /// Read and clear the error left by the previous interaction.
    pub async fn take_flash_error(&self) -> Result<Option<String>, AppError> {
        self.session
            .remove::<String>(FLASH_ERROR_KEY)
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))
    }

    pub async fn clear_flash_error(&self) -> Result<(), AppError> {
        self.take_flash_error().await.map(|_| ())
    }

    /// Write the session to the store now. The session layer does not save
    /// on 5xx responses.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.session
            .save()
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))
    }

    async fn get<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, AppError> {
        self.session
            .get::<T>(key)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| AppError::SessionError(e.to_string()))
    }

    async fn insert<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        self.session
            .insert(key, value)
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))
    }
}
