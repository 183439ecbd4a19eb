//! JSON chat API sharing the page's session state.

use super::session::ChatSession;
use crate::dtos::{ChatRequest, ChatResponse, TranscriptResponse, TurnDto};
use crate::services::ChatError;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    payload.validate()?;

    let chat = ChatSession::new(session);
    let mut transcript = chat.transcript().await?;
    let stored = chat.preferences().await?;
    let preferences = payload.apply_preferences(stored);
    if preferences != stored {
        chat.save_preferences(&preferences).await?;
    }

    let result = state
        .advisor
        .respond(&mut transcript, &preferences, &payload.message)
        .await;

    chat.save_transcript(&transcript).await?;

    let reply = match result {
        Ok(reply) => reply,
        Err(err @ ChatError::Provider(_)) => {
            // Keep the user turn even though the response is a 502.
            chat.save_follow_ups(&[]).await?;
            chat.flush().await?;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    chat.save_follow_ups(&reply.follow_ups).await?;

    Ok(Json(ChatResponse {
        reply: reply.text,
        follow_ups: reply.follow_ups,
        turns: transcript.len(),
    }))
}

/// `GET /api/transcript`
pub async fn get_transcript(session: Session) -> Result<Json<TranscriptResponse>, AppError> {
    let chat = ChatSession::new(session);
    let transcript = chat.transcript().await?;
    let preferences = chat.preferences().await?;

    Ok(Json(TranscriptResponse {
        turns: transcript.turns().iter().map(TurnDto::from).collect(),
        preferences,
    }))
}

/// `DELETE /api/transcript`
pub async fn reset_transcript(
    State(state): State<AppState>,
    session: Session,
) -> Result<StatusCode, AppError> {
    let chat = ChatSession::new(session);
    let mut transcript = chat.transcript().await?;

    state.advisor.reset(&mut transcript);
    chat.save_transcript(&transcript).await?;
    chat.save_follow_ups(&[]).await?;

    Ok(StatusCode::NO_CONTENT)
}
