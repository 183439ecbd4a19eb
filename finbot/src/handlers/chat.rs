//! Server-rendered chat page and its form endpoints.

use super::session::ChatSession;
use crate::dtos::{ChatForm, PreferencesForm, MAX_MESSAGE_CHARS};
use crate::models::{ExpertiseLevel, Preferences, Role, RiskTolerance, Turn};
use crate::services::markdown::render_markdown;
use crate::services::ChatError;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    response::{Html, Redirect},
    Form,
};
use service_core::error::AppError;
use tower_sessions::Session;

pub const PAGE_TITLE: &str = "FinBot AI";
pub const BROWSER_TITLE: &str = "FinBot: Your Finance Expert";
pub const PAGE_CAPTION: &str = "Professional Financial Guidance & Market Insights";
pub const INPUT_PLACEHOLDER: &str = "Ask me about stocks, savings, or taxes...";

pub struct TurnView {
    pub is_assistant: bool,
    pub label: &'static str,
    pub content: String,
    /// Rendered Markdown; only set for assistant turns.
    pub html: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::User => Self {
                is_assistant: false,
                label: "You",
                content: turn.content.clone(),
                html: String::new(),
            },
            Role::Assistant => Self {
                is_assistant: true,
                label: "FinBot",
                content: turn.content.clone(),
                html: render_markdown(&turn.content),
            },
        }
    }
}

pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub browser_title: &'static str,
    pub title: &'static str,
    pub caption: &'static str,
    pub placeholder: &'static str,
    pub max_message_chars: usize,
    pub halted_reason: Option<String>,
    pub error: Option<String>,
    pub turns: Vec<TurnView>,
    pub follow_ups: Vec<String>,
    pub risk_options: Vec<SelectOption>,
    pub expertise_options: Vec<SelectOption>,
    pub preferences_set: bool,
}

fn risk_options(current: Option<RiskTolerance>) -> Vec<SelectOption> {
    RiskTolerance::ALL
        .iter()
        .map(|r| SelectOption {
            value: r.key(),
            label: r.label(),
            selected: current == Some(*r),
        })
        .collect()
}

fn expertise_options(current: Option<ExpertiseLevel>) -> Vec<SelectOption> {
    ExpertiseLevel::ALL
        .iter()
        .map(|e| SelectOption {
            value: e.key(),
            label: e.label(),
            selected: current == Some(*e),
        })
        .collect()
}

fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let chat = ChatSession::new(session);
    let transcript = chat.transcript().await?;
    let preferences = chat.preferences().await?;
    let error = chat.take_flash_error().await?;
    let follow_ups = chat.follow_ups().await?;

    let template = IndexTemplate {
        browser_title: BROWSER_TITLE,
        title: PAGE_TITLE,
        caption: PAGE_CAPTION,
        placeholder: INPUT_PLACEHOLDER,
        max_message_chars: MAX_MESSAGE_CHARS,
        halted_reason: state.advisor.halted_reason().map(str::to_string),
        error,
        turns: transcript.turns().iter().map(TurnView::from).collect(),
        follow_ups,
        risk_options: risk_options(preferences.risk_tolerance),
        expertise_options: expertise_options(preferences.expertise_level),
        preferences_set: !preferences.is_empty(),
    };

    render(&template)
}

/// `POST /chat`
pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ChatForm>,
) -> Result<Redirect, AppError> {
    let chat = ChatSession::new(session);

    if form.message.chars().count() > MAX_MESSAGE_CHARS {
        chat.set_flash_error(&format!(
            "Messages are limited to {} characters.",
            MAX_MESSAGE_CHARS
        ))
        .await?;
        return Ok(Redirect::to("/"));
    }

    let mut transcript = chat.transcript().await?;
    let preferences = chat.preferences().await?;

    let result = state
        .advisor
        .respond(&mut transcript, &preferences, &form.message)
        .await;
    chat.save_transcript(&transcript).await?;

    match result {
        Ok(reply) => {
            chat.save_follow_ups(&reply.follow_ups).await?;
        }
        // Same as submitting an empty chat box: nothing happens.
        Err(ChatError::EmptyMessage) => {}
        // The page already shows the fatal banner.
        Err(ChatError::Halted(_)) => {}
        Err(e @ ChatError::Provider(_)) => {
            chat.save_follow_ups(&[]).await?;
            chat.set_flash_error(e.user_message()).await?;
        }
    }

    Ok(Redirect::to("/"))
}

/// `POST /preferences`
pub async fn update_preferences(
    session: Session,
    Form(form): Form<PreferencesForm>,
) -> Result<Redirect, AppError> {
    let preferences = Preferences::parse(&form.risk_tolerance, &form.expertise_level)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let chat = ChatSession::new(session);
    chat.save_preferences(&preferences).await?;

    tracing::info!(
        risk_tolerance = ?preferences.risk_tolerance,
        expertise_level = ?preferences.expertise_level,
        "Preferences updated"
    );

    Ok(Redirect::to("/"))
}

/// `POST /reset`
pub async fn reset(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    let chat = ChatSession::new(session);
    let mut transcript = chat.transcript().await?;

    state.advisor.reset(&mut transcript);
    chat.save_transcript(&transcript).await?;
    chat.save_follow_ups(&[]).await?;
    chat.clear_flash_error().await?;

    Ok(Redirect::to("/"))
}
