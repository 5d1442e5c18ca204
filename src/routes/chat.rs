/**
 * Chat Routes
 * Assistant exchanges, reply feedback and message flagging
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::{exchange, ChatTurn, FLAG_REASONS, GREETING};
use crate::domain::gamification::{LedgerOutcome, PointAction};
use crate::domain::moderation::{validate_flag, ChatRule, FlagRequest, FlaggedMessage, CHAT_RULES};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::routes::points::award;
use crate::session::{MaybeSession, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message_id: Uuid,
    pub reply: String,
    pub fallback: bool,
    pub points: Option<LedgerOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub message_id: String,
    pub positive: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub recorded: bool,
    pub points: Option<LedgerOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRulesResponse {
    pub greeting: &'static str,
    pub rules: &'static [ChatRule],
    pub flag_reasons: &'static [&'static str],
}

/// POST /api/chat - One exchange with the assistant
pub async fn send_message(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let input = req.input.trim();
    if input.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }

    let result = exchange(state.chat.as_ref(), &req.history, input).await;

    // Failed completions earn nothing.
    let points = match (&session, result.fallback) {
        (Some(session), false) => award(&state, session.user_id, PointAction::ChatExchange).await,
        _ => None,
    };

    Ok(Json(ChatResponse {
        message_id: Uuid::new_v4(),
        reply: result.reply,
        fallback: result.fallback,
        points,
    }))
}

/// POST /api/chat/feedback
pub async fn send_feedback(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    tracing::info!(
        user_id = %session.user_id,
        message_id = %req.message_id,
        positive = req.positive,
        "Chat feedback received"
    );
    let points = if req.positive {
        award(&state, session.user_id, PointAction::PositiveFeedback).await
    } else {
        None
    };
    Json(FeedbackResponse {
        recorded: true,
        points,
    })
}

/// POST /api/chat/flag - Report a message to the moderators
pub async fn flag_message(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<FlagRequest>,
) -> Result<(StatusCode, Json<FlaggedMessage>), AppError> {
    let new_flag = validate_flag(session.user_id, &session.display_name(), &req)?;
    let flag = state.data.insert_flag(new_flag).await?;

    tracing::info!(
        user_id = %session.user_id,
        flag_id = %flag.id,
        reason = %flag.reason,
        "Message flagged for review"
    );
    Ok((StatusCode::CREATED, Json(flag)))
}

/// GET /api/chat/rules
pub async fn chat_rules() -> Json<ChatRulesResponse> {
    Json(ChatRulesResponse {
        greeting: GREETING,
        rules: CHAT_RULES,
        flag_reasons: FLAG_REASONS,
    })
}
