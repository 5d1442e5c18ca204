/**
 * Mood Routes
 * Mood entries and their aggregated summary
 */
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::data::fixtures::sample_mood_entries;
use crate::domain::gamification::{LedgerOutcome, PointAction};
use crate::domain::mood::{summarize, validate_mood, MoodEntry, MoodSummary, Timeframe};
use crate::error::AppError;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::points::award;
use crate::session::{MaybeSession, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodRequest {
    pub mood_value: i32,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCreated {
    pub entry: MoodEntry,
    pub points: Option<LedgerOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MoodQuery {
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodResponse {
    pub sample: bool,
    #[serde(flatten)]
    pub summary: MoodSummary,
}

/// POST /api/mood
pub async fn record_mood(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<MoodRequest>,
) -> Result<(StatusCode, Json<MoodCreated>), AppError> {
    let new_entry = validate_mood(session.user_id, req.mood_value, req.note.as_deref())?;
    let entry = state.data.insert_mood(new_entry).await?;
    tracing::info!(user_id = %session.user_id, mood = entry.mood_value, "Mood recorded");

    let points = award(&state, session.user_id, PointAction::MoodEntry).await;
    Ok((StatusCode::CREATED, Json(MoodCreated { entry, points })))
}

/// GET /api/mood?timeframe=day|week|month|year
pub async fn list_moods(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiQuery(query): ApiQuery<MoodQuery>,
) -> Result<Json<MoodResponse>, AppError> {
    let timeframe = query.timeframe.unwrap_or_default();
    let now = Utc::now();

    let (entries, sample) = match session {
        Some(session) => (
            state
                .data
                .list_moods(session.user_id, timeframe.window_start(now))
                .await?,
            false,
        ),
        None => (sample_mood_entries(now), true),
    };

    Ok(Json(MoodResponse {
        sample,
        summary: summarize(&entries, timeframe, now),
    }))
}
