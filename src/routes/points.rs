/**
 * Points Routes
 * Gamification ledger view and the grant helper the other routes share
 */
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::data::fixtures::sample_ledger;
use crate::data::LedgerSnapshot;
use crate::domain::gamification::{
    AchievementView, LedgerOutcome, PointAction, POINTS_PER_LEVEL,
};
use crate::error::AppError;
use crate::session::MaybeSession;
use crate::state::AppState;

/// Grants `action` to `user_id`. A failing ledger never fails the action
/// that earned the points, so errors are logged and swallowed here.
pub(crate) async fn award(
    state: &AppState,
    user_id: Uuid,
    action: PointAction,
) -> Option<LedgerOutcome> {
    match state.data.record_activity(user_id, action, Utc::now()).await {
        Ok(outcome) => {
            if let Some(level_up) = &outcome.level_up {
                tracing::info!(user_id = %user_id, from = level_up.from, to = level_up.to, "Level up");
            }
            for achievement in &outcome.unlocked {
                tracing::info!(user_id = %user_id, achievement = achievement.id, "Achievement unlocked");
            }
            tracing::debug!(
                user_id = %user_id,
                action = action.as_str(),
                awarded = outcome.points_awarded,
                total = outcome.total_points,
                "Points granted"
            );
            Some(outcome)
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, action = action.as_str(), error = %e, "Failed to update points ledger");
            None
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsResponse {
    pub sample: bool,
    pub total_points: i64,
    pub level: i64,
    /// Points gathered since the current level started.
    pub level_progress: i64,
    pub next_level_at: i64,
    pub streak_days: i32,
    pub achievements: Vec<AchievementView>,
}

impl PointsResponse {
    fn from_snapshot(snapshot: LedgerSnapshot, sample: bool) -> Self {
        let points = snapshot.points;
        let total = points.total_points.max(0);
        Self {
            sample,
            total_points: points.total_points,
            level: points.level,
            level_progress: total % POINTS_PER_LEVEL,
            next_level_at: points.level * POINTS_PER_LEVEL,
            streak_days: points.effective_streak(Utc::now().date_naive()),
            achievements: snapshot.achievements,
        }
    }
}

/// GET /api/points
pub async fn get_points(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<PointsResponse>, AppError> {
    let Some(session) = session else {
        return Ok(Json(PointsResponse::from_snapshot(sample_ledger(Utc::now()), true)));
    };
    let snapshot = state.data.ledger(session.user_id).await?;
    Ok(Json(PointsResponse::from_snapshot(snapshot, false)))
}
