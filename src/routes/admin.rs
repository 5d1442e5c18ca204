/**
 * Admin Routes
 * Dashboard statistics for administrators
 */
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::stats::{
    activity_distribution, daily_series, period_changes, ActivityShare, Changes, DailyActivity,
    OverviewCounts, StatsTimeframe,
};
use crate::error::AppError;
use crate::extract::{ApiQuery};
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub timeframe: Option<StatsTimeframe>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub timeframe: StatsTimeframe,
    pub overview: OverviewCounts,
    pub distribution: Vec<ActivityShare>,
    /// Oldest first, one point per day.
    pub daily: Vec<DailyActivity>,
    /// Percentage change against the previous window of the same length.
    pub changes: Changes,
}

/// GET /api/admin/stats?timeframe=day|week|month
pub async fn stats(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    session.require_admin()?;
    let timeframe = query.timeframe.unwrap_or_default();
    let days = timeframe.days();
    let today = Utc::now().date_naive();

    let overview = state.data.overview_counts().await?;
    // Two windows so the change figures have something to compare against.
    let since = today - Duration::days(days * 2 - 1);
    let rows = state.data.daily_activity(since).await?;

    Ok(Json(StatsResponse {
        timeframe,
        distribution: activity_distribution(&overview),
        daily: daily_series(&rows, today, days),
        changes: period_changes(&rows, today, days),
        overview,
    }))
}
