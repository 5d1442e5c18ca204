/**
 * Therapist Routes
 * Public therapist directory and the therapist's own portal
 */
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::fixtures::sample_therapists;
use crate::domain::appointments::{list_tab, Appointment, ListingTab, Perspective};
use crate::domain::directory::{
    facets, filter_directory, validate_application, DirectoryFilter, Facets, SessionFilter,
    Therapist, TherapistApplication,
};
use crate::domain::stats::{therapist_stats, TherapistStats};
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    /// Comma-separated.
    pub specialties: Option<String>,
    /// Comma-separated.
    pub languages: Option<String>,
    pub session: Option<SessionFilter>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl From<DirectoryQuery> for DirectoryFilter {
    fn from(query: DirectoryQuery) -> Self {
        DirectoryFilter {
            specialties: split_list(query.specialties.as_deref()),
            languages: split_list(query.languages.as_deref()),
            search: query.search,
            session: query.session.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryResponse {
    pub therapists: Vec<Therapist>,
    pub facets: Facets,
    pub active_filters: usize,
    /// Set when the listing came from the sample set because the data
    /// source failed.
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub therapist: Therapist,
    pub approved: bool,
    pub stats: TherapistStats,
    pub pending_requests: Vec<Appointment>,
    pub upcoming_sessions: Vec<Appointment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TabQuery {
    pub tab: Option<ListingTab>,
}

/// GET /api/therapists
pub async fn list_therapists(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DirectoryQuery>,
) -> Json<DirectoryResponse> {
    let filter = DirectoryFilter::from(query);

    let (all, fallback) = match state.data.list_therapists().await {
        Ok(therapists) => (therapists, false),
        Err(e) => {
            tracing::warn!(error = %e, "Therapist directory unavailable, serving sample set");
            (sample_therapists(Utc::now()), true)
        }
    };
    let approved: Vec<Therapist> = all.into_iter().filter(|t| t.approved).collect();

    Json(DirectoryResponse {
        therapists: filter_directory(&approved, &filter),
        facets: facets(&approved),
        active_filters: filter.active_count(),
        fallback,
    })
}

/// GET /api/therapists/{id}
pub async fn get_therapist(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Therapist>, AppError> {
    state
        .data
        .get_therapist(id)
        .await?
        .filter(|t| t.approved)
        .map(Json)
        .ok_or(AppError::NotFound("therapist"))
}

/// POST /api/therapist/profile - Therapist onboarding
pub async fn create_therapist_profile(
    State(state): State<AppState>,
    session: Session,
    ApiJson(application): ApiJson<TherapistApplication>,
) -> Result<(StatusCode, Json<Therapist>), AppError> {
    session.require_therapist()?;
    let new_therapist = validate_application(session.user_id, &application)?;
    let therapist = state.data.create_therapist(new_therapist).await?;

    tracing::info!(
        user_id = %session.user_id,
        therapist_id = %therapist.id,
        "Therapist profile submitted for approval"
    );
    Ok((StatusCode::CREATED, Json(therapist)))
}

async fn own_therapist(state: &AppState, session: &Session) -> Result<Therapist, AppError> {
    session.require_therapist()?;
    state
        .data
        .therapist_for_user(session.user_id)
        .await?
        .ok_or(AppError::NotFound("therapist profile"))
}

/// GET /api/therapist/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardResponse>, AppError> {
    let therapist = own_therapist(&state, &session).await?;
    let appointments = state.data.appointments_for_therapist(therapist.id).await?;
    let now = Utc::now();

    Ok(Json(DashboardResponse {
        approved: therapist.approved,
        stats: therapist_stats(&appointments, now),
        pending_requests: list_tab(appointments.clone(), ListingTab::Pending, Perspective::Therapist, now),
        upcoming_sessions: list_tab(appointments, ListingTab::Upcoming, Perspective::Therapist, now),
        therapist,
    }))
}

/// GET /api/therapist/appointments?tab=upcoming|pending|past
pub async fn therapist_appointments(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<TabQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let therapist = own_therapist(&state, &session).await?;
    let appointments = state.data.appointments_for_therapist(therapist.id).await?;
    Ok(Json(list_tab(
        appointments,
        query.tab.unwrap_or_default(),
        Perspective::Therapist,
        Utc::now(),
    )))
}
