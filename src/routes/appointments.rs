/**
 * Appointment Routes
 * Session booking, slot lookup and appointment status changes
 */
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::appointments::{
    list_tab, validate_booking, Actor, Appointment, BookingError, BookingRequest, ListingTab,
    Perspective, Transition, AVAILABLE_TIMES, BOOKING_HORIZON_DAYS,
};
use crate::domain::gamification::{LedgerOutcome, PointAction};
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::points::award;
use crate::routes::therapists::TabQuery;
use crate::session::{Session, UserType};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub appointment: Appointment,
    pub points: Option<LedgerOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlotQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub time: &'static str,
    pub available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// POST /api/appointments - Book a session
pub async fn book(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let therapist_id = req.therapist_id.ok_or(BookingError::MissingTherapist)?;
    let therapist = state
        .data
        .get_therapist(therapist_id)
        .await?
        .ok_or(AppError::NotFound("therapist"))?;

    let new_appointment = validate_booking(session.user_id, &therapist, &req, Utc::now())?;
    let appointment = state.data.insert_appointment(new_appointment).await?;

    tracing::info!(
        user_id = %session.user_id,
        appointment_id = %appointment.id,
        therapist_id = %therapist.id,
        session_type = appointment.session_type.as_str(),
        "Appointment requested"
    );
    let points = award(&state, session.user_id, PointAction::AppointmentBooked).await;
    Ok((StatusCode::CREATED, Json(BookingResponse { appointment, points })))
}

/// GET /api/appointments?tab=upcoming|pending|past
pub async fn list_mine(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<TabQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let appointments = state.data.appointments_for_user(session.user_id).await?;
    Ok(Json(list_tab(
        appointments,
        query.tab.unwrap_or_default(),
        Perspective::Client,
        Utc::now(),
    )))
}

/// GET /api/appointments/slots?date=YYYY-MM-DD
pub async fn slots(ApiQuery(query): ApiQuery<SlotQuery>) -> Json<SlotsResponse> {
    let now = Utc::now();
    let today = now.date_naive();
    let latest = today + Duration::days(BOOKING_HORIZON_DAYS);
    let date = query.date.unwrap_or(today);
    let in_window = date >= today && date <= latest;

    let slots = AVAILABLE_TIMES
        .iter()
        .map(|time| {
            let starts_later = NaiveTime::parse_from_str(time, "%H:%M")
                .map(|t| date.and_time(t).and_utc() > now)
                .unwrap_or(false);
            Slot {
                time,
                available: in_window && starts_later,
            }
        })
        .collect();

    Json(SlotsResponse {
        date,
        earliest_date: today,
        latest_date: latest,
        slots,
    })
}

/// Works out whether the caller acts as the client or the therapist on
/// `appointment`. Strangers get a not-found.
async fn actor_for(
    state: &AppState,
    session: &Session,
    appointment: &Appointment,
) -> Result<Actor, AppError> {
    if session.user_type == UserType::Therapist {
        let own = state.data.therapist_for_user(session.user_id).await?;
        if own.is_some_and(|t| t.id == appointment.therapist_id) {
            return Ok(Actor::Therapist);
        }
    }
    if appointment.user_id == session.user_id {
        return Ok(Actor::Client);
    }
    Err(AppError::NotFound("appointment"))
}

/// POST /api/appointments/{id}/{action} - confirm, cancel or complete
pub async fn transition(
    State(state): State<AppState>,
    session: Session,
    ApiPath((id, action)): ApiPath<(Uuid, Transition)>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .data
        .get_appointment(id)
        .await?
        .ok_or(AppError::NotFound("appointment"))?;
    let actor = actor_for(&state, &session, &appointment).await?;

    let next = appointment.next_status(action, actor, Utc::now())?;
    let updated = state
        .data
        .update_appointment_status(id, appointment.status, next)
        .await?
        .ok_or_else(|| {
            tracing::warn!(appointment_id = %id, "Appointment changed during transition");
            AppError::Conflict("The appointment was updated by someone else. Reload and try again.".to_string())
        })?;

    tracing::info!(
        appointment_id = %id,
        user_id = %session.user_id,
        from = %appointment.status,
        to = %updated.status,
        "Appointment status changed"
    );
    Ok(Json(updated))
}
