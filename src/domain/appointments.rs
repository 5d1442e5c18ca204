//! Appointment booking rules and the status state machine.
//!
//! ```text
//! pending ──confirm──▶ confirmed ──complete──▶ completed
//!    │                     │
//!    └──────cancel─────────┴──────▶ cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::directory::Therapist;

/// Bookable start times, UTC.
pub const AVAILABLE_TIMES: &[&str] = &[
    "09:00", "10:00", "11:00", "12:00", "14:00", "15:00", "16:00", "17:00",
];

/// How far ahead a session can be requested.
pub const BOOKING_HORIZON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(format!("unknown appointment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Online,
    InPerson,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Online => "online",
            SessionType::InPerson => "in_person",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(SessionType::Online),
            "in_person" => Ok(SessionType::InPerson),
            other => Err(format!("unknown session type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub therapist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated booking, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub user_id: Uuid,
    pub therapist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub session_type: SessionType,
    pub notes: Option<String>,
}

/// Raw booking form as submitted by a user.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub therapist_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub session_type: Option<SessionType>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("Please select a therapist")]
    MissingTherapist,
    #[error("Please select a date and time for your appointment")]
    MissingDateOrTime,
    #[error("Time slot '{0}' is not available")]
    UnknownTimeSlot(String),
    #[error("Appointments cannot be booked in the past")]
    InThePast,
    #[error("Appointments can be booked at most 30 days ahead")]
    BeyondHorizon,
    #[error("This therapist does not offer {0} sessions")]
    SessionTypeNotOffered(&'static str),
    #[error("This therapist is not accepting bookings")]
    TherapistNotApproved,
}

/// Validates a booking against the fixed slot list, the booking window and
/// the modes the therapist offers.
pub fn validate_booking(
    user_id: Uuid,
    therapist: &Therapist,
    request: &BookingRequest,
    now: DateTime<Utc>,
) -> Result<NewAppointment, BookingError> {
    let (date, time) = match (request.date, request.time.as_deref()) {
        (Some(date), Some(time)) if !time.trim().is_empty() => (date, time.trim()),
        _ => return Err(BookingError::MissingDateOrTime),
    };

    if !AVAILABLE_TIMES.contains(&time) {
        return Err(BookingError::UnknownTimeSlot(time.to_string()));
    }
    let slot = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| BookingError::UnknownTimeSlot(time.to_string()))?;

    let today = now.date_naive();
    if date < today {
        return Err(BookingError::InThePast);
    }
    if date > today + Duration::days(BOOKING_HORIZON_DAYS) {
        return Err(BookingError::BeyondHorizon);
    }

    let appointment_date = date.and_time(slot).and_utc();
    if appointment_date <= now {
        return Err(BookingError::InThePast);
    }

    if !therapist.approved {
        return Err(BookingError::TherapistNotApproved);
    }

    let session_type = match request.session_type {
        Some(SessionType::Online) if !therapist.online => {
            return Err(BookingError::SessionTypeNotOffered("online"))
        }
        Some(SessionType::InPerson) if !therapist.in_person => {
            return Err(BookingError::SessionTypeNotOffered("in-person"))
        }
        Some(kind) => kind,
        None if therapist.online => SessionType::Online,
        None if therapist.in_person => SessionType::InPerson,
        None => return Err(BookingError::SessionTypeNotOffered("any")),
    };

    let notes = request
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(NewAppointment {
        user_id,
        therapist_id: therapist.id,
        appointment_date,
        session_type,
        notes,
    })
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Client,
    Therapist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Confirm,
    Cancel,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot {action:?} an appointment that is {from}")]
    InvalidEdge {
        from: AppointmentStatus,
        action: Transition,
    },
    #[error("Only the therapist can {0:?} an appointment")]
    NotPermitted(Transition),
    #[error("An appointment can only be completed after it has taken place")]
    NotYetHeld,
}

impl Appointment {
    /// Computes the status `action` leads to without mutating anything.
    pub fn next_status(
        &self,
        action: Transition,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<AppointmentStatus, TransitionError> {
        use AppointmentStatus::*;

        match action {
            Transition::Confirm | Transition::Complete if actor != Actor::Therapist => {
                return Err(TransitionError::NotPermitted(action))
            }
            _ => {}
        }

        match (self.status, action) {
            (Pending, Transition::Confirm) => Ok(Confirmed),
            (Pending | Confirmed, Transition::Cancel) => Ok(Cancelled),
            (Confirmed, Transition::Complete) => {
                if self.appointment_date < now {
                    Ok(Completed)
                } else {
                    Err(TransitionError::NotYetHeld)
                }
            }
            (from, action) => Err(TransitionError::InvalidEdge { from, action }),
        }
    }
}

/// Listing tabs. Users see `Upcoming`/`Past`; therapists additionally split
/// out `Pending` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingTab {
    #[default]
    Upcoming,
    Pending,
    Past,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    Client,
    Therapist,
}

pub fn is_upcoming(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    match appointment.status {
        AppointmentStatus::Pending => true,
        AppointmentStatus::Confirmed => appointment.appointment_date >= now,
        _ => false,
    }
}

pub fn is_past(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    match appointment.status {
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => true,
        AppointmentStatus::Confirmed => appointment.appointment_date < now,
        AppointmentStatus::Pending => false,
    }
}

/// Selects and orders the appointments shown on `tab`.
pub fn list_tab(
    mut appointments: Vec<Appointment>,
    tab: ListingTab,
    perspective: Perspective,
    now: DateTime<Utc>,
) -> Vec<Appointment> {
    match (tab, perspective) {
        (ListingTab::Upcoming, Perspective::Client) => {
            appointments.retain(|a| is_upcoming(a, now));
            appointments.sort_by_key(|a| a.appointment_date);
        }
        (ListingTab::Upcoming, Perspective::Therapist) => {
            appointments.retain(|a| {
                a.status == AppointmentStatus::Confirmed && a.appointment_date >= now
            });
            appointments.sort_by_key(|a| a.appointment_date);
        }
        (ListingTab::Pending, _) => {
            appointments.retain(|a| a.status == AppointmentStatus::Pending);
            appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        (ListingTab::Past, _) => {
            appointments.retain(|a| is_past(a, now));
            appointments.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
        }
    }
    appointments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap()
    }

    fn therapist(online: bool, in_person: bool) -> Therapist {
        Therapist {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Dr. Test".to_string(),
            title: "Counselor".to_string(),
            specialties: vec!["Anxiety".to_string()],
            languages: vec!["English".to_string()],
            location: "Arusha".to_string(),
            bio: None,
            education: None,
            price: None,
            online,
            in_person,
            rating: 4.5,
            reviews: 3,
            image_url: None,
            approved: true,
            created_at: now(),
        }
    }

    fn request(date: NaiveDate, time: &str) -> BookingRequest {
        BookingRequest {
            therapist_id: None,
            date: Some(date),
            time: Some(time.to_string()),
            session_type: None,
            notes: None,
        }
    }

    fn appointment(status: AppointmentStatus, date: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            therapist_id: Uuid::new_v4(),
            appointment_date: date,
            status,
            session_type: SessionType::Online,
            notes: None,
            created_at: now() - Duration::days(3),
        }
    }

    #[test]
    fn test_booking_tomorrow_with_listed_slot_succeeds() {
        let t = therapist(true, true);
        let tomorrow = now().date_naive() + Duration::days(1);
        let booked = validate_booking(Uuid::new_v4(), &t, &request(tomorrow, "10:00"), now())
            .expect("booking should be accepted");
        assert_eq!(booked.therapist_id, t.id);
        assert_eq!(booked.session_type, SessionType::Online);
        assert_eq!(
            booked.appointment_date,
            Utc.with_ymd_and_hms(2024, 5, 11, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_booking_in_the_past_is_rejected() {
        let t = therapist(true, true);
        let yesterday = now().date_naive() - Duration::days(1);
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &request(yesterday, "10:00"), now()),
            Err(BookingError::InThePast)
        );
    }

    #[test]
    fn test_booking_earlier_slot_today_is_rejected() {
        let t = therapist(true, true);
        let today = now().date_naive();
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &request(today, "08:00"), now()),
            Err(BookingError::UnknownTimeSlot("08:00".to_string()))
        );
        assert!(validate_booking(Uuid::new_v4(), &t, &request(today, "09:00"), now()).is_ok());
    }

    #[test]
    fn test_booking_beyond_thirty_days_is_rejected() {
        let t = therapist(true, true);
        let far = now().date_naive() + Duration::days(31);
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &request(far, "10:00"), now()),
            Err(BookingError::BeyondHorizon)
        );
        let edge = now().date_naive() + Duration::days(30);
        assert!(validate_booking(Uuid::new_v4(), &t, &request(edge, "10:00"), now()).is_ok());
    }

    #[test]
    fn test_booking_without_time_is_rejected() {
        let t = therapist(true, true);
        let mut req = request(now().date_naive() + Duration::days(2), "");
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &req, now()),
            Err(BookingError::MissingDateOrTime)
        );
        req.time = Some("10:00".to_string());
        req.date = None;
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &req, now()),
            Err(BookingError::MissingDateOrTime)
        );
    }

    #[test]
    fn test_session_type_is_constrained_to_offered_modes() {
        let online_only = therapist(true, false);
        let mut req = request(now().date_naive() + Duration::days(1), "14:00");
        req.session_type = Some(SessionType::InPerson);
        assert_eq!(
            validate_booking(Uuid::new_v4(), &online_only, &req, now()),
            Err(BookingError::SessionTypeNotOffered("in-person"))
        );

        let in_person_only = therapist(false, true);
        req.session_type = None;
        let booked = validate_booking(Uuid::new_v4(), &in_person_only, &req, now()).unwrap();
        assert_eq!(booked.session_type, SessionType::InPerson);
    }

    #[test]
    fn test_unapproved_therapist_cannot_be_booked() {
        let mut t = therapist(true, true);
        t.approved = false;
        let req = request(now().date_naive() + Duration::days(1), "14:00");
        assert_eq!(
            validate_booking(Uuid::new_v4(), &t, &req, now()),
            Err(BookingError::TherapistNotApproved)
        );
    }

    #[test]
    fn test_state_machine_edges() {
        use AppointmentStatus::*;
        let future = now() + Duration::days(2);
        let past = now() - Duration::days(2);

        let pending = appointment(Pending, future);
        assert_eq!(
            pending.next_status(Transition::Confirm, Actor::Therapist, now()),
            Ok(Confirmed)
        );
        assert_eq!(
            pending.next_status(Transition::Cancel, Actor::Client, now()),
            Ok(Cancelled)
        );
        assert!(matches!(
            appointment(Pending, past).next_status(Transition::Complete, Actor::Therapist, now()),
            Err(TransitionError::InvalidEdge { .. })
        ));

        let confirmed_past = appointment(Confirmed, past);
        assert_eq!(
            confirmed_past.next_status(Transition::Complete, Actor::Therapist, now()),
            Ok(Completed)
        );
        assert_eq!(
            appointment(Confirmed, future).next_status(Transition::Complete, Actor::Therapist, now()),
            Err(TransitionError::NotYetHeld)
        );
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [AppointmentStatus::Cancelled, AppointmentStatus::Completed] {
            let a = appointment(status, now() - Duration::days(1));
            for action in [Transition::Confirm, Transition::Cancel, Transition::Complete] {
                assert!(
                    a.next_status(action, Actor::Therapist, now()).is_err(),
                    "{status} must not accept {action:?}"
                );
            }
        }
    }

    #[test]
    fn test_only_therapist_confirms_or_completes() {
        let a = appointment(AppointmentStatus::Pending, now() + Duration::days(1));
        assert_eq!(
            a.next_status(Transition::Confirm, Actor::Client, now()),
            Err(TransitionError::NotPermitted(Transition::Confirm))
        );
    }

    #[test]
    fn test_listing_tabs_partition_and_order() {
        use AppointmentStatus::*;
        let soon = appointment(Confirmed, now() + Duration::days(1));
        let later = appointment(Pending, now() + Duration::days(5));
        let missed = appointment(Confirmed, now() - Duration::days(1));
        let done = appointment(Completed, now() - Duration::days(10));
        let dropped = appointment(Cancelled, now() + Duration::days(3));
        let all = vec![
            done.clone(),
            later.clone(),
            dropped.clone(),
            soon.clone(),
            missed.clone(),
        ];

        let upcoming = list_tab(all.clone(), ListingTab::Upcoming, Perspective::Client, now());
        assert_eq!(upcoming, vec![soon.clone(), later.clone()]);

        let past = list_tab(all.clone(), ListingTab::Past, Perspective::Client, now());
        assert_eq!(past, vec![dropped, missed, done]);

        let therapist_upcoming = list_tab(
            all.clone(),
            ListingTab::Upcoming,
            Perspective::Therapist,
            now(),
        );
        assert_eq!(therapist_upcoming, vec![soon]);

        let pending = list_tab(all, ListingTab::Pending, Perspective::Therapist, now());
        assert_eq!(pending, vec![later]);
    }
}
