//! Storage seam. Handlers only ever talk to a [`DataSource`]; which
//! implementation sits behind it is decided once at startup.

pub mod fixtures;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::appointments::{Appointment, AppointmentStatus, NewAppointment};
use crate::domain::directory::{NewTherapist, Therapist};
use crate::domain::gamification::{AchievementView, LedgerOutcome, PointAction, UserPoints};
use crate::domain::journal::{JournalEntry, NewJournalEntry};
use crate::domain::moderation::{FlagStatus, FlaggedMessage, NewFlag, NewViolation, UserViolation};
use crate::domain::mood::{MoodEntry, NewMoodEntry};
use crate::domain::profile::{NewProfile, Profile};
use crate::domain::stats::{DailyActivity, OverviewCounts};

pub use fixtures::FixtureDataSource;
pub use postgres::PgDataSource;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Current ledger state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub points: UserPoints,
    pub achievements: Vec<AchievementView>,
}

#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Short name reported by health checks.
    fn backend_tag(&self) -> &'static str;

    async fn ping(&self) -> Result<Duration, DataError>;

    // Profiles
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DataError>;
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, DataError>;
    async fn update_profile(&self, profile: &Profile) -> Result<Profile, DataError>;

    // Mood
    async fn insert_mood(&self, entry: NewMoodEntry) -> Result<MoodEntry, DataError>;
    /// Entries created at or after `since`, newest first.
    async fn list_moods(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MoodEntry>, DataError>;

    // Journal
    async fn insert_journal(&self, entry: NewJournalEntry) -> Result<JournalEntry, DataError>;
    async fn list_journal(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, DataError>;

    // Gamification
    async fn ledger(&self, user_id: Uuid) -> Result<LedgerSnapshot, DataError>;
    /// Grants `action` and any achievements it unlocks as one atomic step.
    async fn record_activity(
        &self,
        user_id: Uuid,
        action: PointAction,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome, DataError>;

    // Directory
    async fn list_therapists(&self) -> Result<Vec<Therapist>, DataError>;
    async fn get_therapist(&self, id: Uuid) -> Result<Option<Therapist>, DataError>;
    async fn therapist_for_user(&self, user_id: Uuid) -> Result<Option<Therapist>, DataError>;
    async fn create_therapist(&self, therapist: NewTherapist) -> Result<Therapist, DataError>;

    // Appointments
    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DataError>;
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DataError>;
    async fn appointments_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, DataError>;
    async fn appointments_for_therapist(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<Appointment>, DataError>;
    /// Writes `next` only while the row still has status `expected`.
    /// `None` means another actor changed it first.
    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, DataError>;

    // Moderation
    async fn insert_flag(&self, flag: NewFlag) -> Result<FlaggedMessage, DataError>;
    /// Whole queue, newest first.
    async fn list_flags(&self) -> Result<Vec<FlaggedMessage>, DataError>;
    async fn get_flag(&self, id: Uuid) -> Result<Option<FlaggedMessage>, DataError>;
    /// Moves a pending flag to `next`. `None` if it was no longer pending.
    async fn close_flag(
        &self,
        id: Uuid,
        next: FlagStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<FlaggedMessage>, DataError>;
    /// Marks a pending flag reviewed and records the violation together.
    async fn review_flag(
        &self,
        violation: NewViolation,
        now: DateTime<Utc>,
    ) -> Result<Option<UserViolation>, DataError>;
    async fn list_violations(&self) -> Result<Vec<UserViolation>, DataError>;

    // Dashboards
    async fn overview_counts(&self) -> Result<OverviewCounts, DataError>;
    /// Per-day activity on or after `since`. Days without activity may be omitted.
    async fn daily_activity(&self, since: NaiveDate) -> Result<Vec<DailyActivity>, DataError>;
}

/// Postgres when a pool is available, the in-memory fixture store otherwise.
pub fn select(pool: Option<Arc<sqlx::PgPool>>) -> Arc<dyn DataSource> {
    match pool {
        Some(pool) => {
            tracing::info!(backend = "postgres", "Data source selected");
            Arc::new(PgDataSource::new(pool))
        }
        None => {
            tracing::warn!(
                backend = "fixtures",
                "No database available, serving the in-memory sample data set"
            );
            Arc::new(FixtureDataSource::seeded(Utc::now()))
        }
    }
}
