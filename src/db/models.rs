//! Database Models - rows as sqlx reads them, converted into domain types.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::data::DataError;
use crate::domain::appointments::Appointment;
use crate::domain::directory::Therapist;
use crate::domain::gamification::{ActivitySummary, UserAchievement, UserPoints};
use crate::domain::journal::JournalEntry;
use crate::domain::moderation::{FlaggedMessage, Severity, UserViolation};
use crate::domain::mood::MoodEntry;
use crate::domain::profile::Profile;
use crate::domain::stats::{DailyActivity, OverviewCounts};

fn corrupt(table: &str, detail: impl std::fmt::Display) -> DataError {
    DataError::Corrupt(format!("{}: {}", table, detail))
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub nickname: String,
    pub age_range: String,
    pub primary_concerns: Vec<String>,
    pub preferred_therapist_gender: Option<String>,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            nickname: row.nickname,
            age_range: row.age_range,
            primary_concerns: row.primary_concerns,
            preferred_therapist_gender: row.preferred_therapist_gender,
            preferred_language: row.preferred_language,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MoodRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood_value: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MoodRow> for MoodEntry {
    fn from(row: MoodRow) -> Self {
        MoodEntry {
            id: row.id,
            user_id: row.user_id,
            mood_value: row.mood_value,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JournalRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<JournalRow> for JournalEntry {
    fn from(row: JournalRow) -> Self {
        JournalEntry {
            id: row.id,
            user_id: row.user_id,
            audio_url: row.audio_url,
            transcript: row.transcript,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TherapistRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub title: String,
    pub specialties: Vec<String>,
    pub languages: Vec<String>,
    pub location: String,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub price: Option<String>,
    pub online: bool,
    pub in_person: bool,
    pub rating: f64,
    pub reviews: i32,
    pub image_url: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TherapistRow> for Therapist {
    fn from(row: TherapistRow) -> Self {
        Therapist {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            title: row.title,
            specialties: row.specialties,
            languages: row.languages,
            location: row.location,
            bio: row.bio,
            education: row.education,
            price: row.price,
            online: row.online,
            in_person: row.in_person,
            rating: row.rating,
            reviews: row.reviews,
            image_url: row.image_url,
            approved: row.approved,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub therapist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub status: String,
    #[sqlx(rename = "type")]
    pub session_type: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DataError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            user_id: row.user_id,
            therapist_id: row.therapist_id,
            appointment_date: row.appointment_date,
            status: row.status.parse().map_err(|e| corrupt("appointments", e))?,
            session_type: row
                .session_type
                .parse()
                .map_err(|e| corrupt("appointments", e))?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserPointsRow {
    pub user_id: Uuid,
    pub total_points: i64,
    pub level: i64,
    pub streak_days: i32,
    pub last_activity_date: Option<NaiveDate>,
}

impl From<UserPointsRow> for UserPoints {
    fn from(row: UserPointsRow) -> Self {
        UserPoints {
            user_id: row.user_id,
            total_points: row.total_points,
            level: row.level,
            streak_days: row.streak_days,
            last_activity_date: row.last_activity_date,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserAchievementRow {
    pub achievement_id: String,
    pub achieved_at: DateTime<Utc>,
}

impl From<UserAchievementRow> for UserAchievement {
    fn from(row: UserAchievementRow) -> Self {
        UserAchievement {
            achievement_id: row.achievement_id,
            achieved_at: row.achieved_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivitySummaryRow {
    pub has_profile: bool,
    pub mood_entries: i64,
    pub mood_days: i64,
    pub journal_entries: i64,
    pub chat_exchanges: i64,
    pub positive_feedback: i64,
    pub appointments_booked: i64,
}

impl From<ActivitySummaryRow> for ActivitySummary {
    fn from(row: ActivitySummaryRow) -> Self {
        ActivitySummary {
            has_profile: row.has_profile,
            mood_entries: row.mood_entries,
            mood_days: row.mood_days,
            journal_entries: row.journal_entries,
            chat_exchanges: row.chat_exchanges,
            positive_feedback: row.positive_feedback,
            appointments_booked: row.appointments_booked,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FlagRow {
    pub id: Uuid,
    pub message_id: String,
    pub reporter_id: Uuid,
    pub author_id: Option<Uuid>,
    pub reporter_name: String,
    pub content: String,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<FlagRow> for FlaggedMessage {
    type Error = DataError;

    fn try_from(row: FlagRow) -> Result<Self, Self::Error> {
        Ok(FlaggedMessage {
            id: row.id,
            message_id: row.message_id,
            reporter_id: row.reporter_id,
            author_id: row.author_id,
            reporter_name: row.reporter_name,
            content: row.content,
            reason: row.reason,
            status: row.status.parse().map_err(|e| corrupt("flagged_messages", e))?,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ViolationRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub flagged_message_id: Uuid,
    pub rule_id: i32,
    pub severity: i32,
    pub action: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ViolationRow> for UserViolation {
    type Error = DataError;

    fn try_from(row: ViolationRow) -> Result<Self, Self::Error> {
        let severity = u8::try_from(row.severity)
            .map_err(|e| corrupt("user_violations", e))
            .and_then(|s| Severity::try_from(s).map_err(|e| corrupt("user_violations", e)))?;
        Ok(UserViolation {
            id: row.id,
            user_id: row.user_id,
            flagged_message_id: row.flagged_message_id,
            rule_id: row.rule_id,
            severity,
            action: row.action.parse().map_err(|e| corrupt("user_violations", e))?,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OverviewRow {
    pub total_users: i64,
    pub total_therapists: i64,
    pub pending_therapists: i64,
    pub total_appointments: i64,
    pub total_mood_entries: i64,
    pub total_journal_entries: i64,
    pub total_chat_messages: i64,
    pub pending_flags: i64,
}

impl From<OverviewRow> for OverviewCounts {
    fn from(row: OverviewRow) -> Self {
        OverviewCounts {
            total_users: row.total_users,
            total_therapists: row.total_therapists,
            pending_therapists: row.pending_therapists,
            total_appointments: row.total_appointments,
            total_mood_entries: row.total_mood_entries,
            total_journal_entries: row.total_journal_entries,
            total_chat_messages: row.total_chat_messages,
            pending_flags: row.pending_flags,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyActivityRow {
    pub date: NaiveDate,
    pub new_users: i64,
    pub mood_entries: i64,
    pub journal_entries: i64,
    pub chat_messages: i64,
    pub appointments: i64,
}

impl From<DailyActivityRow> for DailyActivity {
    fn from(row: DailyActivityRow) -> Self {
        DailyActivity {
            date: row.date,
            new_users: row.new_users,
            mood_entries: row.mood_entries,
            journal_entries: row.journal_entries,
            chat_messages: row.chat_messages,
            appointments: row.appointments,
        }
    }
}
