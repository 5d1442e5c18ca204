//! PostgreSQL-backed [`DataSource`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{DataError, DataSource, LedgerSnapshot};
use crate::db::models::{
    ActivitySummaryRow, AppointmentRow, DailyActivityRow, FlagRow, JournalRow, MoodRow,
    OverviewRow, ProfileRow, TherapistRow, UserAchievementRow, UserPointsRow, ViolationRow,
};
use crate::domain::appointments::{Appointment, AppointmentStatus, NewAppointment};
use crate::domain::directory::{NewTherapist, Therapist};
use crate::domain::gamification::{
    achievement_views, apply_activity, ActivitySummary, LedgerOutcome, PointAction,
    UserAchievement, UserPoints,
};
use crate::domain::journal::{JournalEntry, NewJournalEntry};
use crate::domain::moderation::{FlagStatus, FlaggedMessage, NewFlag, NewViolation, UserViolation};
use crate::domain::mood::{MoodEntry, NewMoodEntry};
use crate::domain::profile::{NewProfile, Profile};
use crate::domain::stats::{DailyActivity, OverviewCounts};

const PROFILE_COLUMNS: &str = "id, nickname, age_range, primary_concerns, \
    preferred_therapist_gender, preferred_language, created_at, updated_at";
const THERAPIST_COLUMNS: &str = "id, user_id, name, title, specialties, languages, location, \
    bio, education, price, online, in_person, rating, reviews, image_url, approved, created_at";
const APPOINTMENT_COLUMNS: &str =
    "id, user_id, therapist_id, appointment_date, status, type, notes, created_at";
const FLAG_COLUMNS: &str =
    "id, message_id, reporter_id, author_id, reporter_name, content, reason, status, \
    created_at, reviewed_at";
const VIOLATION_COLUMNS: &str =
    "id, user_id, flagged_message_id, rule_id, severity, action, reason, created_at";

const ACTIVITY_SUMMARY_SQL: &str = r#"
    SELECT
        EXISTS (SELECT 1 FROM profiles WHERE id = $1) AS has_profile,
        (SELECT COUNT(*) FROM mood_entries WHERE user_id = $1) AS mood_entries,
        (SELECT COUNT(DISTINCT (created_at AT TIME ZONE 'UTC')::date)
            FROM mood_entries WHERE user_id = $1) AS mood_days,
        (SELECT COUNT(*) FROM journal_entries WHERE user_id = $1) AS journal_entries,
        (SELECT COUNT(*) FROM point_activities
            WHERE user_id = $1 AND action = 'chat_exchange') AS chat_exchanges,
        (SELECT COUNT(*) FROM point_activities
            WHERE user_id = $1 AND action = 'positive_feedback') AS positive_feedback,
        (SELECT COUNT(*) FROM appointments WHERE user_id = $1) AS appointments_booked
"#;

const OVERVIEW_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM profiles) AS total_users,
        (SELECT COUNT(*) FROM therapists) AS total_therapists,
        (SELECT COUNT(*) FROM therapists WHERE NOT approved) AS pending_therapists,
        (SELECT COUNT(*) FROM appointments) AS total_appointments,
        (SELECT COUNT(*) FROM mood_entries) AS total_mood_entries,
        (SELECT COUNT(*) FROM journal_entries) AS total_journal_entries,
        (SELECT COUNT(*) FROM point_activities WHERE action = 'chat_exchange')
            AS total_chat_messages,
        (SELECT COUNT(*) FROM flagged_messages WHERE status = 'pending') AS pending_flags
"#;

const DAILY_ACTIVITY_SQL: &str = r#"
    SELECT day AS date,
        SUM(new_users)::BIGINT AS new_users,
        SUM(mood_entries)::BIGINT AS mood_entries,
        SUM(journal_entries)::BIGINT AS journal_entries,
        SUM(chat_messages)::BIGINT AS chat_messages,
        SUM(appointments)::BIGINT AS appointments
    FROM (
        SELECT (created_at AT TIME ZONE 'UTC')::date AS day,
            1 AS new_users, 0 AS mood_entries, 0 AS journal_entries,
            0 AS chat_messages, 0 AS appointments
        FROM profiles WHERE created_at >= $1
        UNION ALL
        SELECT (created_at AT TIME ZONE 'UTC')::date, 0, 1, 0, 0, 0
        FROM mood_entries WHERE created_at >= $1
        UNION ALL
        SELECT (created_at AT TIME ZONE 'UTC')::date, 0, 0, 1, 0, 0
        FROM journal_entries WHERE created_at >= $1
        UNION ALL
        SELECT (created_at AT TIME ZONE 'UTC')::date, 0, 0, 0, 1, 0
        FROM point_activities WHERE action = 'chat_exchange' AND created_at >= $1
        UNION ALL
        SELECT (created_at AT TIME ZONE 'UTC')::date, 0, 0, 0, 0, 1
        FROM appointments WHERE created_at >= $1
    ) activity
    GROUP BY day
    ORDER BY day
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub struct PgDataSource {
    pool: Arc<PgPool>,
}

impl PgDataSource {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl DataSource for PgDataSource {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<Duration, DataError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(self.pool()).await?;
        Ok(start.elapsed())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DataError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, DataError> {
        let result = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (id, nickname, age_range, primary_concerns, \
             preferred_therapist_gender, preferred_language) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(profile.id)
        .bind(&profile.nickname)
        .bind(&profile.age_range)
        .bind(&profile.primary_concerns)
        .bind(&profile.preferred_therapist_gender)
        .bind(&profile.preferred_language)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(DataError::Conflict("profile")),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_profile(&self, profile: &Profile) -> Result<Profile, DataError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profiles SET nickname = $2, age_range = $3, primary_concerns = $4, \
             preferred_therapist_gender = $5, preferred_language = $6, updated_at = now() \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(profile.id)
        .bind(&profile.nickname)
        .bind(&profile.age_range)
        .bind(&profile.primary_concerns)
        .bind(&profile.preferred_therapist_gender)
        .bind(&profile.preferred_language)
        .fetch_optional(self.pool())
        .await?;
        row.map(Profile::from).ok_or(DataError::NotFound("profile"))
    }

    async fn insert_mood(&self, entry: NewMoodEntry) -> Result<MoodEntry, DataError> {
        let row = sqlx::query_as::<_, MoodRow>(
            "INSERT INTO mood_entries (user_id, mood_value, note) VALUES ($1, $2, $3) \
             RETURNING id, user_id, mood_value, note, created_at",
        )
        .bind(entry.user_id)
        .bind(entry.mood_value)
        .bind(&entry.note)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_moods(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MoodEntry>, DataError> {
        let rows = sqlx::query_as::<_, MoodRow>(
            "SELECT id, user_id, mood_value, note, created_at FROM mood_entries \
             WHERE user_id = $1 AND created_at >= $2 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(MoodEntry::from).collect())
    }

    async fn insert_journal(&self, entry: NewJournalEntry) -> Result<JournalEntry, DataError> {
        let row = sqlx::query_as::<_, JournalRow>(
            "INSERT INTO journal_entries (user_id, audio_url, transcript, notes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, audio_url, transcript, notes, created_at",
        )
        .bind(entry.user_id)
        .bind(&entry.audio_url)
        .bind(&entry.transcript)
        .bind(&entry.notes)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_journal(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, DataError> {
        let rows = sqlx::query_as::<_, JournalRow>(
            "SELECT id, user_id, audio_url, transcript, notes, created_at FROM journal_entries \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(JournalEntry::from).collect())
    }

    async fn ledger(&self, user_id: Uuid) -> Result<LedgerSnapshot, DataError> {
        let points = sqlx::query_as::<_, UserPointsRow>(
            "SELECT user_id, total_points, level, streak_days, last_activity_date \
             FROM user_points WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .map(UserPoints::from)
        .unwrap_or_else(|| UserPoints::new(user_id));

        let unlocked: Vec<UserAchievement> = sqlx::query_as::<_, UserAchievementRow>(
            "SELECT achievement_id, achieved_at FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(UserAchievement::from)
        .collect();

        Ok(LedgerSnapshot {
            points,
            achievements: achievement_views(&unlocked),
        })
    }

    async fn record_activity(
        &self,
        user_id: Uuid,
        action: PointAction,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome, DataError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO user_points (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Row lock serializes concurrent grants for the same user.
        let mut points: UserPoints = sqlx::query_as::<_, UserPointsRow>(
            "SELECT user_id, total_points, level, streak_days, last_activity_date \
             FROM user_points WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let summary: ActivitySummary = sqlx::query_as::<_, ActivitySummaryRow>(ACTIVITY_SUMMARY_SQL)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?
            .into();

        let unlocked: Vec<UserAchievement> = sqlx::query_as::<_, UserAchievementRow>(
            "SELECT achievement_id, achieved_at FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(UserAchievement::from)
        .collect();

        let outcome = apply_activity(&mut points, action, &summary.including(action), &unlocked, now);

        sqlx::query(
            "UPDATE user_points SET total_points = $2, level = $3, streak_days = $4, \
             last_activity_date = $5, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(points.total_points)
        .bind(points.level)
        .bind(points.streak_days)
        .bind(points.last_activity_date)
        .execute(&mut *tx)
        .await?;

        for grant in &outcome.grants {
            sqlx::query(
                "INSERT INTO point_activities (user_id, action, points, description, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(user_id)
            .bind(grant.action.as_str())
            .bind(grant.points)
            .bind(&grant.description)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for achievement in &outcome.unlocked {
            sqlx::query(
                "INSERT INTO user_achievements (user_id, achievement_id, achieved_at) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(achievement.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn list_therapists(&self) -> Result<Vec<Therapist>, DataError> {
        let rows = sqlx::query_as::<_, TherapistRow>(&format!(
            "SELECT {THERAPIST_COLUMNS} FROM therapists ORDER BY created_at, name"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Therapist::from).collect())
    }

    async fn get_therapist(&self, id: Uuid) -> Result<Option<Therapist>, DataError> {
        let row = sqlx::query_as::<_, TherapistRow>(&format!(
            "SELECT {THERAPIST_COLUMNS} FROM therapists WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Therapist::from))
    }

    async fn therapist_for_user(&self, user_id: Uuid) -> Result<Option<Therapist>, DataError> {
        let row = sqlx::query_as::<_, TherapistRow>(&format!(
            "SELECT {THERAPIST_COLUMNS} FROM therapists WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Therapist::from))
    }

    async fn create_therapist(&self, therapist: NewTherapist) -> Result<Therapist, DataError> {
        let result = sqlx::query_as::<_, TherapistRow>(&format!(
            "INSERT INTO therapists (user_id, name, title, specialties, languages, location, \
             bio, education, price, online, in_person, image_url, approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, false) \
             RETURNING {THERAPIST_COLUMNS}"
        ))
        .bind(therapist.user_id)
        .bind(&therapist.name)
        .bind(&therapist.title)
        .bind(&therapist.specialties)
        .bind(&therapist.languages)
        .bind(&therapist.location)
        .bind(&therapist.bio)
        .bind(&therapist.education)
        .bind(&therapist.price)
        .bind(therapist.online)
        .bind(therapist.in_person)
        .bind(&therapist.image_url)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(DataError::Conflict("therapist profile")),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DataError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "INSERT INTO appointments (user_id, therapist_id, appointment_date, status, type, notes) \
             VALUES ($1, $2, $3, 'pending', $4, $5) RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(appointment.user_id)
        .bind(appointment.therapist_id)
        .bind(appointment.appointment_date)
        .bind(appointment.session_type.as_str())
        .bind(&appointment.notes)
        .fetch_one(self.pool())
        .await?;
        row.try_into()
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DataError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(Appointment::try_from).transpose()
    }

    async fn appointments_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, DataError> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Appointment::try_from).collect()
    }

    async fn appointments_for_therapist(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<Appointment>, DataError> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE therapist_id = $1"
        ))
        .bind(therapist_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Appointment::try_from).collect()
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, DataError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "UPDATE appointments SET status = $3 WHERE id = $1 AND status = $2 \
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(self.pool())
        .await?;
        row.map(Appointment::try_from).transpose()
    }

    async fn insert_flag(&self, flag: NewFlag) -> Result<FlaggedMessage, DataError> {
        let row = sqlx::query_as::<_, FlagRow>(&format!(
            "INSERT INTO flagged_messages \
             (message_id, reporter_id, author_id, reporter_name, content, reason) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {FLAG_COLUMNS}"
        ))
        .bind(&flag.message_id)
        .bind(flag.reporter_id)
        .bind(flag.author_id)
        .bind(&flag.reporter_name)
        .bind(&flag.content)
        .bind(&flag.reason)
        .fetch_one(self.pool())
        .await?;
        row.try_into()
    }

    async fn list_flags(&self) -> Result<Vec<FlaggedMessage>, DataError> {
        let rows = sqlx::query_as::<_, FlagRow>(&format!(
            "SELECT {FLAG_COLUMNS} FROM flagged_messages ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(FlaggedMessage::try_from).collect()
    }

    async fn get_flag(&self, id: Uuid) -> Result<Option<FlaggedMessage>, DataError> {
        let row = sqlx::query_as::<_, FlagRow>(&format!(
            "SELECT {FLAG_COLUMNS} FROM flagged_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(FlaggedMessage::try_from).transpose()
    }

    async fn close_flag(
        &self,
        id: Uuid,
        next: FlagStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<FlaggedMessage>, DataError> {
        let row = sqlx::query_as::<_, FlagRow>(&format!(
            "UPDATE flagged_messages SET status = $2, reviewed_at = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {FLAG_COLUMNS}"
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        row.map(FlaggedMessage::try_from).transpose()
    }

    async fn review_flag(
        &self,
        violation: NewViolation,
        now: DateTime<Utc>,
    ) -> Result<Option<UserViolation>, DataError> {
        let mut tx = self.pool().begin().await?;

        let closed = sqlx::query(
            "UPDATE flagged_messages SET status = 'reviewed', reviewed_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(violation.flagged_message_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if closed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, ViolationRow>(&format!(
            "INSERT INTO user_violations \
             (user_id, flagged_message_id, rule_id, severity, action, reason, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {VIOLATION_COLUMNS}"
        ))
        .bind(violation.user_id)
        .bind(violation.flagged_message_id)
        .bind(violation.rule_id)
        .bind(i32::from(u8::from(violation.severity)))
        .bind(violation.action.as_str())
        .bind(&violation.reason)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into().map(Some)
    }

    async fn list_violations(&self) -> Result<Vec<UserViolation>, DataError> {
        let rows = sqlx::query_as::<_, ViolationRow>(&format!(
            "SELECT {VIOLATION_COLUMNS} FROM user_violations ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(UserViolation::try_from).collect()
    }

    async fn overview_counts(&self) -> Result<OverviewCounts, DataError> {
        let row = sqlx::query_as::<_, OverviewRow>(OVERVIEW_SQL)
            .fetch_one(self.pool())
            .await?;
        Ok(row.into())
    }

    async fn daily_activity(&self, since: NaiveDate) -> Result<Vec<DailyActivity>, DataError> {
        let since = since.and_time(chrono::NaiveTime::MIN).and_utc();
        let rows = sqlx::query_as::<_, DailyActivityRow>(DAILY_ACTIVITY_SQL)
            .bind(since)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(DailyActivity::from).collect())
    }
}
