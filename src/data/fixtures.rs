//! In-memory data source and the sample data set.
//!
//! Used when no database is configured, by tests, and for the sample views
//! served to anonymous visitors.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DataError, DataSource, LedgerSnapshot};
use crate::domain::appointments::{Appointment, AppointmentStatus, NewAppointment};
use crate::domain::directory::{NewTherapist, Therapist};
use crate::domain::gamification::{
    achievement_views, apply_activity, ActivitySummary, LedgerOutcome, PointAction, PointActivity,
    UserAchievement, UserPoints,
};
use crate::domain::journal::{JournalEntry, NewJournalEntry};
use crate::domain::moderation::{
    FlagStatus, FlaggedMessage, NewFlag, NewViolation, UserViolation,
};
use crate::domain::mood::{MoodEntry, NewMoodEntry};
use crate::domain::profile::{NewProfile, Profile};
use crate::domain::stats::{DailyActivity, OverviewCounts};

/// Owner of every sample row.
pub const SAMPLE_USER_ID: Uuid = Uuid::from_u128(0x5a3c_0000_0000_4000_8000_0000_0000_0001);

pub fn sample_mood_entries(now: DateTime<Utc>) -> Vec<MoodEntry> {
    [
        (7, "Feeling good today!"),
        (5, "Neutral day"),
        (8, "Great progress at work"),
        (4, "Feeling a bit down"),
        (6, "Better than yesterday"),
        (9, "Excellent day!"),
        (7, "Good overall"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (value, note))| MoodEntry {
        id: Uuid::from_u128(0x1000 + i as u128),
        user_id: SAMPLE_USER_ID,
        mood_value: value,
        note: Some(note.to_string()),
        created_at: now - Duration::days(i as i64),
    })
    .collect()
}

pub fn sample_journal_entries(now: DateTime<Utc>) -> Vec<JournalEntry> {
    vec![
        JournalEntry {
            id: Uuid::from_u128(0x2001),
            user_id: SAMPLE_USER_ID,
            audio_url: None,
            transcript: Some("Today was a challenging day. I felt anxious about my upcoming presentation, but I practiced deep breathing which helped calm me down.".to_string()),
            notes: Some("Remember to continue practicing mindfulness techniques when feeling anxious.".to_string()),
            created_at: now - Duration::days(2),
        },
        JournalEntry {
            id: Uuid::from_u128(0x2002),
            user_id: SAMPLE_USER_ID,
            audio_url: None,
            transcript: Some("I had a good conversation with my friend today. It really lifted my spirits and reminded me of the importance of social connections.".to_string()),
            notes: Some("Schedule more regular catch-ups with friends.".to_string()),
            created_at: now - Duration::days(5),
        },
    ]
}

pub fn sample_ledger(now: DateTime<Utc>) -> LedgerSnapshot {
    let unlocked = [
        ("first-steps", 7),
        ("consistent-tracker", 2),
        ("mindfulness-explorer", 4),
    ]
    .into_iter()
    .map(|(id, days_ago)| UserAchievement {
        achievement_id: id.to_string(),
        achieved_at: now - Duration::days(days_ago),
    })
    .collect::<Vec<_>>();

    LedgerSnapshot {
        points: UserPoints {
            user_id: SAMPLE_USER_ID,
            total_points: 320,
            level: 4,
            streak_days: 7,
            last_activity_date: Some(now.date_naive()),
        },
        achievements: achievement_views(&unlocked),
    }
}

#[allow(clippy::too_many_arguments)]
fn therapist(
    n: u128,
    name: &str,
    title: &str,
    specialties: &[&str],
    languages: &[&str],
    location: &str,
    bio: &str,
    education: &str,
    price: &str,
    modes: (bool, bool),
    rating: f64,
    reviews: i32,
    now: DateTime<Utc>,
) -> Therapist {
    Therapist {
        id: Uuid::from_u128(0x3000 + n),
        user_id: Uuid::from_u128(0x3100 + n),
        name: name.to_string(),
        title: title.to_string(),
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
        languages: languages.iter().map(|s| s.to_string()).collect(),
        location: location.to_string(),
        bio: Some(bio.to_string()),
        education: Some(education.to_string()),
        price: Some(price.to_string()),
        online: modes.0,
        in_person: modes.1,
        rating,
        reviews,
        image_url: None,
        approved: true,
        created_at: now,
    }
}

pub fn sample_therapists(now: DateTime<Utc>) -> Vec<Therapist> {
    vec![
        therapist(
            1,
            "Dr. Sarah Mwangi",
            "Clinical Psychologist",
            &["Anxiety", "Depression", "Trauma"],
            &["English", "Swahili"],
            "Dar es Salaam",
            "Dr. Mwangi specializes in cognitive behavioral therapy with over 10 years of experience helping clients overcome anxiety and depression.",
            "Ph.D. in Clinical Psychology, University of Nairobi",
            "TSh 50,000 per session",
            (true, true),
            4.8,
            24,
            now,
        ),
        therapist(
            2,
            "Dr. James Omondi",
            "Psychiatrist",
            &["Bipolar Disorder", "Anxiety", "PTSD"],
            &["English", "Swahili"],
            "Arusha",
            "Dr. Omondi is a board-certified psychiatrist who combines medication management with therapeutic approaches for comprehensive care.",
            "M.D., Muhimbili University of Health and Allied Sciences",
            "TSh 65,000 per session",
            (true, true),
            4.6,
            18,
            now,
        ),
        therapist(
            3,
            "Fatima Hassan",
            "Licensed Counselor",
            &["Relationships", "Self-esteem", "Stress"],
            &["Swahili", "English", "Arabic"],
            "Mwanza",
            "Fatima creates a warm, supportive environment where clients can explore their challenges and develop practical coping strategies.",
            "M.A. in Counseling Psychology, University of Dar es Salaam",
            "TSh 40,000 per session",
            (true, false),
            4.9,
            32,
            now,
        ),
    ]
}

/// Moderation queue seed, newest first.
pub fn sample_flags(now: DateTime<Utc>) -> Vec<FlaggedMessage> {
    [
        (
            "Anonymous User",
            "This message contains inappropriate content that was flagged by another user.",
            "Inappropriate content",
        ),
        (
            "User123",
            "This message contains potentially harmful advice about mental health treatments.",
            "Harmful advice",
        ),
        (
            "HealthSeeker",
            "This message contains spam or promotional content unrelated to mental health.",
            "Spam",
        ),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (reporter, content, reason))| FlaggedMessage {
        id: Uuid::from_u128(0x4001 + i as u128),
        message_id: format!("msg{}", i + 1),
        reporter_id: Uuid::from_u128(0x4101 + i as u128),
        author_id: Some(Uuid::from_u128(0x4201 + i as u128)),
        reporter_name: reporter.to_string(),
        content: content.to_string(),
        reason: reason.to_string(),
        status: FlagStatus::Pending,
        created_at: now - Duration::hours(i as i64 + 1),
        reviewed_at: None,
    })
    .collect()
}

#[derive(Debug, Default)]
struct Store {
    profiles: HashMap<Uuid, Profile>,
    moods: Vec<MoodEntry>,
    journal: Vec<JournalEntry>,
    points: HashMap<Uuid, UserPoints>,
    activities: Vec<PointActivity>,
    achievements: HashMap<Uuid, Vec<UserAchievement>>,
    therapists: Vec<Therapist>,
    appointments: Vec<Appointment>,
    flags: Vec<FlaggedMessage>,
    violations: Vec<UserViolation>,
}

impl Store {
    fn summary(&self, user_id: Uuid) -> ActivitySummary {
        let moods: Vec<&MoodEntry> = self.moods.iter().filter(|m| m.user_id == user_id).collect();
        let mood_days: HashSet<NaiveDate> =
            moods.iter().map(|m| m.created_at.date_naive()).collect();
        let count_action = |action: PointAction| {
            self.activities
                .iter()
                .filter(|a| a.user_id == user_id && a.action == action)
                .count() as i64
        };
        ActivitySummary {
            has_profile: self.profiles.contains_key(&user_id),
            mood_entries: moods.len() as i64,
            mood_days: mood_days.len() as i64,
            journal_entries: self.journal.iter().filter(|j| j.user_id == user_id).count() as i64,
            chat_exchanges: count_action(PointAction::ChatExchange),
            positive_feedback: count_action(PointAction::PositiveFeedback),
            appointments_booked: self
                .appointments
                .iter()
                .filter(|a| a.user_id == user_id)
                .count() as i64,
        }
    }
}

/// In-memory [`DataSource`]. Each call holds the store lock for its whole
/// duration, so multi-row updates are atomic.
#[derive(Debug, Default)]
pub struct FixtureDataSource {
    store: RwLock<Store>,
}

impl FixtureDataSource {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seeded with the sample directory and moderation queue.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let store = Store {
            therapists: sample_therapists(now),
            flags: sample_flags(now),
            ..Default::default()
        };
        Self {
            store: RwLock::new(store),
        }
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl DataSource for FixtureDataSource {
    fn backend_tag(&self) -> &'static str {
        "fixtures"
    }

    async fn ping(&self) -> Result<std::time::Duration, DataError> {
        let start = std::time::Instant::now();
        let _store = self.store.read().await;
        Ok(start.elapsed())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DataError> {
        Ok(self.store.read().await.profiles.get(&user_id).cloned())
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, DataError> {
        let mut store = self.store.write().await;
        if store.profiles.contains_key(&profile.id) {
            return Err(DataError::Conflict("profile"));
        }
        let now = Utc::now();
        let created = Profile {
            id: profile.id,
            nickname: profile.nickname,
            age_range: profile.age_range,
            primary_concerns: profile.primary_concerns,
            preferred_therapist_gender: profile.preferred_therapist_gender,
            preferred_language: profile.preferred_language,
            created_at: now,
            updated_at: now,
        };
        store.profiles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_profile(&self, profile: &Profile) -> Result<Profile, DataError> {
        let mut store = self.store.write().await;
        let existing = store
            .profiles
            .get_mut(&profile.id)
            .ok_or(DataError::NotFound("profile"))?;
        *existing = Profile {
            updated_at: Utc::now(),
            created_at: existing.created_at,
            ..profile.clone()
        };
        Ok(existing.clone())
    }

    async fn insert_mood(&self, entry: NewMoodEntry) -> Result<MoodEntry, DataError> {
        let created = MoodEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            mood_value: entry.mood_value,
            note: entry.note,
            created_at: Utc::now(),
        };
        self.store.write().await.moods.push(created.clone());
        Ok(created)
    }

    async fn list_moods(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MoodEntry>, DataError> {
        let store = self.store.read().await;
        let mut entries: Vec<MoodEntry> = store
            .moods
            .iter()
            .filter(|m| m.user_id == user_id && m.created_at >= since)
            .cloned()
            .collect();
        newest_first(&mut entries, |m| m.created_at);
        Ok(entries)
    }

    async fn insert_journal(&self, entry: NewJournalEntry) -> Result<JournalEntry, DataError> {
        let created = JournalEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            audio_url: entry.audio_url,
            transcript: entry.transcript,
            notes: entry.notes,
            created_at: Utc::now(),
        };
        self.store.write().await.journal.push(created.clone());
        Ok(created)
    }

    async fn list_journal(&self, user_id: Uuid) -> Result<Vec<JournalEntry>, DataError> {
        let store = self.store.read().await;
        let mut entries: Vec<JournalEntry> = store
            .journal
            .iter()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut entries, |j| j.created_at);
        Ok(entries)
    }

    async fn ledger(&self, user_id: Uuid) -> Result<LedgerSnapshot, DataError> {
        let store = self.store.read().await;
        let points = store
            .points
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserPoints::new(user_id));
        let unlocked = store.achievements.get(&user_id).cloned().unwrap_or_default();
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
        let mut store = self.store.write().await;
        let summary = store.summary(user_id).including(action);
        let unlocked = store.achievements.get(&user_id).cloned().unwrap_or_default();
        let mut points = store
            .points
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserPoints::new(user_id));

        let outcome = apply_activity(&mut points, action, &summary, &unlocked, now);

        store.points.insert(user_id, points);
        for grant in &outcome.grants {
            store.activities.push(PointActivity {
                id: Uuid::new_v4(),
                user_id,
                action: grant.action,
                points: grant.points,
                description: grant.description.clone(),
                created_at: now,
            });
        }
        let achieved = store.achievements.entry(user_id).or_default();
        for view in &outcome.unlocked {
            achieved.push(UserAchievement {
                achievement_id: view.id.to_string(),
                achieved_at: now,
            });
        }
        Ok(outcome)
    }

    async fn list_therapists(&self) -> Result<Vec<Therapist>, DataError> {
        Ok(self.store.read().await.therapists.clone())
    }

    async fn get_therapist(&self, id: Uuid) -> Result<Option<Therapist>, DataError> {
        let store = self.store.read().await;
        Ok(store.therapists.iter().find(|t| t.id == id).cloned())
    }

    async fn therapist_for_user(&self, user_id: Uuid) -> Result<Option<Therapist>, DataError> {
        let store = self.store.read().await;
        Ok(store.therapists.iter().find(|t| t.user_id == user_id).cloned())
    }

    async fn create_therapist(&self, therapist: NewTherapist) -> Result<Therapist, DataError> {
        let mut store = self.store.write().await;
        if store.therapists.iter().any(|t| t.user_id == therapist.user_id) {
            return Err(DataError::Conflict("therapist profile"));
        }
        let created = Therapist {
            id: Uuid::new_v4(),
            user_id: therapist.user_id,
            name: therapist.name,
            title: therapist.title,
            specialties: therapist.specialties,
            languages: therapist.languages,
            location: therapist.location,
            bio: Some(therapist.bio),
            education: Some(therapist.education),
            price: Some(therapist.price),
            online: therapist.online,
            in_person: therapist.in_person,
            rating: 0.0,
            reviews: 0,
            image_url: therapist.image_url,
            approved: false,
            created_at: Utc::now(),
        };
        store.therapists.push(created.clone());
        Ok(created)
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DataError> {
        let mut store = self.store.write().await;
        if !store.therapists.iter().any(|t| t.id == appointment.therapist_id) {
            return Err(DataError::NotFound("therapist"));
        }
        let created = Appointment {
            id: Uuid::new_v4(),
            user_id: appointment.user_id,
            therapist_id: appointment.therapist_id,
            appointment_date: appointment.appointment_date,
            status: AppointmentStatus::Pending,
            session_type: appointment.session_type,
            notes: appointment.notes,
            created_at: Utc::now(),
        };
        store.appointments.push(created.clone());
        Ok(created)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DataError> {
        let store = self.store.read().await;
        Ok(store.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn appointments_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, DataError> {
        let store = self.store.read().await;
        Ok(store
            .appointments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn appointments_for_therapist(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<Appointment>, DataError> {
        let store = self.store.read().await;
        Ok(store
            .appointments
            .iter()
            .filter(|a| a.therapist_id == therapist_id)
            .cloned()
            .collect())
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, DataError> {
        let mut store = self.store.write().await;
        let appointment = store
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DataError::NotFound("appointment"))?;
        if appointment.status != expected {
            return Ok(None);
        }
        appointment.status = next;
        Ok(Some(appointment.clone()))
    }

    async fn insert_flag(&self, flag: NewFlag) -> Result<FlaggedMessage, DataError> {
        let created = FlaggedMessage {
            id: Uuid::new_v4(),
            message_id: flag.message_id,
            reporter_id: flag.reporter_id,
            author_id: flag.author_id,
            reporter_name: flag.reporter_name,
            content: flag.content,
            reason: flag.reason,
            status: FlagStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.store.write().await.flags.push(created.clone());
        Ok(created)
    }

    async fn list_flags(&self) -> Result<Vec<FlaggedMessage>, DataError> {
        let mut flags = self.store.read().await.flags.clone();
        newest_first(&mut flags, |f| f.created_at);
        Ok(flags)
    }

    async fn get_flag(&self, id: Uuid) -> Result<Option<FlaggedMessage>, DataError> {
        let store = self.store.read().await;
        Ok(store.flags.iter().find(|f| f.id == id).cloned())
    }

    async fn close_flag(
        &self,
        id: Uuid,
        next: FlagStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<FlaggedMessage>, DataError> {
        let mut store = self.store.write().await;
        let flag = store
            .flags
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(DataError::NotFound("flagged message"))?;
        if flag.status != FlagStatus::Pending {
            return Ok(None);
        }
        flag.status = next;
        flag.reviewed_at = Some(now);
        Ok(Some(flag.clone()))
    }

    async fn review_flag(
        &self,
        violation: NewViolation,
        now: DateTime<Utc>,
    ) -> Result<Option<UserViolation>, DataError> {
        let mut store = self.store.write().await;
        let flag = store
            .flags
            .iter_mut()
            .find(|f| f.id == violation.flagged_message_id)
            .ok_or(DataError::NotFound("flagged message"))?;
        if flag.status != FlagStatus::Pending {
            return Ok(None);
        }
        flag.status = FlagStatus::Reviewed;
        flag.reviewed_at = Some(now);

        let recorded = UserViolation {
            id: Uuid::new_v4(),
            user_id: violation.user_id,
            flagged_message_id: violation.flagged_message_id,
            rule_id: violation.rule_id,
            severity: violation.severity,
            action: violation.action,
            reason: violation.reason,
            created_at: now,
        };
        store.violations.push(recorded.clone());
        Ok(Some(recorded))
    }

    async fn list_violations(&self) -> Result<Vec<UserViolation>, DataError> {
        let mut violations = self.store.read().await.violations.clone();
        newest_first(&mut violations, |v| v.created_at);
        Ok(violations)
    }

    async fn overview_counts(&self) -> Result<OverviewCounts, DataError> {
        let store = self.store.read().await;
        Ok(OverviewCounts {
            total_users: store.profiles.len() as i64,
            total_therapists: store.therapists.len() as i64,
            pending_therapists: store.therapists.iter().filter(|t| !t.approved).count() as i64,
            total_appointments: store.appointments.len() as i64,
            total_mood_entries: store.moods.len() as i64,
            total_journal_entries: store.journal.len() as i64,
            total_chat_messages: store
                .activities
                .iter()
                .filter(|a| a.action == PointAction::ChatExchange)
                .count() as i64,
            pending_flags: store
                .flags
                .iter()
                .filter(|f| f.status == FlagStatus::Pending)
                .count() as i64,
        })
    }

    async fn daily_activity(&self, since: NaiveDate) -> Result<Vec<DailyActivity>, DataError> {
        let store = self.store.read().await;
        let mut days: HashMap<NaiveDate, DailyActivity> = HashMap::new();
        let mut bump = |at: DateTime<Utc>, field: fn(&mut DailyActivity)| {
            let date = at.date_naive();
            if date >= since {
                field(days.entry(date).or_insert_with(|| DailyActivity {
                    date,
                    ..Default::default()
                }));
            }
        };
        for p in store.profiles.values() {
            bump(p.created_at, |d| d.new_users += 1);
        }
        for m in &store.moods {
            bump(m.created_at, |d| d.mood_entries += 1);
        }
        for j in &store.journal {
            bump(j.created_at, |d| d.journal_entries += 1);
        }
        for a in store
            .activities
            .iter()
            .filter(|a| a.action == PointAction::ChatExchange)
        {
            bump(a.created_at, |d| d.chat_messages += 1);
        }
        for a in &store.appointments {
            bump(a.created_at, |d| d.appointments += 1);
        }
        let mut rows: Vec<DailyActivity> = days.into_values().collect();
        rows.sort_by_key(|d| d.date);
        Ok(rows)
    }
}
