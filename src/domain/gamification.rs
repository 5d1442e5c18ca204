//! Points, levels, streaks and achievements.
//!
//! Everything here is pure: callers load the ledger row, apply an activity
//! and persist the result.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const POINTS_PER_LEVEL: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointAction {
    MoodEntry,
    JournalEntry,
    ChatExchange,
    PositiveFeedback,
    AppointmentBooked,
    /// Onboarding finished. Earns nothing itself but can complete an achievement.
    ProfileCompleted,
    Achievement,
}

impl PointAction {
    /// Fixed grant for the action. Achievement grants carry their own value.
    pub fn points(&self) -> i64 {
        match self {
            PointAction::MoodEntry => 5,
            PointAction::JournalEntry => 10,
            PointAction::ChatExchange => 10,
            PointAction::PositiveFeedback => 5,
            PointAction::AppointmentBooked => 20,
            PointAction::ProfileCompleted | PointAction::Achievement => 0,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PointAction::MoodEntry => "Logged your mood",
            PointAction::JournalEntry => "Saved a journal entry",
            PointAction::ChatExchange => "Engaged in a helpful conversation",
            PointAction::PositiveFeedback => "Provided helpful feedback",
            PointAction::AppointmentBooked => "Requested a therapy session",
            PointAction::ProfileCompleted => "Completed your profile",
            PointAction::Achievement => "Unlocked an achievement",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointAction::MoodEntry => "mood_entry",
            PointAction::JournalEntry => "journal_entry",
            PointAction::ChatExchange => "chat_exchange",
            PointAction::PositiveFeedback => "positive_feedback",
            PointAction::AppointmentBooked => "appointment_booked",
            PointAction::ProfileCompleted => "profile_completed",
            PointAction::Achievement => "achievement",
        }
    }

    /// Whether the action counts towards the daily streak.
    pub fn is_engagement(&self) -> bool {
        !matches!(self, PointAction::ProfileCompleted | PointAction::Achievement)
    }
}

/// level(p) = floor(p / 100) + 1
pub fn level_for(total_points: i64) -> i64 {
    total_points.max(0) / POINTS_PER_LEVEL + 1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPoints {
    pub user_id: Uuid,
    pub total_points: i64,
    pub level: i64,
    pub streak_days: i32,
    pub last_activity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUp {
    pub from: i64,
    pub to: i64,
}

impl UserPoints {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_points: 0,
            level: 1,
            streak_days: 0,
            last_activity_date: None,
        }
    }

    /// Adds a non-negative grant and recomputes the level. Returns the
    /// level-up when the new level exceeds the stored one.
    pub fn grant(&mut self, points: i64) -> Option<LevelUp> {
        self.total_points = self.total_points.saturating_add(points.max(0));
        let recomputed = level_for(self.total_points);
        let previous = self.level;
        self.level = recomputed.max(previous);
        (recomputed > previous).then_some(LevelUp {
            from: previous,
            to: recomputed,
        })
    }

    /// Counts `today` as an active day.
    pub fn mark_active(&mut self, today: NaiveDate) {
        self.streak_days = match self.last_activity_date {
            Some(last) if last == today => self.streak_days.max(1),
            Some(last) if last + Duration::days(1) == today => self.streak_days + 1,
            // Clock skew puts the last activity in the future; keep the count.
            Some(last) if last > today => self.streak_days,
            _ => 1,
        };
        if self.last_activity_date.map_or(true, |last| last < today) {
            self.last_activity_date = Some(today);
        }
    }

    /// Streak as it should be displayed on `today`: a run whose last day is
    /// older than yesterday has already been broken.
    pub fn effective_streak(&self, today: NaiveDate) -> i32 {
        match self.last_activity_date {
            Some(last) if last + Duration::days(1) >= today => self.streak_days,
            _ => 0,
        }
    }
}

/// Per-user counts the achievement conditions are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub has_profile: bool,
    pub mood_entries: i64,
    pub mood_days: i64,
    pub journal_entries: i64,
    pub chat_exchanges: i64,
    pub positive_feedback: i64,
    pub appointments_booked: i64,
}

impl ActivitySummary {
    /// Counts that are read from the ledger itself do not yet include the
    /// grant being recorded.
    pub fn including(mut self, action: PointAction) -> Self {
        match action {
            PointAction::ChatExchange => self.chat_exchanges += 1,
            PointAction::PositiveFeedback => self.positive_feedback += 1,
            _ => {}
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    ProfileAndFirstMood,
    StreakDays(i32),
    JournalEntries(i64),
    ChatExchanges(i64),
    AppointmentsBooked(i64),
    PositiveFeedback(i64),
    MoodDays(i64),
}

impl Condition {
    pub fn is_met(&self, summary: &ActivitySummary, streak_days: i32) -> bool {
        match *self {
            Condition::ProfileAndFirstMood => summary.has_profile && summary.mood_entries >= 1,
            Condition::StreakDays(days) => streak_days >= days,
            Condition::JournalEntries(n) => summary.journal_entries >= n,
            Condition::ChatExchanges(n) => summary.chat_exchanges >= n,
            Condition::AppointmentsBooked(n) => summary.appointments_booked >= n,
            Condition::PositiveFeedback(n) => summary.positive_feedback >= n,
            Condition::MoodDays(n) => summary.mood_days >= n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: i64,
    pub icon: &'static str,
    pub condition: Condition,
}

pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        id: "first-steps",
        name: "First Steps",
        description: "Complete your profile and first mood entry",
        points: 50,
        icon: "award",
        condition: Condition::ProfileAndFirstMood,
    },
    AchievementDef {
        id: "consistent-tracker",
        name: "Consistent Tracker",
        description: "Stay active for 7 consecutive days",
        points: 100,
        icon: "calendar",
        condition: Condition::StreakDays(7),
    },
    AchievementDef {
        id: "journal-master",
        name: "Journal Master",
        description: "Create 10 journal entries",
        points: 150,
        icon: "book",
        condition: Condition::JournalEntries(10),
    },
    AchievementDef {
        id: "mindfulness-explorer",
        name: "Mindfulness Explorer",
        description: "Complete 5 chat sessions with the AI assistant",
        points: 100,
        icon: "brain",
        condition: Condition::ChatExchanges(5),
    },
    AchievementDef {
        id: "connection-seeker",
        name: "Connection Seeker",
        description: "Book your first appointment with a therapist",
        points: 200,
        icon: "users",
        condition: Condition::AppointmentsBooked(1),
    },
    AchievementDef {
        id: "feedback-provider",
        name: "Feedback Provider",
        description: "Rate a response from the assistant as helpful",
        points: 75,
        icon: "message-square",
        condition: Condition::PositiveFeedback(1),
    },
    AchievementDef {
        id: "streak-champion",
        name: "Streak Champion",
        description: "Maintain a 30-day streak of app usage",
        points: 300,
        icon: "zap",
        condition: Condition::StreakDays(30),
    },
    AchievementDef {
        id: "reflection-pro",
        name: "Reflection Pro",
        description: "Complete 30 journal entries",
        points: 250,
        icon: "pen-tool",
        condition: Condition::JournalEntries(30),
    },
    AchievementDef {
        id: "mood-analyst",
        name: "Mood Analyst",
        description: "Track your mood for 30 days total",
        points: 200,
        icon: "bar-chart",
        condition: Condition::MoodDays(30),
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub achievement_id: String,
    pub achieved_at: DateTime<Utc>,
}

/// Achievements whose condition holds now and that were never unlocked.
pub fn newly_unlocked(
    unlocked: &[UserAchievement],
    summary: &ActivitySummary,
    streak_days: i32,
) -> Vec<&'static AchievementDef> {
    ACHIEVEMENTS
        .iter()
        .filter(|def| !unlocked.iter().any(|u| u.achievement_id == def.id))
        .filter(|def| def.condition.is_met(summary, streak_days))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: i64,
    pub icon: &'static str,
    pub achieved: bool,
    pub achieved_at: Option<DateTime<Utc>>,
}

pub fn achievement_views(unlocked: &[UserAchievement]) -> Vec<AchievementView> {
    ACHIEVEMENTS
        .iter()
        .map(|def| {
            let achieved_at = unlocked
                .iter()
                .find(|u| u.achievement_id == def.id)
                .map(|u| u.achieved_at);
            AchievementView {
                id: def.id,
                name: def.name,
                description: def.description,
                points: def.points,
                icon: def.icon,
                achieved: achieved_at.is_some(),
                achieved_at,
            }
        })
        .collect()
}

/// Stored ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointActivity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: PointAction,
    pub points: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A single ledger row to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointGrant {
    pub action: PointAction,
    pub points: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOutcome {
    pub points_awarded: i64,
    pub total_points: i64,
    pub level: i64,
    pub level_up: Option<LevelUp>,
    pub streak_days: i32,
    pub unlocked: Vec<AchievementView>,
    #[serde(skip)]
    pub grants: Vec<PointGrant>,
}

/// Applies `action` to the ledger: grants its points, advances the streak,
/// unlocks newly satisfied achievements and grants their points.
///
/// `summary` must already include the action being recorded. Zero-point
/// grants write no ledger row. Positive feedback pays only while it does not
/// outnumber the chat exchanges it could be rating.
pub fn apply_activity(
    points: &mut UserPoints,
    action: PointAction,
    summary: &ActivitySummary,
    unlocked: &[UserAchievement],
    now: DateTime<Utc>,
) -> LedgerOutcome {
    let starting_level = points.level;
    let mut grants = Vec::new();

    if action.is_engagement() {
        points.mark_active(now.date_naive());
    }

    let mut summary = *summary;
    let base = match action {
        PointAction::PositiveFeedback if summary.positive_feedback > summary.chat_exchanges => {
            // Unpaid feedback does not count towards achievements either.
            summary.positive_feedback -= 1;
            0
        }
        _ => action.points(),
    };
    if base > 0 {
        points.grant(base);
        grants.push(PointGrant {
            action,
            points: base,
            description: action.description().to_string(),
        });
    }

    let mut awarded = base;
    let mut views = Vec::new();
    for def in newly_unlocked(unlocked, &summary, points.streak_days) {
        points.grant(def.points);
        awarded += def.points;
        grants.push(PointGrant {
            action: PointAction::Achievement,
            points: def.points,
            description: format!("Unlocked {}", def.name),
        });
        views.push(AchievementView {
            id: def.id,
            name: def.name,
            description: def.description,
            points: def.points,
            icon: def.icon,
            achieved: true,
            achieved_at: Some(now),
        });
    }

    let level_up = (points.level > starting_level).then_some(LevelUp {
        from: starting_level,
        to: points.level,
    });

    LedgerOutcome {
        points_awarded: awarded,
        total_points: points.total_points,
        level: points.level,
        level_up,
        streak_days: points.streak_days,
        unlocked: views,
        grants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, n, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_level_is_floor_of_hundreds_plus_one() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(320), 4);
        let levels: Vec<i64> = (0..1000).step_by(7).map(level_for).collect();
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_level_up_fires_only_when_level_increases() {
        let mut p = UserPoints::new(Uuid::nil());
        p.total_points = 90;
        assert_eq!(p.grant(5), None);
        assert_eq!(p.grant(10), Some(LevelUp { from: 1, to: 2 }));
        assert_eq!(p.level, 2);
        assert_eq!(p.grant(10), None);
    }

    #[test]
    fn test_negative_grants_are_ignored() {
        let mut p = UserPoints::new(Uuid::nil());
        p.grant(50);
        p.grant(-20);
        assert_eq!(p.total_points, 50);
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let mut p = UserPoints::new(Uuid::nil());
        p.mark_active(day(1).date_naive());
        p.mark_active(day(1).date_naive());
        assert_eq!(p.streak_days, 1);
        p.mark_active(day(2).date_naive());
        p.mark_active(day(3).date_naive());
        assert_eq!(p.streak_days, 3);
        p.mark_active(day(5).date_naive());
        assert_eq!(p.streak_days, 1);
    }

    #[test]
    fn test_effective_streak_drops_after_gap_day() {
        let mut p = UserPoints::new(Uuid::nil());
        for d in 1..=4 {
            p.mark_active(day(d).date_naive());
        }
        assert_eq!(p.effective_streak(day(4).date_naive()), 4);
        assert_eq!(p.effective_streak(day(5).date_naive()), 4);
        assert_eq!(p.effective_streak(day(6).date_naive()), 0);
    }

    #[test]
    fn test_consistent_tracker_unlocks_on_day_seven_and_stays() {
        let mut p = UserPoints::new(Uuid::nil());
        let mut unlocked: Vec<UserAchievement> = Vec::new();
        let summary = ActivitySummary::default();

        for d in 1..=6 {
            let out = apply_activity(&mut p, PointAction::ChatExchange, &summary, &unlocked, day(d));
            assert!(
                out.unlocked.iter().all(|a| a.id != "consistent-tracker"),
                "unlocked too early on day {d}"
            );
        }

        let out = apply_activity(&mut p, PointAction::ChatExchange, &summary, &unlocked, day(7));
        assert_eq!(p.streak_days, 7);
        assert_eq!(
            out.unlocked.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec!["consistent-tracker"]
        );
        unlocked.extend(out.unlocked.iter().map(|a| UserAchievement {
            achievement_id: a.id.to_string(),
            achieved_at: day(7),
        }));

        // Gap, then activity again: the streak resets but the unlock stays.
        let out = apply_activity(&mut p, PointAction::ChatExchange, &summary, &unlocked, day(10));
        assert_eq!(p.streak_days, 1);
        assert!(out.unlocked.is_empty());
        let views = achievement_views(&unlocked);
        let tracker = views.iter().find(|v| v.id == "consistent-tracker").unwrap();
        assert!(tracker.achieved);
        assert_eq!(tracker.achieved_at, Some(day(7)));
    }

    #[test]
    fn test_achievement_points_are_granted_with_the_unlock() {
        let mut p = UserPoints::new(Uuid::nil());
        let summary = ActivitySummary {
            has_profile: true,
            mood_entries: 1,
            mood_days: 1,
            ..Default::default()
        };
        let out = apply_activity(&mut p, PointAction::MoodEntry, &summary, &[], day(1));
        assert_eq!(out.points_awarded, 5 + 50);
        assert_eq!(out.total_points, 55);
        assert_eq!(out.grants.len(), 2);
        assert_eq!(out.grants[1].action, PointAction::Achievement);
    }

    #[test]
    fn test_profile_completion_unlocks_first_steps_without_a_row_of_its_own() {
        let mut p = UserPoints::new(Uuid::nil());
        p.total_points = 5;
        let summary = ActivitySummary {
            has_profile: true,
            mood_entries: 1,
            mood_days: 1,
            ..Default::default()
        };
        let out = apply_activity(&mut p, PointAction::ProfileCompleted, &summary, &[], day(2));
        assert_eq!(out.points_awarded, 50);
        assert_eq!(out.total_points, 55);
        assert_eq!(out.grants.len(), 1);
        assert_eq!(out.grants[0].action, PointAction::Achievement);
        assert_eq!(out.unlocked[0].id, "first-steps");
        // Onboarding is not daily engagement.
        assert_eq!(p.streak_days, 0);
    }

    #[test]
    fn test_positive_feedback_pays_once_per_exchange() {
        let mut p = UserPoints::new(Uuid::nil());
        let unlocked = vec![UserAchievement {
            achievement_id: "feedback-provider".into(),
            achieved_at: day(1),
        }];
        let paid = ActivitySummary {
            chat_exchanges: 1,
            positive_feedback: 1,
            ..Default::default()
        };
        let out = apply_activity(&mut p, PointAction::PositiveFeedback, &paid, &unlocked, day(1));
        assert_eq!(out.points_awarded, 5);

        let unpaid = ActivitySummary {
            positive_feedback: 2,
            ..paid
        };
        let out = apply_activity(&mut p, PointAction::PositiveFeedback, &unpaid, &unlocked, day(1));
        assert_eq!(out.points_awarded, 0);
        assert!(out.grants.is_empty());
        assert_eq!(p.total_points, 5);
    }

    #[test]
    fn test_unpaid_feedback_does_not_unlock_feedback_provider() {
        let mut p = UserPoints::new(Uuid::nil());
        let summary = ActivitySummary {
            positive_feedback: 1,
            ..Default::default()
        };
        let out = apply_activity(&mut p, PointAction::PositiveFeedback, &summary, &[], day(1));
        assert!(out.unlocked.is_empty());
        assert_eq!(out.total_points, 0);
    }

    #[test]
    fn test_level_up_reported_across_achievement_grant() {
        let mut p = UserPoints::new(Uuid::nil());
        p.total_points = 80;
        let summary = ActivitySummary {
            appointments_booked: 1,
            ..Default::default()
        };
        let out = apply_activity(&mut p, PointAction::AppointmentBooked, &summary, &[], day(1));
        assert_eq!(out.total_points, 80 + 20 + 200);
        assert_eq!(out.level_up, Some(LevelUp { from: 1, to: 4 }));
    }
}
