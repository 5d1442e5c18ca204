//! Dashboard statistics derived from stored rows.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::appointments::{Appointment, AppointmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsTimeframe {
    Day,
    #[default]
    Week,
    Month,
}

impl StatsTimeframe {
    pub fn days(&self) -> i64 {
        match self {
            StatsTimeframe::Day => 1,
            StatsTimeframe::Week => 7,
            StatsTimeframe::Month => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewCounts {
    pub total_users: i64,
    pub total_therapists: i64,
    pub pending_therapists: i64,
    pub total_appointments: i64,
    pub total_mood_entries: i64,
    pub total_journal_entries: i64,
    pub total_chat_messages: i64,
    pub pending_flags: i64,
}

/// Activity recorded on one UTC day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub new_users: i64,
    pub mood_entries: i64,
    pub journal_entries: i64,
    pub chat_messages: i64,
    pub appointments: i64,
}

impl DailyActivity {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    fn add(&mut self, other: &DailyActivity) {
        self.new_users += other.new_users;
        self.mood_entries += other.mood_entries;
        self.journal_entries += other.journal_entries;
        self.chat_messages += other.chat_messages;
        self.appointments += other.appointments;
    }
}

/// One point per day for the `days` days ending today, oldest first. Days
/// without rows are zero.
pub fn daily_series(rows: &[DailyActivity], today: NaiveDate, days: i64) -> Vec<DailyActivity> {
    let mut by_day: HashMap<NaiveDate, DailyActivity> = HashMap::new();
    for row in rows {
        by_day
            .entry(row.date)
            .or_insert_with(|| DailyActivity::empty(row.date))
            .add(row);
    }
    (0..days.max(1))
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            by_day
                .get(&date)
                .copied()
                .unwrap_or_else(|| DailyActivity::empty(date))
        })
        .collect()
}

/// Percentage change, 100 when there is nothing to compare against.
pub fn calculate_change(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        return 100;
    }
    (((current - previous) as f64 / previous as f64) * 100.0).round() as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    pub new_users: i64,
    pub mood_entries: i64,
    pub journal_entries: i64,
    pub chat_messages: i64,
    pub appointments: i64,
}

fn totals(series: &[DailyActivity]) -> DailyActivity {
    let mut total = DailyActivity::default();
    for day in series {
        total.add(day);
    }
    total
}

/// Compares the window ending today with the window of equal length before
/// it. `rows` must cover both windows.
pub fn period_changes(rows: &[DailyActivity], today: NaiveDate, days: i64) -> Changes {
    let both = daily_series(rows, today, days * 2);
    let (previous, current) = both.split_at(both.len() / 2);
    let (previous, current) = (totals(previous), totals(current));
    Changes {
        new_users: calculate_change(current.new_users, previous.new_users),
        mood_entries: calculate_change(current.mood_entries, previous.mood_entries),
        journal_entries: calculate_change(current.journal_entries, previous.journal_entries),
        chat_messages: calculate_change(current.chat_messages, previous.chat_messages),
        appointments: calculate_change(current.appointments, previous.appointments),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityShare {
    pub name: &'static str,
    pub value: i64,
}

pub fn activity_distribution(counts: &OverviewCounts) -> Vec<ActivityShare> {
    vec![
        ActivityShare {
            name: "Mood Tracking",
            value: counts.total_mood_entries,
        },
        ActivityShare {
            name: "Journaling",
            value: counts.total_journal_entries,
        },
        ActivityShare {
            name: "Chat",
            value: counts.total_chat_messages,
        },
        ActivityShare {
            name: "Appointments",
            value: counts.total_appointments,
        },
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistStats {
    pub total_clients: usize,
    pub pending_requests: usize,
    pub upcoming_sessions: usize,
    pub completed_sessions: usize,
}

pub fn therapist_stats(appointments: &[Appointment], now: DateTime<Utc>) -> TherapistStats {
    let clients: HashSet<_> = appointments.iter().map(|a| a.user_id).collect();
    TherapistStats {
        total_clients: clients.len(),
        pending_requests: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Pending)
            .count(),
        upcoming_sessions: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Confirmed && a.appointment_date >= now)
            .count(),
        completed_sessions: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::appointments::SessionType;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[test]
    fn test_change_helper() {
        assert_eq!(calculate_change(10, 0), 100);
        assert_eq!(calculate_change(0, 0), 100);
        assert_eq!(calculate_change(120, 115), 4);
        assert_eq!(calculate_change(5, 10), -50);
    }

    #[test]
    fn test_series_is_zero_filled_oldest_first() {
        let rows = vec![
            DailyActivity {
                date: today(),
                mood_entries: 3,
                ..Default::default()
            },
            DailyActivity {
                date: today() - Duration::days(2),
                journal_entries: 1,
                ..Default::default()
            },
            DailyActivity {
                date: today() - Duration::days(2),
                journal_entries: 2,
                ..Default::default()
            },
        ];
        let series = daily_series(&rows, today(), 7);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, today() - Duration::days(6));
        assert_eq!(series[6].mood_entries, 3);
        assert_eq!(series[4].journal_entries, 3);
        assert_eq!(series[5], DailyActivity::empty(today() - Duration::days(1)));

        assert_eq!(daily_series(&rows, today(), StatsTimeframe::Day.days()).len(), 1);
        assert_eq!(daily_series(&[], today(), StatsTimeframe::Month.days()).len(), 30);
    }

    #[test]
    fn test_period_changes_compare_adjacent_windows() {
        let rows = vec![
            DailyActivity {
                date: today(),
                appointments: 3,
                ..Default::default()
            },
            DailyActivity {
                date: today() - Duration::days(1),
                appointments: 2,
                ..Default::default()
            },
        ];
        let changes = period_changes(&rows, today(), 1);
        assert_eq!(changes.appointments, 50);
        assert_eq!(changes.mood_entries, 100);
    }

    #[test]
    fn test_therapist_stats() {
        let now = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        let client = Uuid::new_v4();
        let make = |user_id, status, offset_days| Appointment {
            id: Uuid::new_v4(),
            user_id,
            therapist_id: Uuid::nil(),
            appointment_date: now + Duration::days(offset_days),
            status,
            session_type: SessionType::Online,
            notes: None,
            created_at: now,
        };
        let list = vec![
            make(client, AppointmentStatus::Pending, 2),
            make(client, AppointmentStatus::Confirmed, 3),
            make(Uuid::new_v4(), AppointmentStatus::Confirmed, -3),
            make(Uuid::new_v4(), AppointmentStatus::Completed, -9),
        ];
        let stats = therapist_stats(&list, now);
        assert_eq!(stats.total_clients, 3);
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.upcoming_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
    }
}
