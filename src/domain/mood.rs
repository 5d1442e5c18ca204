//! Mood samples and their aggregation over a timeframe.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_MOOD: i32 = 1;
pub const MAX_MOOD: i32 = 10;
/// Chart history never shows more than this many samples.
pub const DISPLAY_LIMIT: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood_value: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMoodEntry {
    pub user_id: Uuid,
    pub mood_value: i32,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoodError {
    #[error("Mood value must be between 1 and 10, got {0}")]
    OutOfRange(i32),
}

pub fn validate_mood(
    user_id: Uuid,
    mood_value: i32,
    note: Option<&str>,
) -> Result<NewMoodEntry, MoodError> {
    if !(MIN_MOOD..=MAX_MOOD).contains(&mood_value) {
        return Err(MoodError::OutOfRange(mood_value));
    }
    Ok(NewMoodEntry {
        user_id,
        mood_value,
        note: note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl Timeframe {
    /// Start of the window ending at `now`. Month and year are calendar
    /// offsets, so February windows are shorter than March ones.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::Day => now - Duration::days(1),
            Timeframe::Week => now - Duration::days(7),
            Timeframe::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
            Timeframe::Year => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(now - Duration::days(365)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoodLabel {
    Good,
    Neutral,
    Low,
}

pub fn mood_label(value: i32) -> MoodLabel {
    if value >= 7 {
        MoodLabel::Good
    } else if value >= 4 {
        MoodLabel::Neutral
    } else {
        MoodLabel::Low
    }
}

/// Arithmetic mean of the values, `None` for an empty slice.
pub fn average(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
    Some(sum as f64 / values.len() as f64)
}

/// Entries whose timestamp falls in `[now - timeframe, now]`, newest first.
pub fn in_window(entries: &[MoodEntry], timeframe: Timeframe, now: DateTime<Utc>) -> Vec<MoodEntry> {
    let start = timeframe.window_start(now);
    let mut selected: Vec<MoodEntry> = entries
        .iter()
        .filter(|e| e.created_at >= start && e.created_at <= now)
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    selected
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub timeframe: Timeframe,
    pub average: Option<f64>,
    pub latest_label: Option<MoodLabel>,
    pub entries: Vec<MoodEntry>,
    /// Most recent samples, oldest first, for the history chart.
    pub chart: Vec<ChartPoint>,
}

pub fn summarize(entries: &[MoodEntry], timeframe: Timeframe, now: DateTime<Utc>) -> MoodSummary {
    let windowed = in_window(entries, timeframe, now);
    let values: Vec<i32> = windowed.iter().map(|e| e.mood_value).collect();

    let mut chart: Vec<ChartPoint> = windowed
        .iter()
        .take(DISPLAY_LIMIT)
        .map(|e| ChartPoint {
            date: e.created_at,
            value: e.mood_value,
        })
        .collect();
    chart.reverse();

    MoodSummary {
        timeframe,
        average: average(&values),
        latest_label: windowed.first().map(|e| mood_label(e.mood_value)),
        entries: windowed,
        chart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    fn entry(value: i32, days_ago: i64) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            mood_value: value,
            note: None,
            created_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_average_is_arithmetic_mean() {
        assert_eq!(average(&[7, 5, 8, 4]), Some(6.0));
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn test_mood_value_range() {
        assert!(validate_mood(Uuid::nil(), 1, None).is_ok());
        assert!(validate_mood(Uuid::nil(), 10, Some("  ")).unwrap().note.is_none());
        assert_eq!(
            validate_mood(Uuid::nil(), 0, None),
            Err(MoodError::OutOfRange(0))
        );
        assert_eq!(
            validate_mood(Uuid::nil(), 11, None),
            Err(MoodError::OutOfRange(11))
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(mood_label(7), MoodLabel::Good);
        assert_eq!(mood_label(4), MoodLabel::Neutral);
        assert_eq!(mood_label(3), MoodLabel::Low);
    }

    #[test]
    fn test_week_window_excludes_older_entries() {
        let entries = vec![entry(7, 0), entry(5, 1), entry(8, 2), entry(4, 3), entry(1, 9)];
        let summary = summarize(&entries, Timeframe::Week, now());
        assert_eq!(summary.entries.len(), 4);
        assert_eq!(summary.average, Some(6.0));
        assert_eq!(summary.latest_label, Some(MoodLabel::Good));
    }

    #[test]
    fn test_month_window_is_calendar_month() {
        // 2024-03-31 minus one month clamps to 2024-02-29.
        let start = Timeframe::Month.window_start(now());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_chart_is_capped_to_seven_recent_entries_oldest_first() {
        let entries: Vec<MoodEntry> = (0..20).map(|d| entry((d % 10) as i32 + 1, d)).collect();
        let summary = summarize(&entries, Timeframe::Month, now());
        assert_eq!(summary.chart.len(), DISPLAY_LIMIT);
        assert!(summary.chart.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(summary.chart.last().map(|p| p.date), Some(now()));
    }

    #[test]
    fn test_empty_window_has_no_average() {
        let summary = summarize(&[entry(5, 40)], Timeframe::Week, now());
        assert!(summary.entries.is_empty());
        assert_eq!(summary.average, None);
        assert_eq!(summary.latest_label, None);
    }
}
