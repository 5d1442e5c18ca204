//! Flagged-message queue, community rules and violation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Pending,
    Reviewed,
    Dismissed,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Pending => "pending",
            FlagStatus::Reviewed => "reviewed",
            FlagStatus::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlagStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FlagStatus::Pending),
            "reviewed" => Ok(FlagStatus::Reviewed),
            "dismissed" => Ok(FlagStatus::Dismissed),
            other => Err(format!("unknown flag status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedMessage {
    pub id: Uuid,
    pub message_id: String,
    pub reporter_id: Uuid,
    /// Who wrote the flagged message. `None` for assistant replies.
    pub author_id: Option<Uuid>,
    pub reporter_name: String,
    pub content: String,
    pub reason: String,
    pub status: FlagStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFlag {
    pub message_id: String,
    pub reporter_id: Uuid,
    pub author_id: Option<Uuid>,
    pub reporter_name: String,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRequest {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Minor = 1,
    Moderate = 2,
    Severe = 3,
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Severity::Minor),
            2 => Ok(Severity::Moderate),
            3 => Ok(Severity::Severe),
            other => Err(format!("severity must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    Warning,
    Suspension,
    Ban,
}

impl ViolationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationAction::Warning => "warning",
            ViolationAction::Suspension => "suspension",
            ViolationAction::Ban => "ban",
        }
    }
}

impl std::str::FromStr for ViolationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(ViolationAction::Warning),
            "suspension" => Ok(ViolationAction::Suspension),
            "ban" => Ok(ViolationAction::Ban),
            other => Err(format!("unknown violation action '{}'", other)),
        }
    }
}

impl From<Severity> for ViolationAction {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Minor => ViolationAction::Warning,
            Severity::Moderate => ViolationAction::Suspension,
            Severity::Severe => ViolationAction::Ban,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRule {
    pub id: i32,
    pub title: &'static str,
    pub description: &'static str,
    pub severity: Severity,
}

pub const CHAT_RULES: &[ChatRule] = &[
    ChatRule {
        id: 1,
        title: "Respectful Communication",
        description: "Always communicate respectfully with others. Avoid offensive language, personal attacks, or disrespectful behavior.",
        severity: Severity::Minor,
    },
    ChatRule {
        id: 2,
        title: "No Harassment",
        description: "Harassment of any kind is not tolerated. This includes threats, intimidation, or persistent unwanted contact.",
        severity: Severity::Severe,
    },
    ChatRule {
        id: 3,
        title: "No Harmful Content",
        description: "Do not share content that promotes self-harm, suicide, or harmful behaviors.",
        severity: Severity::Severe,
    },
    ChatRule {
        id: 4,
        title: "Privacy Respect",
        description: "Respect the privacy of others. Do not share personal information without consent.",
        severity: Severity::Moderate,
    },
    ChatRule {
        id: 5,
        title: "No Spam",
        description: "Do not send spam messages or repeatedly post the same content.",
        severity: Severity::Minor,
    },
];

pub fn find_rule(id: i32) -> Option<&'static ChatRule> {
    CHAT_RULES.iter().find(|r| r.id == id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserViolation {
    pub id: Uuid,
    /// The offending author. Empty when the flagged message came from the assistant.
    pub user_id: Option<Uuid>,
    pub flagged_message_id: Uuid,
    pub rule_id: i32,
    pub severity: Severity,
    pub action: ViolationAction,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewViolation {
    pub user_id: Option<Uuid>,
    pub flagged_message_id: Uuid,
    pub rule_id: i32,
    pub severity: Severity,
    pub action: ViolationAction,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub rule_id: Option<i32>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    #[error("Select the rule that was violated")]
    MissingRule,
    #[error("Unknown rule {0}")]
    UnknownRule(i32),
    #[error("Provide a reason for this action")]
    MissingReason,
    #[error("Provide the message content")]
    MissingContent,
    #[error("This message has already been {0}")]
    AlreadyClosed(FlagStatus),
}

/// Builds a flag for an assistant reply reported by `reporter_id`.
pub fn validate_flag(
    reporter_id: Uuid,
    reporter_name: &str,
    request: &FlagRequest,
) -> Result<NewFlag, ModerationError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ModerationError::MissingContent);
    }
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ModerationError::MissingReason);
    }
    let message_id = match request.message_id.trim() {
        "" => Uuid::new_v4().to_string(),
        id => id.to_string(),
    };
    Ok(NewFlag {
        message_id,
        reporter_id,
        author_id: None,
        reporter_name: reporter_name.to_string(),
        content: content.to_string(),
        reason: reason.to_string(),
    })
}

/// Checks a review against the flag's current state and builds the violation
/// it records against the message author, never the reporter. Nothing is
/// enforced on the user.
pub fn plan_review(
    flag: &FlaggedMessage,
    request: &ReviewRequest,
) -> Result<NewViolation, ModerationError> {
    let rule_id = request.rule_id.ok_or(ModerationError::MissingRule)?;
    let rule = find_rule(rule_id).ok_or(ModerationError::UnknownRule(rule_id))?;
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ModerationError::MissingReason);
    }
    if flag.status != FlagStatus::Pending {
        return Err(ModerationError::AlreadyClosed(flag.status));
    }
    Ok(NewViolation {
        user_id: flag.author_id,
        flagged_message_id: flag.id,
        rule_id: rule.id,
        severity: rule.severity,
        action: rule.severity.into(),
        reason: reason.to_string(),
    })
}

/// Outcome of a dismiss request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissPlan {
    Transition,
    AlreadyDismissed,
}

pub fn plan_dismiss(flag: &FlaggedMessage) -> Result<DismissPlan, ModerationError> {
    match flag.status {
        FlagStatus::Pending => Ok(DismissPlan::Transition),
        FlagStatus::Dismissed => Ok(DismissPlan::AlreadyDismissed),
        FlagStatus::Reviewed => Err(ModerationError::AlreadyClosed(FlagStatus::Reviewed)),
    }
}

/// Case-insensitive substring filter over content, reporter name and reason.
/// Keeps the input order.
pub fn search_flags(flags: &[FlaggedMessage], term: &str) -> Vec<FlaggedMessage> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return flags.to_vec();
    }
    flags
        .iter()
        .filter(|f| {
            f.content.to_lowercase().contains(&term)
                || f.reporter_name.to_lowercase().contains(&term)
                || f.reason.to_lowercase().contains(&term)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_flags;

    fn pending() -> FlaggedMessage {
        sample_flags(Utc::now()).remove(0)
    }

    #[test]
    fn test_severity_maps_to_action() {
        assert_eq!(ViolationAction::from(Severity::Minor), ViolationAction::Warning);
        assert_eq!(ViolationAction::from(Severity::Moderate), ViolationAction::Suspension);
        assert_eq!(ViolationAction::from(Severity::Severe), ViolationAction::Ban);
        assert_eq!(find_rule(2).map(|r| r.severity), Some(Severity::Severe));
    }

    #[test]
    fn test_review_requires_rule_and_reason() {
        let flag = pending();
        assert_eq!(
            plan_review(&flag, &ReviewRequest { rule_id: None, reason: "abuse".into() }),
            Err(ModerationError::MissingRule)
        );
        assert_eq!(
            plan_review(&flag, &ReviewRequest { rule_id: Some(1), reason: "  ".into() }),
            Err(ModerationError::MissingReason)
        );
        assert_eq!(
            plan_review(&flag, &ReviewRequest { rule_id: Some(42), reason: "x".into() }),
            Err(ModerationError::UnknownRule(42))
        );

        let violation = plan_review(
            &flag,
            &ReviewRequest { rule_id: Some(4), reason: "shared a phone number".into() },
        )
        .unwrap();
        assert_eq!(violation.action, ViolationAction::Suspension);
        assert_eq!(violation.flagged_message_id, flag.id);
        assert_eq!(violation.user_id, flag.author_id);
        assert_ne!(violation.user_id, Some(flag.reporter_id));
    }

    #[test]
    fn test_assistant_reply_violation_has_no_author() {
        let req = FlagRequest {
            message_id: "m1".into(),
            content: "unsafe reply".into(),
            reason: "harmful".into(),
        };
        let reporter = Uuid::new_v4();
        let new_flag = validate_flag(reporter, "Amina", &req).unwrap();
        assert_eq!(new_flag.reporter_id, reporter);
        assert_eq!(new_flag.author_id, None);

        let flag = FlaggedMessage {
            id: Uuid::new_v4(),
            message_id: new_flag.message_id,
            reporter_id: new_flag.reporter_id,
            author_id: new_flag.author_id,
            reporter_name: new_flag.reporter_name,
            content: new_flag.content,
            reason: new_flag.reason,
            status: FlagStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        let violation =
            plan_review(&flag, &ReviewRequest { rule_id: Some(3), reason: "x".into() }).unwrap();
        assert_eq!(violation.user_id, None);
    }

    #[test]
    fn test_closed_flags_cannot_be_reviewed() {
        let mut flag = pending();
        flag.status = FlagStatus::Dismissed;
        assert_eq!(
            plan_review(&flag, &ReviewRequest { rule_id: Some(1), reason: "x".into() }),
            Err(ModerationError::AlreadyClosed(FlagStatus::Dismissed))
        );
    }

    #[test]
    fn test_dismiss_needs_no_rule_and_is_idempotent() {
        let mut flag = pending();
        assert_eq!(plan_dismiss(&flag), Ok(DismissPlan::Transition));
        flag.status = FlagStatus::Dismissed;
        assert_eq!(plan_dismiss(&flag), Ok(DismissPlan::AlreadyDismissed));
        flag.status = FlagStatus::Reviewed;
        assert!(plan_dismiss(&flag).is_err());
    }

    #[test]
    fn test_search_is_order_preserving_and_idempotent() {
        let flags = sample_flags(Utc::now());
        let once = search_flags(&flags, "CONTENT");
        assert_eq!(search_flags(&once, "content"), once);
        let positions: Vec<usize> = once
            .iter()
            .map(|f| flags.iter().position(|g| g.id == f.id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let by_reporter = search_flags(&flags, "healthseeker");
        assert_eq!(by_reporter.len(), 1);
        assert_eq!(search_flags(&flags, "  ").len(), flags.len());
    }

    #[test]
    fn test_flag_requires_content_and_reason() {
        let req = FlagRequest {
            message_id: String::new(),
            content: "reply".into(),
            reason: "".into(),
        };
        assert_eq!(
            validate_flag(Uuid::nil(), "Anonymous User", &req),
            Err(ModerationError::MissingReason)
        );
        let req = FlagRequest { reason: "Harmful advice".into(), ..req };
        let flag = validate_flag(Uuid::nil(), "Anonymous User", &req).unwrap();
        assert!(!flag.message_id.is_empty());
    }
}
