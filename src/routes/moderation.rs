/**
 * Moderation Routes
 * Admin queue for flagged chat messages
 */
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::moderation::{
    plan_dismiss, plan_review, search_flags, ChatRule, DismissPlan, FlagStatus, FlaggedMessage,
    ReviewRequest, UserViolation, CHAT_RULES,
};
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FlagQuery {
    pub search: Option<String>,
    pub status: Option<FlagStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagListResponse {
    pub flags: Vec<FlaggedMessage>,
    pub pending: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub flag_id: Uuid,
    pub status: FlagStatus,
    pub violation: UserViolation,
}

async fn load_flag(state: &AppState, id: Uuid) -> Result<FlaggedMessage, AppError> {
    state
        .data
        .get_flag(id)
        .await?
        .ok_or(AppError::NotFound("flagged message"))
}

/// GET /api/admin/moderation/flags?search=&status=
pub async fn list_flags(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<FlagQuery>,
) -> Result<Json<FlagListResponse>, AppError> {
    session.require_admin()?;
    let all = state.data.list_flags().await?;
    let pending = all.iter().filter(|f| f.status == FlagStatus::Pending).count();
    let total = all.len();

    let mut flags = search_flags(&all, query.search.as_deref().unwrap_or(""));
    if let Some(status) = query.status {
        flags.retain(|f| f.status == status);
    }

    Ok(Json(FlagListResponse {
        flags,
        pending,
        total,
    }))
}

/// POST /api/admin/moderation/flags/{id}/review
pub async fn review_flag(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    session.require_admin()?;
    let flag = load_flag(&state, id).await?;
    let violation = plan_review(&flag, &req)?;

    let recorded = state
        .data
        .review_flag(violation, Utc::now())
        .await?
        .ok_or_else(|| {
            AppError::Conflict("This message was handled by another moderator".to_string())
        })?;

    tracing::info!(
        admin_id = %session.user_id,
        flag_id = %id,
        rule_id = recorded.rule_id,
        action = recorded.action.as_str(),
        "Flagged message reviewed"
    );
    Ok(Json(ReviewResponse {
        flag_id: id,
        status: FlagStatus::Reviewed,
        violation: recorded,
    }))
}

/// POST /api/admin/moderation/flags/{id}/dismiss
pub async fn dismiss_flag(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<FlaggedMessage>, AppError> {
    session.require_admin()?;
    let flag = load_flag(&state, id).await?;

    match plan_dismiss(&flag)? {
        DismissPlan::AlreadyDismissed => Ok(Json(flag)),
        DismissPlan::Transition => {
            let closed = match state.data.close_flag(id, FlagStatus::Dismissed, Utc::now()).await? {
                Some(closed) => closed,
                // Lost a race. Dismissing twice is fine, dismissing a reviewed flag is not.
                None => {
                    let current = load_flag(&state, id).await?;
                    plan_dismiss(&current)?;
                    current
                }
            };
            tracing::info!(admin_id = %session.user_id, flag_id = %id, "Flagged message dismissed");
            Ok(Json(closed))
        }
    }
}

/// GET /api/admin/moderation/rules
pub async fn list_rules(session: Session) -> Result<Json<&'static [ChatRule]>, AppError> {
    session.require_admin()?;
    Ok(Json(CHAT_RULES))
}

/// GET /api/admin/moderation/violations
pub async fn list_violations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<UserViolation>>, AppError> {
    session.require_admin()?;
    Ok(Json(state.data.list_violations().await?))
}

#[cfg(test)]
mod tests {
    use crate::data::fixtures::sample_flags;
    use crate::routes::test_support::TestApp;
    use crate::session::UserType;
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn admin(app: &TestApp) -> String {
        app.token(Uuid::new_v4(), UserType::Admin)
    }

    fn first_flag() -> Uuid {
        sample_flags(Utc::now())[0].id
    }

    #[tokio::test]
    async fn test_queue_is_admin_only_and_searchable() {
        let app = TestApp::new();
        let (_, user) = app.user_token();
        let (status, _) = app.get("/api/admin/moderation/flags", Some(&user)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let token = admin(&app);
        let (status, body) = app.get("/api/admin/moderation/flags", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["pending"], 3);

        let (_, body) = app.get("/api/admin/moderation/flags?search=SPAM", Some(&token)).await;
        assert_eq!(body["flags"].as_array().unwrap().len(), 1);
        assert_eq!(body["flags"][0]["reporterName"], "HealthSeeker");
    }

    #[tokio::test]
    async fn test_review_records_violation_once() {
        let app = TestApp::new();
        let token = admin(&app);
        let uri = format!("/api/admin/moderation/flags/{}/review", first_flag());

        let (status, _) = app.post(&uri, Some(&token), json!({"reason": "abusive"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .post(&uri, Some(&token), json!({"ruleId": 2, "reason": "Threatening language"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "reviewed");
        assert_eq!(body["violation"]["severity"], 3);
        assert_eq!(body["violation"]["action"], "ban");

        let (status, _) = app
            .post(&uri, Some(&token), json!({"ruleId": 1, "reason": "again"}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let dismiss = format!("/api/admin/moderation/flags/{}/dismiss", first_flag());
        let (status, _) = app.post(&dismiss, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, violations) = app.get("/api/admin/moderation/violations", Some(&token)).await;
        assert_eq!(violations.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reporter_is_never_penalized() {
        let app = TestApp::new();
        let (reporter, user) = app.user_token();
        let (status, flag) = app
            .post(
                "/api/chat/flag",
                Some(&user),
                json!({"messageId": "m-7", "content": "Stop taking your medication.", "reason": "harmful"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(flag["reporterId"], reporter.to_string());
        assert!(flag["authorId"].is_null());

        let token = admin(&app);
        let uri = format!("/api/admin/moderation/flags/{}/review", flag["id"].as_str().unwrap());
        let (status, body) = app
            .post(&uri, Some(&token), json!({"ruleId": 3, "reason": "Unsafe advice"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["violation"]["action"], "ban");
        assert_ne!(body["violation"]["userId"], json!(reporter.to_string()));
        assert!(body["violation"]["userId"].is_null());

        // Seeded flags carry a human author, who is the one recorded.
        let seeded = sample_flags(Utc::now()).remove(1);
        let uri = format!("/api/admin/moderation/flags/{}/review", seeded.id);
        let (_, body) = app
            .post(&uri, Some(&token), json!({"ruleId": 1, "reason": "Rude"}))
            .await;
        assert_eq!(body["violation"]["userId"], json!(seeded.author_id));
        assert_ne!(body["violation"]["userId"], json!(seeded.reporter_id));
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let app = TestApp::new();
        let token = admin(&app);
        let uri = format!("/api/admin/moderation/flags/{}/dismiss", first_flag());

        let (status, body) = app.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "dismissed");
        assert!(body["reviewedAt"].is_string());

        let (status, body) = app.post(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "dismissed");

        let (_, body) = app.get("/api/admin/moderation/flags?status=pending", Some(&token)).await;
        assert_eq!(body["flags"].as_array().unwrap().len(), 2);

        let missing = format!("/api/admin/moderation/flags/{}/dismiss", Uuid::new_v4());
        let (status, _) = app.post(&missing, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rules_listing() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/admin/moderation/rules", Some(&admin(&app))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Respectful Communication");
    }
}
