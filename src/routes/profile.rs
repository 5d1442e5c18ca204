/**
 * Profile Routes
 * Onboarding profile for signed-in users
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::domain::gamification::{LedgerOutcome, PointAction};
use crate::domain::profile::{validate_onboarding, OnboardingForm, Profile, ProfileUpdate};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::session::Session;
use crate::routes::points::award;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProfile {
    #[serde(flatten)]
    pub profile: Profile,
    /// Achievements the finished profile completed, if any.
    pub points: Option<LedgerOutcome>,
}

/// POST /api/profile - Complete onboarding
pub async fn create_profile(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<OnboardingForm>,
) -> Result<(StatusCode, Json<CreatedProfile>), AppError> {
    let new_profile = validate_onboarding(session.user_id, &form)?;
    let profile = state.data.create_profile(new_profile).await?;

    tracing::info!(user_id = %session.user_id, "Profile created");
    // Moods logged before onboarding may already satisfy First Steps.
    let points = award(&state, session.user_id, PointAction::ProfileCompleted).await;
    Ok((StatusCode::CREATED, Json(CreatedProfile { profile, points })))
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Profile>, AppError> {
    state
        .data
        .get_profile(session.user_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("profile"))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let current = state
        .data
        .get_profile(session.user_id)
        .await?
        .ok_or(AppError::NotFound("profile"))?;
    let next = current.apply(&update)?;
    let saved = state.data.update_profile(&next).await?;

    tracing::info!(user_id = %session.user_id, "Profile updated");
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    fn onboarding() -> serde_json::Value {
        json!({
            "nickname": "  Kivuli ",
            "ageRange": "18-24",
            "primaryConcerns": ["anxiety", "sleep", "anxiety"],
            "preferredTherapistGender": "female",
            "termsAccepted": true
        })
    }

    #[tokio::test]
    async fn test_create_then_read_profile() {
        let app = TestApp::new();
        let (id, token) = app.user_token();

        let (status, body) = app.post("/api/profile", Some(&token), onboarding()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["nickname"], "Kivuli");
        assert_eq!(body["preferredLanguage"], "Swahili");
        assert_eq!(body["primaryConcerns"], json!(["anxiety", "sleep"]));

        let (status, body) = app.get("/api/profile", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ageRange"], "18-24");
    }

    #[tokio::test]
    async fn test_profile_after_first_mood_unlocks_first_steps() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let (_, mood) = app.post("/api/mood", Some(&token), json!({"moodValue": 6})).await;
        assert!(mood["points"]["unlocked"].as_array().unwrap().is_empty());

        let (status, body) = app.post("/api/profile", Some(&token), onboarding()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["points"]["pointsAwarded"], 50);
        assert_eq!(body["points"]["unlocked"][0]["id"], "first-steps");

        let (_, points) = app.get("/api/points", Some(&token)).await;
        assert_eq!(points["totalPoints"], 55);
        let first_steps = points["achievements"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["id"] == "first-steps")
            .unwrap();
        assert_eq!(first_steps["achieved"], true);
    }

    #[tokio::test]
    async fn test_profile_alone_earns_nothing() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let (_, body) = app.post("/api/profile", Some(&token), onboarding()).await;
        assert_eq!(body["points"]["pointsAwarded"], 0);

        let (_, points) = app.get("/api/points", Some(&token)).await;
        assert_eq!(points["totalPoints"], 0);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let (status, body) = app
            .post("/api/profile", Some(&token), json!({"nickname": 42}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Invalid request");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_second_profile_is_conflict() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        app.post("/api/profile", Some(&token), onboarding()).await;
        let (status, body) = app.post("/api/profile", Some(&token), onboarding()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
    }

    #[tokio::test]
    async fn test_onboarding_requires_terms_and_session() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let mut form = onboarding();
        form["termsAccepted"] = json!(false);
        let (status, _) = app.post("/api/profile", Some(&token), form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.post("/api/profile", None, onboarding()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authorization required");
    }

    #[tokio::test]
    async fn test_partial_update() {
        let app = TestApp::new();
        let (_, token) = app.user_token();

        let (status, _) = app
            .call(Method::PATCH, "/api/profile", Some(&token), Some(json!({"nickname": "Nuru"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.post("/api/profile", Some(&token), onboarding()).await;
        let (status, body) = app
            .call(
                Method::PATCH,
                "/api/profile",
                Some(&token),
                Some(json!({"preferredLanguage": "English"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["preferredLanguage"], "English");
        assert_eq!(body["nickname"], "Kivuli");

        let (status, _) = app
            .call(Method::PATCH, "/api/profile", Some(&token), Some(json!({"ageRange": "99+"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
