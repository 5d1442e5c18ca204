/**
 * Journal Routes
 * Voice recording drafts and saved journal entries
 */
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::data::fixtures::sample_journal_entries;
use crate::domain::gamification::{LedgerOutcome, PointAction};
use crate::domain::journal::{validate_audio, validate_entry, JournalEntry, JournalError, JournalRequest};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::recordings::RecordingDraft;
use crate::routes::points::award;
use crate::session::{MaybeSession, Session};
use crate::state::AppState;

/// Multipart field carrying the recording.
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardResponse {
    pub discarded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalCreated {
    pub entry: JournalEntry,
    pub points: Option<LedgerOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalListResponse {
    pub sample: bool,
    pub entries: Vec<JournalEntry>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return JournalError::TooLarge.into();
    }
    tracing::warn!(error = %e, "Multipart error");
    AppError::Validation("Invalid multipart data".to_string())
}

/// POST /api/journal/recording - Upload audio as the current draft
pub async fn upload_recording(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RecordingDraft>), AppError> {
    let mut audio = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(AUDIO_FIELD) || (audio.is_none() && field.file_name().is_some()) {
            audio = Some(field.bytes().await.map_err(multipart_error)?);
        }
    }
    let bytes = audio.ok_or(JournalError::NoAudio)?;

    let format = validate_audio(&bytes)?;
    let draft = state
        .recordings
        .replace(session.user_id, &bytes, format)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %session.user_id, error = %e, "Failed to store recording");
            AppError::Internal
        })?;

    Ok((StatusCode::CREATED, Json(draft)))
}

/// GET /api/journal/recording - The draft waiting to be saved, if any
pub async fn current_recording(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<RecordingDraft>, AppError> {
    state
        .recordings
        .get(session.user_id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("recording"))
}

/// DELETE /api/journal/recording - Discard the current draft
pub async fn discard_recording(
    State(state): State<AppState>,
    session: Session,
) -> Json<DiscardResponse> {
    Json(DiscardResponse {
        discarded: state.recordings.discard(session.user_id).await,
    })
}

/// POST /api/journal - Save an entry, consuming the draft recording if any
pub async fn create_entry(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<JournalRequest>,
) -> Result<(StatusCode, Json<JournalCreated>), AppError> {
    let user_id = session.user_id;
    let draft = state.recordings.consume(user_id).await;

    let new_entry = validate_entry(
        user_id,
        &req,
        draft.as_ref().map(|d| d.audio_url.clone()),
        draft.as_ref().map(|d| d.transcript.as_str()),
    );
    let saved = match new_entry {
        Ok(new_entry) => state.data.insert_journal(new_entry).await.map_err(AppError::from),
        Err(e) => Err(e.into()),
    };
    let entry = match saved {
        Ok(entry) => entry,
        Err(e) => {
            if let Some(draft) = draft {
                state.recordings.restore(user_id, draft).await;
            }
            return Err(e);
        }
    };

    tracing::info!(
        user_id = %user_id,
        entry_id = %entry.id,
        with_audio = entry.audio_url.is_some(),
        "Journal entry saved"
    );
    let points = award(&state, user_id, PointAction::JournalEntry).await;
    Ok((StatusCode::CREATED, Json(JournalCreated { entry, points })))
}

/// GET /api/journal
pub async fn list_entries(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<JournalListResponse>, AppError> {
    let response = match session {
        Some(session) => JournalListResponse {
            sample: false,
            entries: state.data.list_journal(session.user_id).await?,
        },
        None => JournalListResponse {
            sample: true,
            entries: sample_journal_entries(Utc::now()),
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use crate::domain::journal::SIMULATED_TRANSCRIPT;
    use crate::routes::test_support::TestApp;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::json;

    const BOUNDARY: &str = "mindcare-test-boundary";

    fn upload(token: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"note.wav\"\r\nContent-Type: audio/wav\r\n\r\n",
                b = BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/journal/recording")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt \x10\x00\x00\x00";

    #[tokio::test]
    async fn test_upload_then_save_consumes_draft() {
        let app = TestApp::new();
        let (_, token) = app.user_token();

        let (status, draft) = app.send(upload(&token, WAV)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(draft["format"], "wav");
        assert_eq!(draft["transcript"], SIMULATED_TRANSCRIPT);
        let audio = draft["audioUrl"].as_str().unwrap().to_string();

        let (status, current) = app.get("/api/journal/recording", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["id"], draft["id"]);

        let (status, body) = app
            .post("/api/journal", Some(&token), json!({"notes": "Felt lighter after the walk"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["entry"]["audioUrl"], audio);
        assert_eq!(body["entry"]["transcript"], SIMULATED_TRANSCRIPT);
        assert_eq!(body["points"]["pointsAwarded"], 10);
        assert!(app.state.recordings.dir().join(&audio).exists());
        let (status, _) = app.get("/api/journal/recording", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = app.get("/api/journal", Some(&token)).await;
        assert_eq!(body["sample"], false);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_upload_deletes_first_audio() {
        let app = TestApp::new();
        let (_, token) = app.user_token();

        let (_, first) = app.send(upload(&token, WAV)).await;
        let (_, second) = app.send(upload(&token, WAV)).await;
        let dir = app.state.recordings.dir();
        assert!(!dir.join(first["audioUrl"].as_str().unwrap()).exists());
        assert!(dir.join(second["audioUrl"].as_str().unwrap()).exists());

        let (status, body) = app.call(Method::DELETE, "/api/journal/recording", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["discarded"], true);
        assert!(!dir.join(second["audioUrl"].as_str().unwrap()).exists());
    }

    #[tokio::test]
    async fn test_non_audio_upload_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let (status, body) = app.send(upload(&token, b"<html>not audio</html>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "File content is not a supported audio format");
    }

    #[tokio::test]
    async fn test_empty_entry_rejected() {
        let app = TestApp::new();
        let (_, token) = app.user_token();
        let (status, _) = app
            .post("/api/journal", Some(&token), json!({"transcript": "  ", "notes": ""}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = app.get("/api/journal", Some(&token)).await;
        assert_eq!(body["entries"], json!([]));
    }

    #[tokio::test]
    async fn test_anonymous_list_is_sample() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/journal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sample"], true);
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    }
}
