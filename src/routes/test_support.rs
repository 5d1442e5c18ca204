/**
 * Test Support
 * Router harness shared by the handler tests
 */
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::chat::stub::StubCompletionClient;
use crate::chat::CompletionClient;
use crate::config::AppConfig;
use crate::data::{DataSource, FixtureDataSource};
use crate::session::{mint_token, UserType};
use crate::state::AppState;

pub const TEST_SECRET: &str = "router-test-secret";

pub struct TestApp {
    pub state: AppState,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_chat(StubCompletionClient::replying("That sounds hard. I'm here to listen."))
    }

    pub fn with_chat(client: impl CompletionClient) -> Self {
        Self::build(Arc::new(FixtureDataSource::seeded(Utc::now())), Arc::new(client))
    }

    pub fn with_data(data: Arc<dyn DataSource>) -> Self {
        Self::build(data, Arc::new(StubCompletionClient::replying("ok")))
    }

    fn build(data: Arc<dyn DataSource>, chat: Arc<dyn CompletionClient>) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = AppConfig {
            jwt_secret: TEST_SECRET.to_string(),
            upload_dir: uploads.path().to_path_buf(),
            ..Default::default()
        };
        Self {
            state: AppState::new(config, data, chat),
            _uploads: uploads,
        }
    }

    pub fn router(&self) -> Router {
        crate::create_app(self.state.clone())
    }

    pub fn token(&self, user_id: Uuid, user_type: UserType) -> String {
        mint_token(TEST_SECRET, user_id, user_type)
    }

    pub fn user_token(&self) -> (Uuid, String) {
        let id = Uuid::new_v4();
        (id, self.token(id, UserType::User))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let res = self.router().oneshot(request).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}
