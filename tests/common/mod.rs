//! Shared harness: a full router wired to in-memory backends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use studio_auth::config::{
    AuthConfig, Environment, JwtConfig, MongoConfig, RedisConfig, SecurityConfig,
};
use studio_auth::db::MemoryStore;
use studio_auth::services::{MemoryRevocationStore, RateLimitService};
use studio_auth::{build_router, AppState};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    ip_counter: AtomicU32,
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Dev,
        service_name: "studio-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        port: 0,
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "unused".to_string(),
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            session_ttl_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let revocation = Arc::new(MemoryRevocationStore::new());
    let rate_limiter = RateLimitService::new(store.clone());

    let state = AppState::new(
        Arc::new(test_config()),
        store.clone(),
        revocation,
        rate_limiter,
    )
    .expect("test app state");

    TestApp {
        router: build_router(state),
        store,
        ip_counter: AtomicU32::new(1),
    }
}

impl TestApp {
    /// Issue a request from a distinct client IP, so tests exercising
    /// several accounts do not trip the per-IP auth budget.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let n = self.ip_counter.fetch_add(1, Ordering::Relaxed);
        let ip = format!("198.51.100.{}", n % 250 + 1);
        self.request_from_ip(method, path, &ip, token, body).await
    }

    pub async fn request_from_ip(
        &self,
        method: &str,
        path: &str,
        ip: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn register(&self, email: &str, name: &str) -> Value {
        let (status, body) = self
            .request(
                "POST",
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "correct-horse-battery",
                    "name": name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    pub async fn login(&self, email: &str) -> Value {
        let (status, body) = self
            .request(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "correct-horse-battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }
}

pub fn token(session: &Value) -> &str {
    session["token"].as_str().expect("token")
}
