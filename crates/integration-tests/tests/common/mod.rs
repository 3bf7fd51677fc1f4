#![allow(dead_code)]

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::CookieAuthProvider;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use domains::{IdentityVerifier, PaymentVerifier};
use secrecy::SecretString;
use serde_json::{json, Value};
use services::{BucketCache, FeedService, PaymentService};
use storage_adapters::LocalBlobStore;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

#[derive(Default)]
pub struct Options {
    pub debug_routes: bool,
    pub identity: Option<Arc<dyn IdentityVerifier>>,
    pub payments: Option<Arc<dyn PaymentVerifier>>,
}

pub fn app() -> TestApp {
    app_with(Options {
        debug_routes: true,
        ..Default::default()
    })
}

pub fn app_with(options: Options) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalBlobStore::new(dir.path()));
    let feed = Arc::new(FeedService::new(Arc::new(BucketCache::new(store))));
    let auth = Arc::new(CookieAuthProvider::new(
        Some(&SecretString::from("integration-secret".to_string())),
        chrono::Duration::hours(24),
    ));
    let payments = Arc::new(PaymentService::new(options.payments));

    let mut state = AppState::new(feed, payments, auth);
    if let Some(verifier) = options.identity {
        state = state.with_identity_verifier(verifier);
    }
    TestApp {
        router: router(state.clone(), options.debug_routes),
        state,
        dir,
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> Reply {
        self.post_raw(uri, body.to_string(), cookie).await
    }

    pub async fn post_raw(&self, uri: &str, body: String, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Logs in and returns the `name=value` pair to send back as a cookie.
    pub async fn login(&self, display_name: &str) -> String {
        let reply = self
            .post("/auth/login", json!({ "displayName": display_name }), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        session_pair(&reply.headers)
    }

    pub async fn create_community(&self, name: &str, cookie: &str) -> String {
        let reply = self
            .post("/communities", json!({ "name": name, "description": "d" }), Some(cookie))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body["community"]["id"].as_str().unwrap().to_string()
    }

    pub async fn create_news(&self, community_id: &str, title: &str, cookie: &str) -> String {
        let reply = self
            .post(
                "/news",
                json!({ "title": title, "content": "body", "community_id": community_id }),
                Some(cookie),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body["news"]["id"].as_str().unwrap().to_string()
    }
}

pub fn session_pair(headers: &HeaderMap) -> String {
    let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    cookie.split(';').next().unwrap().to_string()
}
