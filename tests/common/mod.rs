#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use actix_http::Request;
use blog_auth_server::db::MemoryUserRepository;
use blog_auth_server::{AppState, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use totp_rs::{Algorithm, Secret, TOTP};

pub struct Backends {
    pub state: web::Data<AppState>,
    pub users: MemoryUserRepository,
    pub store: MemoryStore,
}

pub fn backends() -> Backends {
    let settings = Settings::new_for_test().expect("Failed to load test config");
    let users = MemoryUserRepository::new();
    let store = MemoryStore::new();
    let state = AppState::with_backends(settings, Arc::new(users.clone()), Arc::new(store.clone()));

    Backends {
        state: web::Data::new(state),
        users,
        store,
    }
}

async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post<S, B>(app: &S, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let mut req = test::TestRequest::post().uri(uri).set_json(body);
    if let Some(token) = token {
        req = req.insert_header(("Authorization", format!("Bearer {}", token)));
    }
    send(app, req.to_request()).await
}

pub async fn get<S, B>(app: &S, uri: &str, token: Option<&str>) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let mut req = test::TestRequest::get().uri(uri);
    if let Some(token) = token {
        req = req.insert_header(("Authorization", format!("Bearer {}", token)));
    }
    send(app, req.to_request()).await
}

/// Registers a user and returns the token pair body.
pub async fn register<S, B>(app: &S, username: &str, password: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = post(
        app,
        "/auth/register",
        json!({ "username": username, "password": password }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body
}

pub fn access_token(pair: &Value) -> &str {
    pair["access_token"].as_str().expect("access_token in response")
}

pub fn totp_code(secret: &str) -> String {
    let bytes = Secret::Encoded(secret.to_string()).to_bytes().unwrap();
    TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes, None, "test".into())
        .unwrap()
        .generate_current()
        .unwrap()
}
