use std::sync::Arc;
use std::time::Duration;

use std::net::SocketAddr;

use axum::{http::StatusCode, routing::post, Router};
use chrono::{Duration as ChronoDuration, Utc};

use presence::client::api::SessionKeyApi;
use presence::client::http::HttpSessionKeyApi;
use presence::config::Config;
use presence::crypto::secret::SessionSecret;
use presence::error::{ErrorKind, ProtocolError};
use presence::middleware_layer::rate_limit::{per_ip_limit, PER_IP_BURST};
use presence::models::principal::{Principal, Role};
use presence::repositories::attempts::MemoryAttemptCounter;
use presence::repositories::attendance::MemoryAttendanceStore;
use presence::repositories::principal::MemoryPrincipalStore;
use presence::repositories::secret::MemorySecretStore;
use presence::routes;
use presence::state::AppState;

const TEACHER_ID: i64 = 33;

fn app_state(principals: MemoryPrincipalStore) -> AppState {
    AppState::with_stores(
        Config::default(),
        Arc::new(MemorySecretStore::new()),
        Arc::new(MemoryAttendanceStore::new()),
        Arc::new(principals),
        Arc::new(MemoryAttemptCounter::new()),
    )
}

/// Serves the router on an ephemeral port and returns its base URL.
async fn spawn_server() -> String {
    let principals = MemoryPrincipalStore::new();
    principals
        .insert(
            "teacher-token",
            Principal {
                user_id: TEACHER_ID,
                role: Role::Teacher,
                expires_at: Utc::now() + ChronoDuration::hours(1),
            },
        )
        .await;

    let state = app_state(principals);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::router(state)).await.unwrap();
    });

    format!("http://{}/", addr)
}

/// Same as [`spawn_server`], behind the per-IP limiter the server binary installs.
async fn spawn_limited_server() -> String {
    let principals = MemoryPrincipalStore::new();
    principals
        .insert(
            "teacher-token",
            Principal {
                user_id: TEACHER_ID,
                role: Role::Teacher,
                expires_at: Utc::now() + ChronoDuration::hours(1),
            },
        )
        .await;

    let app = per_ip_limit(routes::router(app_state(principals))).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

/// A check endpoint that always answers with `status`.
async fn spawn_check_stub(status: StatusCode) -> String {
    let app = Router::new().route(
        "/api/session/check",
        post(move || async move { (status, r#"{"error":"stubbed"}"#) }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn check_against(status: StatusCode) -> ProtocolError {
    let api = HttpSessionKeyApi::new(spawn_check_stub(status).await, Duration::from_secs(5)).unwrap();
    api.check(&SessionSecret::generate(60)).await.unwrap_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_then_check() {
        let base_url = spawn_server().await;
        let api = HttpSessionKeyApi::new(base_url, Duration::from_secs(5)).unwrap();

        let secret = api.issue("teacher-token").await.unwrap();
        assert_eq!(secret.ttl_seconds(), 3600);
        assert_eq!(api.check(&secret).await.unwrap(), TEACHER_ID);

        // Re-issuing invalidates the previous key
        let replacement = api.issue("teacher-token").await.unwrap();
        assert!(matches!(
            api.check(&secret).await,
            Err(ProtocolError::SecretRejected(_))
        ));
        assert_eq!(api.check(&replacement).await.unwrap(), TEACHER_ID);
    }

    #[tokio::test]
    async fn test_bad_credential_is_unauthorized() {
        let base_url = spawn_server().await;
        let api = HttpSessionKeyApi::new(base_url, Duration::from_secs(5)).unwrap();

        assert_eq!(
            api.issue("nobody").await.unwrap_err(),
            ProtocolError::IssuanceUnauthorized
        );
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let base_url = spawn_server().await;
        let api = HttpSessionKeyApi::new(base_url, Duration::from_secs(5)).unwrap();

        let err = api.check(&SessionSecret::generate(60)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::SecretRejected(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let api = HttpSessionKeyApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        assert!(matches!(
            api.issue("teacher-token").await,
            Err(ProtocolError::IssuanceUnavailable(_))
        ));
        assert!(matches!(
            api.check(&SessionSecret::generate(60)).await,
            Err(ProtocolError::CheckUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_throttled_check_is_not_a_rejection() {
        let err = check_against(StatusCode::TOO_MANY_REQUESTS).await;
        assert_eq!(err, ProtocolError::CheckUnavailable("stubbed".to_string()));

        let err = check_against(StatusCode::REQUEST_TIMEOUT).await;
        assert!(matches!(err, ProtocolError::CheckUnavailable(_)));
    }

    #[tokio::test]
    async fn test_server_error_on_check_is_unavailable() {
        let err = check_against(StatusCode::INTERNAL_SERVER_ERROR).await;
        assert_eq!(err, ProtocolError::CheckUnavailable("stubbed".to_string()));

        let err = check_against(StatusCode::SERVICE_UNAVAILABLE).await;
        assert!(matches!(err, ProtocolError::CheckUnavailable(_)));
    }

    #[tokio::test]
    async fn test_not_found_on_check_is_a_rejection() {
        let err = check_against(StatusCode::NOT_FOUND).await;
        assert_eq!(err, ProtocolError::SecretRejected("stubbed".to_string()));
        assert_eq!(err.kind(), ErrorKind::SecretRejected);

        let err = check_against(StatusCode::BAD_REQUEST).await;
        assert!(matches!(err, ProtocolError::SecretRejected(_)));
    }

    #[tokio::test]
    async fn test_per_ip_limit_sustains_presenter_cadence() {
        let base_url = spawn_limited_server().await;
        let api = HttpSessionKeyApi::new(base_url, Duration::from_secs(5)).unwrap();
        let secret = api.issue("teacher-token").await.unwrap();

        // Past the burst, at a pace slower than the bucket refills
        for i in 0..(PER_IP_BURST as usize + 20) {
            let checked = api.check(&secret).await;
            assert_eq!(checked, Ok(TEACHER_ID), "check #{} was throttled", i);
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
