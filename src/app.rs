use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let app = build_app(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    async fn register(app: &Router, name: &str, email: &str, password: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": name, "email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn register_returns_created_envelope() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "A", "email": "a@x.com", "password": "p1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "User Created Successfully");
        assert!(!body["token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_then_me_returns_same_identity() {
        let app = build_app(AppState::fake());
        let token = register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = call(&app, Method::GET, "/auth/me", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Success");
        assert_eq!(body["user"]["email"], "a@x.com");
        assert_eq!(body["user"]["name"], "A");
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["user"]["id"].is_string());
    }

    #[tokio::test]
    async fn register_validation_errors_are_unauthorized_with_fields() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "NOTOK");
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["errors"]["name"][0], "The name field is required.");
        assert_eq!(
            body["errors"]["email"][0],
            "The email must be a valid email address."
        );
        assert_eq!(
            body["errors"]["password"][0],
            "The password field is required."
        );
    }

    #[tokio::test]
    async fn unreadable_body_reports_missing_fields() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["password"].is_array());
    }

    #[tokio::test]
    async fn duplicate_email_never_creates_a_user() {
        let app = build_app(AppState::fake());
        let first = register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "B", "email": "a@x.com", "password": "p2"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["errors"]["email"][0],
            "The email has already been taken."
        );
        assert!(body.get("token").is_none());

        let (_, me) = call(&app, Method::GET, "/auth/me", Some(first.as_str()), None).await;
        assert_eq!(me["user"]["name"], "A");
        let (status, _) = login(&app, "a@x.com", "p2").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_losing_the_insert_race_is_a_server_error() {
        use crate::auth::memory::{BlindLookupUserStore, MemoryTokenStore};
        use std::sync::Arc;

        let tokens = Arc::new(MemoryTokenStore::default());
        let app = build_app(AppState::fake_with(
            Arc::new(BlindLookupUserStore::default()),
            tokens.clone(),
        ));
        register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "B", "email": "a@x.com", "password": "p2"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "NOTOK");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("unique constraint"));
        assert!(body.get("token").is_none());
        assert_eq!(tokens.count().await, 1);
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let app = build_app(AppState::fake());
        register(&app, "A", "a@x.com", "p1").await;

        let (s1, wrong_password) = login(&app, "a@x.com", "wrong").await;
        let (s2, unknown_email) = login(&app, "ghost@x.com", "p1").await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(
            wrong_password["message"],
            "Email & Password does not match with our record."
        );
        assert!(wrong_password.get("token").is_none());
    }

    #[tokio::test]
    async fn register_login_logout_scenario() {
        let app = build_app(AppState::fake());
        let t1 = register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = login(&app, "a@x.com", "wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("token").is_none());

        let (status, body) = login(&app, "a@x.com", "p1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "User Logged In Successfully");
        let t2 = body["token"].as_str().unwrap().to_string();
        assert_ne!(t1, t2);

        let (status, body) = call(&app, Method::POST, "/auth/logout", Some(t2.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Success");
        assert_eq!(body["message"], "User Logged Out Successfully");

        for token in [&t2, &t1] {
            let (status, body) =
                call(&app, Method::GET, "/auth/me", Some(token.as_str()), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["message"], "Unauthenticated.");
        }
        let (status, _) = call(&app, Method::POST, "/auth/logout", Some(t2.as_str()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let app = build_app(AppState::fake());
        for (method, uri) in [
            (Method::POST, "/auth/logout"),
            (Method::GET, "/auth/me"),
            (Method::POST, "/auth/change-password"),
        ] {
            let (status, body) = call(&app, method.clone(), uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["status"], "NOTOK");

            let (status, _) = call(&app, method, uri, Some("forged.token.value"), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn change_password_mismatch_is_rejected() {
        let app = build_app(AppState::fake());
        let token = register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/change-password",
            Some(token.as_str()),
            Some(json!({"password": "p2", "password_confirmation": "p3"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["errors"]["password"][0],
            "The password confirmation does not match."
        );

        let (status, _) = login(&app, "a@x.com", "p1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn change_password_swaps_the_credential() {
        let app = build_app(AppState::fake());
        let token = register(&app, "A", "a@x.com", "p1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/change-password",
            Some(token.as_str()),
            Some(json!({"new_password": "p2", "new_password_confirmation": "p2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Password Changed Successfully");

        let (status, _) = login(&app, "a@x.com", "p1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = login(&app, "a@x.com", "p2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }
}
