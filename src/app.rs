use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::{method_not_allowed_as_not_found, route_not_found};
use crate::state::AppState;
use crate::{places, users};

pub fn build_app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    let mut router = Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(places::router(max_upload_bytes))
                .merge(users::router()),
        )
        .route("/health", get(|| async { "ok" }));

    if let Some(dir) = static_dir {
        router = router.nest_service("/uploads/images", ServeDir::new(dir));
    }

    router
        .fallback(route_not_found)
        .with_state(state)
        .layer(middleware::map_response(method_not_allowed_as_not_found))
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
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "5000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::JwtKeys;
    use crate::state::test_support::FakeApp;

    const BOUNDARY: &str = "places-test-boundary";

    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((content_type, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"img\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn token_for(app: &FakeApp, user_id: Uuid) -> String {
        JwtKeys::from(&app.state.config.jwt)
            .sign_access(user_id)
            .unwrap()
    }

    async fn send(app: &FakeApp, req: Request<Body>) -> (StatusCode, Value) {
        let res: Response = build_app(app.state.clone(), None).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_empire_state(app: &FakeApp, token: &str) -> (StatusCode, Value) {
        let body = multipart_body(
            &[
                ("title", "Empire State"),
                ("description", "Tall building"),
                ("address", "20 W 34th St, NYC"),
            ],
            Some(("image/png", b"\x89PNG")),
        );
        let req = Request::post("/api/places")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        send(app, req).await
    }

    #[tokio::test]
    async fn create_then_read_back() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let token = token_for(&app, owner);

        let (status, body) = create_empire_state(&app, &token).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Successfully added!");
        assert_eq!(body["place"]["creator"], json!(owner));
        let place_id = body["place"]["id"].as_str().unwrap().to_string();
        let image = body["place"]["image"].as_str().unwrap().to_string();
        assert!(app.storage.contains(&image));
        assert_eq!(
            body["place"]["imageUrl"],
            json!(format!("https://fake.local/{image}"))
        );

        let (status, body) = send(
            &app,
            Request::get(format!("/api/places/{place_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State");

        let (status, body) = send(
            &app,
            Request::get(format!("/api/places/user/{owner}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["places"][0]["id"], json!(place_id));
    }

    #[tokio::test]
    async fn create_requires_token() {
        let app = AppState::fake();
        let req = Request::post("/api/places").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn failed_create_discards_upload() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let token = token_for(&app, owner);

        let body = multipart_body(
            &[("title", "Empire State"), ("description", ""), ("address", "NYC")],
            Some(("image/jpeg", b"jpeg")),
        );
        let req = Request::post("/api/places")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid inputs passed, please check your data.");
        assert_eq!(app.storage.len(), 0);
        assert_eq!(app.store.place_count(), 0);
    }

    #[tokio::test]
    async fn stranger_cannot_delete_or_patch() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let stranger = app.store.insert_user("Eve", "eve@example.com").id;
        let (_, body) = create_empire_state(&app, &token_for(&app, owner)).await;
        let place_id = body["place"]["id"].as_str().unwrap().to_string();
        let stranger_token = token_for(&app, stranger);

        let (status, _) = send(
            &app,
            Request::delete(format!("/api/places/{place_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {stranger_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Request::patch(format!("/api/places/{place_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {stranger_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"x","description":"y"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Request::get(format!("/api/places/{place_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State");
    }

    #[tokio::test]
    async fn owner_patches_then_deletes() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let token = token_for(&app, owner);
        let (_, body) = create_empire_state(&app, &token).await;
        let place_id = body["place"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Request::patch(format!("/api/places/{place_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"ESB","description":"Very tall"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "ESB");

        let (status, body) = send(
            &app,
            Request::delete(format!("/api/places/{place_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Deleted place." }));
        assert_eq!(app.storage.len(), 0);

        let (status, _) = send(
            &app,
            Request::get(format!("/api/places/user/{owner}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_place_id_is_not_found() {
        let app = AppState::fake();
        let (status, body) = send(
            &app,
            Request::get("/api/places/not-a-uuid").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Could not find a place for the provided id.");
    }

    #[tokio::test]
    async fn unknown_route_is_404_json() {
        let app = AppState::fake();
        let (status, body) = send(
            &app,
            Request::get("/api/nothing-here").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Could not find this route." }));
    }

    #[tokio::test]
    async fn unsupported_method_is_404_json() {
        let app = AppState::fake();
        for req in [
            Request::put(format!("/api/places/{}", Uuid::new_v4())),
            Request::get("/api/places"),
            Request::delete("/api/users/login"),
        ] {
            let (status, body) = send(&app, req.body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({ "message": "Could not find this route." }));
        }
    }

    #[tokio::test]
    async fn update_validates_before_resolving_id() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let (status, body) = send(
            &app,
            Request::patch("/api/places/not-a-uuid")
                .header(header::AUTHORIZATION, format!("Bearer {}", token_for(&app, owner)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"","description":""}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid inputs passed, please check your data.");
    }

    #[tokio::test]
    async fn create_without_image_stores_nothing() {
        let app = AppState::fake();
        let owner = app.store.insert_user("Max", "max@example.com").id;
        let token = token_for(&app, owner);

        let body = multipart_body(
            &[
                ("title", "Empire State"),
                ("description", "Tall building"),
                ("address", "20 W 34th St, NYC"),
            ],
            None,
        );
        let req = Request::post("/api/places")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "No image provided.");
        assert_eq!(app.storage.len(), 0);
        assert_eq!(app.store.place_count(), 0);
        assert!(app.store.user(owner).unwrap().places.is_empty());
    }

    #[tokio::test]
    async fn signup_and_login_over_http() {
        let app = AppState::fake();
        let (status, body) = send(
            &app,
            Request::post("/api/users/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"name":"Max","email":"max@example.com","password":"secret123"}"#,
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].is_string());

        let (status, body) = send(
            &app,
            Request::post("/api/users/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"max@example.com","password":"nope"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials, could not log you in.");

        let (status, body) = send(
            &app,
            Request::get("/api/users").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"][0]["email"], "max@example.com");
        assert!(body["users"][0].get("password_hash").is_none());
    }
}
