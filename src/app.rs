use crate::ports::TimeProvider;
use crate::state::AppState;
use crate::types::api::HealthResponse;
use crate::types::rfc3339;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::routing::post;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use std::time::Duration;

mod places;
mod sos;
mod users;

pub fn app<T: TimeProvider>(state: AppState<T>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/health", get(health::<T>))
        .route("/api/users", post(users::user_upsert::<T>))
        .route(
            "/api/users/{phone}/alerts",
            get(users::alert_status::<T>).put(users::alert_update::<T>),
        )
        .route("/api/sos", post(sos::sos_create::<T>))
        .route("/api/places/nearby", get(places::places_nearby::<T>))
        .with_state(state)
        .layer(cors)
}

/// A literal `*` opens the API to any origin, in which case credentials are
/// not allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

pub(crate) async fn health<T: TimeProvider>(
    State(state): State<AppState<T>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: rfc3339(state.time.now()),
        environment: state.config.environment.to_string(),
        storage: state.store.backend().to_string(),
    })
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::client::poller::tests::TestTime;
    use crate::config::AppConfig;
    use crate::ports::RecordStore;
    use crate::store::{MemoryStore, SheetsError, StoreError};
    use crate::types::records::{
        AlertLevel, SosEvent, UpsertOutcome, UserRecord, UserUpsert, UNKNOWN_ACCURACY,
    };
    use axum::body::Body;
    use axum::body::to_bytes;
    use axum::http::Request;
    use axum::http::StatusCode;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use futures::FutureExt;
    use futures::future::{BoxFuture, ready};
    use serde_json::Value as JsonValue;
    use serde_json::from_slice as json_from_slice;
    use serde_json::json;
    use tower::ServiceExt;

    use std::sync::Arc;

    fn memory_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::new(AppConfig::default(), store.clone());
        (app(state), store)
    }

    /// The test clock reads the Unix epoch.
    fn epoch_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::with_time(AppConfig::default(), store.clone(), TestTime::new());
        (app(state), store)
    }

    const EPOCH: &str = "1970-01-01T00:00:00Z";

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let payload = if body.is_empty() {
            JsonValue::Null
        } else {
            json_from_slice(&body).expect("parse json")
        };
        (status, payload)
    }

    fn user_body(phone: &str, city: &str) -> JsonValue {
        json!({
            "phone": phone,
            "email": "asha@example.com",
            "city": city,
            "locality": "Verka",
            "fullAddress": "12 Mall Road",
        })
    }

    #[tokio::test]
    async fn health__should_report_environment_and_backend() {
        // Given
        let (app, _) = memory_app();

        // When
        let (status, payload) = send(&app, Method::GET, "/health", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "OK");
        assert_eq!(payload["environment"], "development");
        assert_eq!(payload["storage"], "memory");
        assert!(payload["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn user_upsert__should_start_new_users_on_green() {
        // Given
        let (app, _) = memory_app();

        // When
        let (status, created) =
            send(&app, Method::POST, "/api/users", Some(user_body("111", "Amritsar"))).await;
        let (_, alert) = send(&app, Method::GET, "/api/users/111/alerts", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["message"], "User created");
        assert_eq!(created["created"], true);
        assert_eq!(alert["phone"], "111");
        assert_eq!(alert["alertStatus"], "green");
    }

    #[tokio::test]
    async fn user_upsert__should_update_in_place_and_keep_alert() {
        // Given
        let (app, store) = memory_app();
        send(&app, Method::POST, "/api/users", Some(user_body("222", "Amritsar"))).await;
        send(
            &app,
            Method::PUT,
            "/api/users/222/alerts",
            Some(json!({ "alertStatus": "red" })),
        )
        .await;

        // When
        let (status, updated) =
            send(&app, Method::POST, "/api/users", Some(user_body("222", "Jalandhar"))).await;
        let (_, alert) = send(&app, Method::GET, "/api/users/222/alerts", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["message"], "User updated");
        assert_eq!(updated["updated"], true);
        assert!(updated.get("created").is_none());
        assert_eq!(alert["alertStatus"], "red");
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn user_upsert__should_reject_missing_fields() {
        // Given
        let (app, store) = memory_app();
        let mut body = user_body("333", "Amritsar");
        body["email"] = json!("");

        // When
        let (status, payload) = send(&app, Method::POST, "/api/users", Some(body)).await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "Missing required fields");
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn user_upsert__should_reject_malformed_json() {
        // Given
        let (app, _) = memory_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/users")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        // When
        let response = app.oneshot(request).await.expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn alert_status__should_return_not_found_for_unknown_phone() {
        // Given
        let (app, _) = memory_app();

        // When
        let (status, payload) = send(&app, Method::GET, "/api/users/404/alerts", None).await;

        // Then
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "User not found");
    }

    #[tokio::test]
    async fn alert_update__should_reject_unknown_levels_without_writing() {
        // Given
        let (app, _) = memory_app();
        send(&app, Method::POST, "/api/users", Some(user_body("444", "Amritsar"))).await;

        // When
        let (status, payload) = send(
            &app,
            Method::PUT,
            "/api/users/444/alerts",
            Some(json!({ "alertStatus": "blue" })),
        )
        .await;
        let (_, alert) = send(&app, Method::GET, "/api/users/444/alerts", None).await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "Alert status must be 'green' or 'red'");
        assert_eq!(alert["alertStatus"], "green");
    }

    #[tokio::test]
    async fn alert_update__should_validate_before_lookup() {
        // Given
        let (app, _) = memory_app();

        // When
        let (invalid, _) = send(
            &app,
            Method::PUT,
            "/api/users/missing/alerts",
            Some(json!({ "alertStatus": "amber" })),
        )
        .await;
        let (missing, payload) = send(
            &app,
            Method::PUT,
            "/api/users/missing/alerts",
            Some(json!({ "alertStatus": "red" })),
        )
        .await;

        // Then
        assert_eq!(invalid, StatusCode::BAD_REQUEST);
        assert_eq!(missing, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "User not found");
    }

    #[tokio::test]
    async fn alert_update__should_echo_new_level() {
        // Given
        let (app, _) = memory_app();
        send(&app, Method::POST, "/api/users", Some(user_body("555", "Amritsar"))).await;

        // When
        let (status, payload) = send(
            &app,
            Method::PUT,
            "/api/users/555/alerts",
            Some(json!({ "alertStatus": "red" })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["message"], "Alert status updated");
        assert_eq!(payload["phone"], "555");
        assert_eq!(payload["alertStatus"], "red");
    }

    #[tokio::test]
    async fn sos_create__should_echo_formatted_coordinates() {
        // Given
        let (app, store) = memory_app();
        let body = json!({ "phone": "911", "coordinates": [1.5, -2.5] });

        // When
        let (status, payload) = send(&app, Method::POST, "/api/sos", Some(body)).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["message"], "SOS Alert saved successfully");
        assert_eq!(payload["phone"], "911");
        assert_eq!(payload["coordinates"], "1.5, -2.5");
        let events = store.sos_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].accuracy, UNKNOWN_ACCURACY);
        assert_eq!(events[0].status, "Active");
        assert_eq!(payload["timestamp"], events[0].timestamp.as_str());
    }

    #[tokio::test]
    async fn sos_create__should_reply_with_server_time_and_store_client_time() {
        // Given
        let (app, store) = epoch_app();
        let body = json!({
            "phone": "911",
            "coordinates": [1.5, -2.5],
            "timestamp": "2025-01-12T09:30:00Z",
        });

        // When
        let (status, payload) = send(&app, Method::POST, "/api/sos", Some(body)).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["timestamp"], EPOCH);
        assert_eq!(store.sos_events()[0].timestamp, "2025-01-12T09:30:00Z");
    }

    #[tokio::test]
    async fn handlers__should_stamp_defaults_with_provided_time() {
        // Given
        let (app, store) = epoch_app();

        // When
        let (_, health) = send(&app, Method::GET, "/health", None).await;
        send(&app, Method::POST, "/api/users", Some(user_body("333", "Amritsar"))).await;
        let (_, read) = send(&app, Method::GET, "/api/users/333/alerts", None).await;
        let (_, updated) = send(
            &app,
            Method::PUT,
            "/api/users/333/alerts",
            Some(json!({ "alertStatus": "red" })),
        )
        .await;
        send(&app, Method::POST, "/api/sos", Some(json!({ "phone": "333", "coordinates": [0, 0] })))
            .await;

        // Then
        assert_eq!(health["timestamp"], EPOCH);
        assert_eq!(read["timestamp"], EPOCH);
        assert_eq!(updated["timestamp"], EPOCH);
        let user = store.find_user("333").await.expect("find").expect("user");
        assert_eq!(user.timestamp, EPOCH);
        assert_eq!(store.sos_events()[0].timestamp, EPOCH);
    }

    #[tokio::test]
    async fn sos_create__should_reject_bad_coordinates() {
        // Given
        let (app, store) = memory_app();
        let cases = [
            (json!({ "phone": "911", "coordinates": [1.5] }), "Missing required fields"),
            (json!({ "phone": "911" }), "Missing required fields"),
            (json!({ "coordinates": [1.0, 2.0] }), "Missing required fields"),
            (
                json!({ "phone": "911", "coordinates": ["1.5", "2.5"] }),
                "Coordinates must be valid numbers",
            ),
        ];

        for (body, expected) in cases {
            // When
            let (status, payload) = send(&app, Method::POST, "/api/sos", Some(body)).await;

            // Then
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let message = payload["error"].as_str().expect("error message");
            assert!(message.starts_with(expected), "{message}");
        }
        assert!(store.sos_events().is_empty());
    }

    #[tokio::test]
    async fn places_nearby__should_require_coordinates_and_type() {
        // Given
        let (app, _) = memory_app();

        // When
        let (status, payload) =
            send(&app, Method::GET, "/api/places/nearby?lat=31.6&lng=74.8", None).await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            payload["error"],
            "Missing required parameters: lat, lng, and type are required"
        );
    }

    #[tokio::test]
    async fn places_nearby__should_fail_without_api_key() {
        // Given
        let (app, _) = memory_app();

        // When
        let (status, payload) = send(
            &app,
            Method::GET,
            "/api/places/nearby?lat=31.6&lng=74.8&type=hospital",
            None,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload["error"], "Failed to fetch places");
    }

    #[derive(Default)]
    pub(crate) struct BrokenStore;

    fn broken<T: Send + 'static>() -> BoxFuture<'static, Result<T, StoreError>> {
        ready(Err(StoreError::Sheets(SheetsError::MissingCredentials))).boxed()
    }

    impl RecordStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }

        fn upsert_user(&self, _user: UserUpsert) -> BoxFuture<'_, Result<UpsertOutcome, StoreError>> {
            broken()
        }

        fn find_user<'a>(
            &'a self,
            _phone: &'a str,
        ) -> BoxFuture<'a, Result<Option<UserRecord>, StoreError>> {
            broken()
        }

        fn set_alert_status<'a>(
            &'a self,
            _phone: &'a str,
            _level: AlertLevel,
        ) -> BoxFuture<'a, Result<bool, StoreError>> {
            broken()
        }

        fn append_sos(&self, _event: SosEvent) -> BoxFuture<'_, Result<(), StoreError>> {
            broken()
        }
    }

    #[tokio::test]
    async fn handlers__should_hide_storage_failures_behind_generic_messages() {
        // Given
        let app = app(AppState::new(AppConfig::default(), Arc::new(BrokenStore)));

        // When
        let (user_status, user) =
            send(&app, Method::POST, "/api/users", Some(user_body("1", "Amritsar"))).await;
        let (alert_status, alert) = send(&app, Method::GET, "/api/users/1/alerts", None).await;
        let (sos_status, sos) = send(
            &app,
            Method::POST,
            "/api/sos",
            Some(json!({ "phone": "1", "coordinates": [0, 0] })),
        )
        .await;

        // Then
        assert_eq!(user_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(user["error"], "Failed to save user data");
        assert_eq!(alert_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(alert["error"], "Failed to fetch alert status");
        assert_eq!(sos_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sos["error"], "Failed to save SOS alert");
    }

    #[tokio::test]
    async fn cors_layer__should_only_echo_allowed_origins() {
        // Given
        let (app, _) = memory_app();
        let request = |origin: &'static str| {
            Request::builder()
                .uri("/health")
                .header(ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        // When
        let allowed = app
            .clone()
            .oneshot(request("http://localhost:5173"))
            .await
            .expect("request failed");
        let denied = app
            .oneshot(request("https://evil.example"))
            .await
            .expect("request failed");

        // Then
        assert_eq!(
            allowed.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).expect("allow origin"),
            "http://localhost:5173"
        );
        assert!(denied.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
