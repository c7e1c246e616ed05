use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;

use crate::messaging::LineClient;
use crate::services::user;
use crate::signature;
use crate::weather::{ReportStyle, WeatherClient};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

const REGISTER_KEYWORD: &str = "register";

const USAGE_REPLY: &str =
    "To register a city for the daily report, send: register <city> (for example \"register Tokyo\").";
const GREETING_REPLY: &str = "Hello! Send me a city name and I'll reply with the current weather.";
const THANKS_REPLY: &str = "You're welcome! Message me whenever you need a forecast.";

pub struct AppState {
    pub channel_secret: String,
    pub users: user::Service,
    pub line: LineClient,
    pub weather: WeatherClient,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/callback", post(callback)).with_state(state)
}

#[derive(Debug, serde::Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    reply_token: Option<String>,
    source: Option<Source>,
    message: Option<MessageContent>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Source {
    user_id: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// `POST /callback`. Missing or invalid signature → 400 before anything
/// else happens; store failures → 500; a failed reply send is logged and
/// the platform still gets its 200.
#[tracing::instrument(skip_all)]
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            log::warn!("webhook request without a {} header", SIGNATURE_HEADER);
            StatusCode::BAD_REQUEST
        })?;

    if !signature::validate(&state.channel_secret, &body, signature) {
        log::warn!("webhook request with an invalid signature");
        return Err(StatusCode::BAD_REQUEST);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|err| {
        tracing::error!("failed to parse webhook body: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    for event in &payload.events {
        let Some((reply_token, user_id, text)) = text_message(event) else {
            continue;
        };

        let reply = reply_for(&state, user_id, text).await.map_err(|err| {
            tracing::error!("failed to handle message from {}: {}", user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        if let Err(err) = state.line.reply_text(reply_token, &reply).await {
            log::error!("failed to send reply to {}: {}", user_id, err);
        }
    }

    Ok("OK")
}

// A webhook delivery can bundle non-message events and non-text messages;
// only complete text-message events are handled.
fn text_message(event: &Event) -> Option<(&str, &str, &str)> {
    if event.kind != "message" {
        return None;
    }

    let reply_token = event.reply_token.as_deref()?;
    let user_id = event.source.as_ref()?.user_id.as_deref()?;
    let message = event.message.as_ref()?;
    if message.kind != "text" {
        return None;
    }

    Some((reply_token, user_id, message.text.as_deref()?))
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Register { city: String },
    Usage,
    Canned(&'static str),
    Weather { city: String },
}

// First match wins: register command, canned keyword, then the whole text
// as a city name.
fn classify(text: &str) -> Action {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix(REGISTER_KEYWORD) {
        if rest.is_empty() {
            return Action::Usage;
        }
        if rest.starts_with(char::is_whitespace) {
            let city = rest.trim();
            return if city.is_empty() {
                Action::Usage
            } else {
                Action::Register { city: city.to_owned() }
            };
        }
        // Words that merely start with the keyword fall through.
    }

    if let Some(reply) = canned_reply(trimmed) {
        return Action::Canned(reply);
    }

    Action::Weather { city: trimmed.to_owned() }
}

fn canned_reply(text: &str) -> Option<&'static str> {
    match text {
        "hello" | "hi" => Some(GREETING_REPLY),
        "thanks" | "thank you" => Some(THANKS_REPLY),
        _ => None,
    }
}

async fn reply_for(state: &AppState, user_id: &str, text: &str) -> Result<String, user::Error> {
    match classify(text) {
        Action::Register { city } => {
            let registration = state.users.register_city(user_id, &city).await?;

            Ok(match registration {
                user::Registration::Created(subscription) => format!(
                    "Registered {} as your city. You'll receive a weather report every morning.",
                    subscription.city
                ),
                user::Registration::Updated(subscription) => {
                    format!("Updated your registered city to {}.", subscription.city)
                }
            })
        }
        Action::Usage => Ok(USAGE_REPLY.to_owned()),
        Action::Canned(reply) => Ok(reply.to_owned()),
        Action::Weather { city } => {
            Ok(state.weather.lookup_message(&city, ReportStyle::Current).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use tower::ServiceExt;
    use weatherbot_entities::subscription;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SECRET: &str = "test-secret";

    fn state(db: DatabaseConnection, line: &MockServer, weather: &MockServer) -> Arc<AppState> {
        Arc::new(AppState {
            channel_secret: SECRET.to_owned(),
            users: user::Service::new(db),
            line: LineClient::new("test-token", &line.uri()),
            weather: WeatherClient::new("test-key", &weather.uri()),
        })
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    fn row(id: i32, line_user_id: &str, city: &str) -> subscription::Model {
        subscription::Model {
            id,
            created_at: chrono::DateTime::from_timestamp(0, 0)
                .expect("epoch is valid")
                .naive_utc(),
            line_user_id: line_user_id.to_owned(),
            city: city.to_owned(),
        }
    }

    fn text_event_body(user_id: &str, text: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "events": [{
                "type": "message",
                "replyToken": "reply-token-1",
                "source": { "type": "user", "userId": user_id },
                "message": { "type": "text", "id": "1", "text": text }
            }]
        }))
        .expect("serializable")
    }

    fn signed_request(body: Vec<u8>) -> Request<Body> {
        let signature = signature::sign(SECRET, &body);

        Request::builder()
            .method("POST")
            .uri("/callback")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("valid request")
    }

    async fn expect_reply(line: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(body_partial_json(serde_json::json!({
                "replyToken": "reply-token-1",
                "messages": [{ "type": "text", "text": text }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(line)
            .await;
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected_without_side_effects() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&line)
            .await;

        let app = router(state(empty_db(), &line, &weather));
        let body = text_event_body("user-1", "register Osaka");
        let request = Request::builder()
            .method("POST")
            .uri("/callback")
            .body(Body::from(body))
            .expect("valid request");

        let response = app.oneshot(request).await.expect("infallible");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_without_side_effects() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&line)
            .await;

        let app = router(state(empty_db(), &line, &weather));
        let body = text_event_body("user-1", "register Osaka");
        let request = Request::builder()
            .method("POST")
            .uri("/callback")
            .header(SIGNATURE_HEADER, signature::sign("wrong-secret", &body))
            .body(Body::from(body))
            .expect("valid request");

        let response = app.oneshot(request).await.expect("infallible");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn greeting_keyword_gets_the_canned_reply() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        expect_reply(&line, GREETING_REPLY).await;

        let app = router(state(empty_db(), &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "hello")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn register_with_a_city_creates_a_subscription_and_confirms() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        expect_reply(
            &line,
            "Registered Osaka as your city. You'll receive a weather report every morning.",
        )
        .await;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                Vec::<subscription::Model>::new(),
                vec![row(1, "user-1", "Osaka")],
            ])
            .into_connection();

        let app = router(state(db, &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "register Osaka")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_from_a_known_user_confirms_the_update() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        expect_reply(&line, "Updated your registered city to Osaka.").await;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![row(1, "user-1", "Tokyo")],
                vec![row(1, "user-1", "Osaka")],
            ])
            .into_connection();

        let app = router(state(db, &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "register Osaka")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bare_register_keyword_gets_the_usage_hint() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        expect_reply(&line, USAGE_REPLY).await;

        let app = router(state(empty_db(), &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "register")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn free_text_is_answered_with_a_weather_report() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 200,
                "weather": [{ "description": "light rain" }],
                "main": { "temp": 16.5, "temp_min": 14.5, "temp_max": 18.5, "humidity": 82 }
            })))
            .mount(&weather)
            .await;

        expect_reply(
            &line,
            "Weather in Nagoya\nweather: light rain\ntemperature: 16.5°C\nhumidity: 82%",
        )
        .await;

        let app = router(state(empty_db(), &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "Nagoya")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_reply_send_still_acknowledges_the_webhook() {
        let line = MockServer::start().await;
        let weather = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&line)
            .await;

        let app = router(state(empty_db(), &line, &weather));
        let response = app
            .oneshot(signed_request(text_event_body("user-1", "hello")))
            .await
            .expect("infallible");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn classification_covers_the_dispatch_table() {
        assert_eq!(classify("register Osaka"), Action::Register { city: "Osaka".to_owned() });
        assert_eq!(classify("  register   Nagoya  "), Action::Register { city: "Nagoya".to_owned() });
        assert_eq!(classify("register"), Action::Usage);
        assert_eq!(classify("register   "), Action::Usage);
        assert_eq!(classify("hello"), Action::Canned(GREETING_REPLY));
        assert_eq!(classify("thank you"), Action::Canned(THANKS_REPLY));
        assert_eq!(classify("registering"), Action::Weather { city: "registering".to_owned() });
        assert_eq!(classify("Sapporo"), Action::Weather { city: "Sapporo".to_owned() });
    }
}
