//! Gateway command handlers.
//!
//! Every command is a POST with a url-encoded form body. Missing or empty
//! parameters answer 400, tokens without a live session answer 404.

use axum::Form;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, warn};

use crate::error::SessionError;
use crate::registry::SessionRegistry;
use crate::telemetry::spans;

const NDJSON: &str = "application/x-ndjson";

/// Command failures as HTTP answers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest,
    NotFound,
    Internal,
    Session(SessionError),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownToken => ApiError::NotFound,
            other => ApiError::Session(other),
        }
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidEndpoint(_) | SessionError::InvalidAccount(_) => {
            StatusCode::BAD_REQUEST
        }
        SessionError::UnknownToken => StatusCode::NOT_FOUND,
        SessionError::AuthRejected(_)
        | SessionError::Verification(_)
        | SessionError::Negotiation(_)
        | SessionError::HandshakeTimeout(_)
        | SessionError::Transport(_) => StatusCode::UNAUTHORIZED,
        SessionError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(err) => {
                let status = session_status(&err);
                if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
                    warn!(error = %err, "Command failed");
                } else {
                    debug!(error = %err, code = err.error_code(), "Command refused");
                }
                status
            }
        };
        let body = match status {
            StatusCode::BAD_REQUEST => "400 - Bad Request",
            StatusCode::NOT_FOUND => "404 - Not found",
            StatusCode::UNAUTHORIZED => "401 - Authentication Required",
            StatusCode::SERVICE_UNAVAILABLE => "503 - Session Unavailable",
            _ => "500 - Internal Server Error",
        };
        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

/// Required form field; empty counts as missing.
fn required(value: Option<String>) -> Result<String, ApiError> {
    value.filter(|v| !v.is_empty()).ok_or(ApiError::BadRequest)
}

fn text(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// One JSON document per line.
fn ndjson<T: Serialize>(items: &[T]) -> Result<Response, ApiError> {
    let mut body = String::new();
    for item in items {
        let line = serde_json::to_string(item).map_err(|e| {
            warn!(error = %e, "Failed to serialize response line");
            ApiError::Internal
        })?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, NDJSON)], body).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: Option<String>,
    auth: Option<String>,
}

/// POST /login
pub async fn login(
    State(registry): State<SessionRegistry>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let username = required(form.username)?;
    let auth = required(form.auth)?;
    let token = registry
        .login(&username, &auth)
        .instrument(spans::request("login"))
        .await?;
    Ok(text(token))
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    token: Option<String>,
    to: Option<String>,
    body: Option<String>,
}

/// POST /message
pub async fn message(
    State(registry): State<SessionRegistry>,
    Form(form): Form<MessageForm>,
) -> Result<Response, ApiError> {
    let token = required(form.token)?;
    let to = required(form.to)?;
    let body = required(form.body)?;
    registry
        .send_message(&token, &to, &body)
        .instrument(spans::request("message"))
        .await?;
    Ok(text(String::new()))
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    token: Option<String>,
}

/// POST /roster
pub async fn roster(
    State(registry): State<SessionRegistry>,
    Form(form): Form<TokenForm>,
) -> Result<Response, ApiError> {
    let token = required(form.token)?;
    let entries = registry
        .roster(&token)
        .instrument(spans::request("roster"))
        .await?;
    ndjson(&entries)
}

/// POST /messagequeue
pub async fn message_queue(
    State(registry): State<SessionRegistry>,
    Form(form): Form<TokenForm>,
) -> Result<Response, ApiError> {
    let token = required(form.token)?;
    let events = registry
        .drain_queue(&token)
        .instrument(spans::request("messagequeue"))
        .await?;
    ndjson(&events)
}

/// POST /logout
pub async fn logout(
    State(registry): State<SessionRegistry>,
    Form(form): Form<TokenForm>,
) -> Result<Response, ApiError> {
    let token = required(form.token)?;
    if registry.get(&token).is_none() {
        return Err(ApiError::NotFound);
    }
    registry
        .logout(&token)
        .instrument(spans::request("logout"))
        .await?;
    Ok(text(String::new()))
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    token: Option<String>,
    url: Option<String>,
}

/// POST /register
pub async fn register(
    State(registry): State<SessionRegistry>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let token = required(form.token)?;
    let url = required(form.url)?;
    registry
        .register_endpoint(&token, &url)
        .instrument(spans::request("register"))
        .await?;
    Ok(text(String::new()))
}

/// Anything else.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_field_is_missing() {
        assert!(matches!(required(Some(String::new())), Err(ApiError::BadRequest)));
        assert!(matches!(required(None), Err(ApiError::BadRequest)));
        assert_eq!(required(Some("x".into())).unwrap(), "x");
    }

    #[test]
    fn test_status_mapping() {
        let status = |err: SessionError| ApiError::from(err).into_response().status();
        assert_eq!(status(SessionError::UnknownToken), StatusCode::NOT_FOUND);
        assert_eq!(status(SessionError::AuthRejected("<failure/>".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(SessionError::HandshakeTimeout(30)), StatusCode::UNAUTHORIZED);
        assert_eq!(status(SessionError::InvalidEndpoint("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(SessionError::Closed), StatusCode::SERVICE_UNAVAILABLE);
    }
}
