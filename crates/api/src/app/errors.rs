use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use dronedispatch_infra::{DispatchError, ErrorClass};

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    let status = match err.class() {
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Infrastructure => {
            tracing::error!(error = %err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorClass::ClientInput => match &err {
            DispatchError::AlreadyAssigned(_)
            | DispatchError::AlreadyFinished(_)
            | DispatchError::Conflict(_) => StatusCode::CONFLICT,
            DispatchError::NoUnitsAvailable
            | DispatchError::NoUnitAssigned(_)
            | DispatchError::UnitNotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        },
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body identifier, answering 400 `invalid_id` on garbage.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.trim().parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id '{raw}'"),
        )
    })
}

/// Unwrap an extracted JSON body, answering 400 `invalid_body` in the usual envelope.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value).map_err(|rejection| {
        json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
    })
}

/// Decode a body that may be left empty. An empty body yields `T::default()`;
/// anything else must be valid JSON for `T`.
pub fn optional_json_body<T: DeserializeOwned + Default>(
    raw: &[u8],
) -> Result<T, axum::response::Response> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(raw).map_err(|e| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_body",
            format!("invalid request body: {e}"),
        )
    })
}
