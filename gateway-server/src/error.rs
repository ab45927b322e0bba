// gateway-server/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common::AuthError;
use serde_json::{json, Value};
use thiserror::Error;

/// Longest slice of toolkit output ever returned to a caller
pub const OUTPUT_TAIL_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("authentication required")]
    Unauthenticated,

    /// Only raised behind authentication; the key list is meant for operators.
    #[error("missing configuration: {}", .0.join(", "))]
    ConfigMissing(Vec<String>),

    #[error("deployment failed")]
    DeployFailed {
        exit_code: Option<i32>,
        result: Option<Value>,
        output_tail: String,
    },

    #[error("could not parse toolkit output")]
    ParseError {
        exit_code: Option<i32>,
        output_tail: String,
    },

    #[error("toolkit timed out after {secs}s")]
    DeployTimeout { secs: u64, output_tail: String },

    #[error("a deployment for record {0} is already running")]
    DeployInProgress(String),

    #[error("failed to start toolkit: {0}")]
    Spawn(String),

    #[error("internal server error")]
    Internal(String),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Auth(AuthError::InvalidAddress) => StatusCode::BAD_REQUEST,
            GatewayError::Auth(AuthError::ConfigMissing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Auth(_) | GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::DeployFailed { .. } | GatewayError::ParseError { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::DeployTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::DeployInProgress(_) => StatusCode::CONFLICT,
            GatewayError::Spawn(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            // Unauthenticated callers never learn which keys are missing.
            GatewayError::Auth(AuthError::ConfigMissing(_)) => json!({
                "error": "server misconfigured"
            }),
            GatewayError::Auth(err) => json!({ "error": err.to_string() }),
            GatewayError::ConfigMissing(missing) => json!({
                "error": "missing configuration",
                "missing": missing,
            }),
            GatewayError::DeployFailed { exit_code, result, output_tail } => json!({
                "success": false,
                "error": "deployment failed",
                "exitCode": exit_code,
                "result": result,
                "output": output_tail,
            }),
            GatewayError::ParseError { exit_code, output_tail } => json!({
                "success": false,
                "error": "could not parse toolkit output",
                "exitCode": exit_code,
                "output": output_tail,
            }),
            GatewayError::DeployTimeout { secs, output_tail } => json!({
                "success": false,
                "error": format!("toolkit timed out after {}s", secs),
                "output": output_tail,
            }),
            GatewayError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                json!({ "error": "internal server error" })
            },
            other => json!({ "error": other.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Keep the last `max_chars` characters of `output`.
pub fn tail_chars(output: &str, max_chars: usize) -> String {
    let count = output.chars().count();
    if count <= max_chars {
        return output.to_string();
    }
    output.chars().skip(count - max_chars).collect()
}
