// gateway-server/src/admin/mod.rs
//! PIN-gated operator console: login, logout and the launch form.
pub mod pages;

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::{header, StatusCode};
use actix_web::{get, post, web, HttpRequest, HttpResponse, ResponseError};
use common::models::deployment::DeployRequest;
use common::models::session::SessionResult;
use serde::Deserialize;
use serde_json::Value;
use crate::admin_sessions::{CheckAdminSession, CreateAdminSession, RevokeAdminSession, ADMIN_SESSION_TTL};
use crate::deployment::run_deployment;
use crate::error::GatewayError;
use crate::state::AppState;
use crate::utils::token::{constant_time_eq, session_epoch};

// Cookie name for admin session tracking
pub const SESSION_COOKIE_NAME: &str = "admin_session";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub pin: String,
}

/// Launch form fields; blank inputs count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchForm {
    pub pick_id: Option<String>,
    pub name_prefix: Option<String>,
    pub fee_bps: Option<String>,
    pub asset: Option<String>,
    pub end_time: Option<String>,
    pub cutoff_time: Option<String>,
}

impl From<LaunchForm> for DeployRequest {
    fn from(form: LaunchForm) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }
        let value = |v: Option<String>| present(v).map(Value::String);

        DeployRequest {
            name_prefix: present(form.name_prefix),
            asset: present(form.asset),
            fee_bps: value(form.fee_bps),
            end_time: value(form.end_time),
            cutoff_time: value(form.cutoff_time),
            pick_id: value(form.pick_id),
            datastore: None,
        }
    }
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(body)
}

fn redirect(location: String) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn configured_pin(state: &AppState) -> Option<&str> {
    state.config.auth.admin_pin.as_deref().filter(|pin| !pin.is_empty())
}

/// True iff a PIN is configured and the cookie names a live session opened
/// under that PIN.
pub async fn is_authenticated(req: &HttpRequest, state: &AppState) -> Result<bool, GatewayError> {
    let Some(pin) = configured_pin(state) else {
        return Ok(false);
    };
    let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) else {
        return Ok(false);
    };

    let result = state
        .admin_sessions
        .send(CheckAdminSession {
            session_token: cookie.value().to_string(),
            secret_epoch: session_epoch(pin),
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("session registry unavailable: {}", e)))?;

    match result {
        SessionResult::Valid => Ok(true),
        other => {
            tracing::debug!("Admin session rejected: {:?}", other);
            Ok(false)
        },
    }
}

#[get("/login")]
pub async fn login_page(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let base = state.config.admin_base_path();
    if configured_pin(&state).is_none() {
        return Ok(html(StatusCode::INTERNAL_SERVER_ERROR, pages::not_configured()));
    }
    if is_authenticated(&req, &state).await? {
        return Ok(redirect(format!("{}/launch", base)));
    }
    Ok(html(StatusCode::OK, pages::login(&base, None)))
}

#[post("/login")]
pub async fn login(form: web::Form<LoginForm>, state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let base = state.config.admin_base_path();
    let Some(pin) = configured_pin(&state) else {
        tracing::error!("Admin login attempted but ADMIN_PIN is not set");
        return Ok(html(StatusCode::INTERNAL_SERVER_ERROR, pages::not_configured()));
    };

    if !constant_time_eq(pin, &form.pin) {
        tracing::warn!("Admin login failed");
        return Ok(html(StatusCode::UNAUTHORIZED, pages::login(&base, Some("Wrong PIN"))));
    }

    let session_token = state
        .admin_sessions
        .send(CreateAdminSession {
            secret_epoch: session_epoch(pin),
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("session registry unavailable: {}", e)))?;

    let cookie = Cookie::build(SESSION_COOKIE_NAME, session_token)
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(ADMIN_SESSION_TTL))
        .finish();

    tracing::info!("Admin logged in");
    Ok(HttpResponse::SeeOther()
        .cookie(cookie)
        .insert_header((header::LOCATION, format!("{}/launch", base)))
        .finish())
}

#[post("/logout")]
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        let revoked = state
            .admin_sessions
            .send(RevokeAdminSession {
                session_token: cookie.value().to_string(),
            })
            .await
            .map_err(|e| GatewayError::Internal(format!("session registry unavailable: {}", e)))?;
        if revoked {
            tracing::info!("Admin logged out");
        }
    }

    let expired = Cookie::build(SESSION_COOKIE_NAME, "")
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(0))
        .finish();

    Ok(HttpResponse::SeeOther()
        .cookie(expired)
        .insert_header((header::LOCATION, format!("{}/login", state.config.admin_base_path())))
        .finish())
}

#[get("/launch")]
pub async fn launch_page(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let base = state.config.admin_base_path();
    if !is_authenticated(&req, &state).await? {
        return Ok(redirect(format!("{}/login", base)));
    }
    Ok(html(
        StatusCode::OK,
        pages::launch_form(&base, state.orchestrator.config().default_fee_bps),
    ))
}

#[post("/launch")]
pub async fn launch(
    req: HttpRequest,
    form: web::Form<LaunchForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let base = state.config.admin_base_path();
    if !is_authenticated(&req, &state).await? {
        return Ok(redirect(format!("{}/login", base)));
    }

    tracing::info!("Deployment requested from admin console");
    match run_deployment(&state, form.into_inner().into()).await {
        Ok(response) => Ok(html(StatusCode::OK, pages::launch_result(&base, &response))),
        Err(err) => {
            let detail = match &err {
                GatewayError::DeployFailed { output_tail, .. }
                | GatewayError::ParseError { output_tail, .. }
                | GatewayError::DeployTimeout { output_tail, .. } => Some(output_tail.clone()),
                GatewayError::ConfigMissing(missing) => Some(missing.join("\n")),
                _ => None,
            };
            Ok(html(
                err.status_code(),
                pages::launch_error(&base, &err.to_string(), detail.as_deref()),
            ))
        },
    }
}

/// Mount the console under `base` (e.g. `/mein/konsole`).
pub fn configure(cfg: &mut web::ServiceConfig, base: &str) {
    cfg.service(
        web::scope(base)
            .service(login_page)
            .service(login)
            .service(logout)
            .service(launch_page)
            .service(launch),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_form_fields_are_absent() {
        let form = LaunchForm {
            pick_id: Some(" 42 ".into()),
            fee_bps: Some("".into()),
            name_prefix: Some("   ".into()),
            ..Default::default()
        };
        let request: DeployRequest = form.into();
        assert_eq!(request.pick_id, Some(Value::String("42".into())));
        assert_eq!(request.fee_bps, None);
        assert_eq!(request.name_prefix, None);
    }
}
