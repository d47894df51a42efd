// src/routes/access_routes.rs

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    auth::token_fingerprint,
    error::ApiError,
    models::{ApiOk, AppState, OkData, Principal, SessionInfo},
    remote::{RegisterUser, RemoteError},
    validation::{check_email, FieldErrors},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    /// Present as `Authorization: Bearer <session_token>` from now on.
    pub session_token: String,
    pub session: SessionInfo,
    pub user: Principal,
    pub home: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

impl SignupRequest {
    fn validate(&self) -> Result<RegisterUser, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", Some(&self.name), "Enter a name");
        check_email(&mut errors, &self.email);
        errors.require("password", Some(&self.password), "Enter a password");
        if !self.password.is_empty() && self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        if !self.terms_accepted {
            errors.add("terms_accepted", "Accept the terms to sign up");
        }
        errors.into_result()?;

        Ok(RegisterUser {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// POST /access/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &req.email);
    errors.require("password", Some(&req.password), "Enter a password");
    errors.into_result()?;

    let credential = state
        .api
        .login(req.email.trim(), &req.password)
        .await
        .map_err(|e| match e {
            // The API's own wording is not shown on a failed login.
            RemoteError::Rejected { status, .. } if status < 500 => {
                RemoteError::rejected(status, "Invalid credentials")
            }
            other => other,
        })?;

    let user = state.api.current_user(&credential).await?;
    let (session_token, session) = state.sessions.open(credential).await;

    tracing::info!(
        user_id = user.id,
        role = %user.role,
        token = %token_fingerprint(&session_token),
        "login"
    );

    Ok(Json(ApiOk {
        data: LoginData {
            session_token,
            session: session.info(),
            home: user.role.home_path(),
            user,
        },
    }))
}

/// POST /access/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<ApiOk<JsonValue>>, ApiError> {
    let user = req.validate()?;
    let created = state.api.register(&user).await?;
    tracing::info!(email = %user.email, "patient signed up");
    Ok(Json(ApiOk { data: created }))
}

/// POST /access/logout. Always succeeds; a missing or stale token has nothing to close.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<ApiOk<OkData>> {
    if let Some(authz) = headers.typed_get::<Authorization<Bearer>>() {
        state.sessions.close(authz.token()).await;
    }
    Json(ApiOk {
        data: OkData { ok: true },
    })
}
