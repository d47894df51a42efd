use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState};

#[derive(serde::Serialize)]
pub struct HomeData {
    pub view: String,
    pub redirect: String,
}

#[derive(serde::Serialize)]
pub struct HealthData {
    pub ok: bool,
    pub sessions: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
}

/// Sends a signed-in principal to their role's section.
/// Without a session the guard already answers with the login redirect.
pub async fn home(auth: AuthContext) -> impl IntoResponse {
    let target = auth.principal.role.home_path();
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, target)],
        Json(ApiOk {
            data: HomeData {
                view: auth.principal.role.to_string(),
                redirect: target.to_string(),
            },
        }),
    )
}

pub async fn health(State(state): State<AppState>) -> Json<ApiOk<HealthData>> {
    Json(ApiOk {
        data: HealthData {
            ok: true,
            sessions: state.sessions.len().await,
        },
    })
}
