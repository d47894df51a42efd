use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::{Authorized, Section},
    models::{hhmm, ApiOk, AppState, Credential, Practitioner, Principal},
    remote::AppointmentFilter,
    scheduler::{parse_date, CancelOutcome, Scheduler},
    validation::{is_blank, FieldErrors},
};

pub mod access_routes;
pub mod attendant_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod manager_routes;
pub mod patient_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/access", access_routes::router())
        .nest("/main", patient_routes::router())
        .nest("/attendant", attendant_routes::router())
        .nest("/doctor", doctor_routes::router())
        .nest("/manager", manager_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}

/* ============================================================
   Shared by the section routers
   ============================================================ */

/// GET /<section>/me
pub async fn section_me<S: Section>(auth: Authorized<S>) -> Json<ApiOk<Principal>> {
    Json(ApiOk {
        data: auth.principal.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct CancelData {
    pub ok: bool,
    pub appointment_id: i64,
    pub outcome: CancelOutcome,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub time: Option<String>,
    /// Appointment being edited, if any.
    pub editing: Option<i64>,
}

impl AvailabilityQuery {
    /// Blank means "not chosen yet"; garbage is a field error.
    pub fn parse(&self) -> Result<(Option<NaiveDate>, Option<NaiveTime>), ApiError> {
        let mut errors = FieldErrors::new();

        let date = match self.date.as_deref() {
            d if is_blank(d) => None,
            Some(raw) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    errors.add("date", "Date must be YYYY-MM-DD");
                }
                parsed
            }
            None => None,
        };
        let time = match self.time.as_deref() {
            t if is_blank(t) => None,
            Some(raw) => {
                let parsed = hhmm::parse(raw);
                if parsed.is_none() {
                    errors.add("time", "Time must be HH:MM");
                }
                parsed
            }
            None => None,
        };

        errors.into_result()?;
        Ok((date, time))
    }
}

/// Availability for a section; `editing` must be visible in `scope`.
pub async fn availability_in(
    state: &AppState,
    credential: &Credential,
    scope: AppointmentFilter,
    q: &AvailabilityQuery,
) -> Result<Vec<Practitioner>, ApiError> {
    let (date, time) = q.parse()?;
    let scheduler = Scheduler::new(&*state.api, credential);

    let editing = match q.editing {
        Some(id) => Some(
            scheduler
                .find(scope, id)
                .await?
                .ok_or_else(|| ApiError::appointment_not_found(id))?,
        ),
        None => None,
    };

    scheduler
        .available_practitioners(date, time, editing.as_ref())
        .await
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    pub async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, Option<String>, JsonValue) {
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

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, location, json)
    }
}
