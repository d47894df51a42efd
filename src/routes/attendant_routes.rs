// src/routes/attendant_routes.rs
//
// Attendant section: patient registration and front-desk scheduling.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{
    error::ApiError,
    middleware::auth_context::{AttendantSection, Authorized},
    models::{ApiOk, AppState, Appointment, Practitioner, Role, UserRecord},
    remote::{AppointmentFilter, RegisterUser},
    routes::{availability_in, section_me, AvailabilityQuery, CancelData},
    scheduler::{AppointmentDraft, Scheduler},
    validation::{check_email, FieldErrors},
};

type Attendant = Authorized<AttendantSection>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(section_me::<AttendantSection>))
        .route("/customers", get(list_customers).post(register_customer))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            put(update_appointment).delete(cancel_appointment),
        )
        .route("/practitioners/available", get(available_practitioners))
}

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl CustomerRequest {
    fn validate(&self) -> Result<RegisterUser, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", Some(&self.name), "Enter a name");
        check_email(&mut errors, &self.email);
        errors.require("password", Some(&self.password), "Enter a password");
        errors.into_result()?;

        Ok(RegisterUser {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/* ============================================================
   Customers
   ============================================================ */

/// GET /attendant/customers
pub async fn list_customers(
    State(state): State<AppState>,
    auth: Attendant,
) -> Result<Json<ApiOk<Vec<UserRecord>>>, ApiError> {
    let users = state.api.list_users(&auth.credential).await?;
    let patients = users
        .into_iter()
        .filter(|u| u.role() == Some(Role::Patient))
        .collect();
    Ok(Json(ApiOk { data: patients }))
}

/// POST /attendant/customers
pub async fn register_customer(
    State(state): State<AppState>,
    auth: Attendant,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<ApiOk<JsonValue>>, ApiError> {
    let user = req.validate()?;
    let created = state.api.create_user(&auth.credential, &user).await?;
    tracing::info!(by = auth.principal.id, email = %user.email, "customer registered");
    Ok(Json(ApiOk { data: created }))
}

/* ============================================================
   Scheduling
   ============================================================ */

/// GET /attendant/appointments
pub async fn list_appointments(
    State(state): State<AppState>,
    auth: Attendant,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    Ok(Json(ApiOk {
        data: scheduler.list(AppointmentFilter::All).await?,
    }))
}

/// POST /attendant/appointments
pub async fn create_appointment(
    State(state): State<AppState>,
    auth: Attendant,
    Json(draft): Json<AppointmentDraft>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let new = draft.validate()?;
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let created = scheduler.create(&new, &auth.principal.email).await?;
    Ok(Json(ApiOk { data: created }))
}

/// PUT /attendant/appointments/{id}
pub async fn update_appointment(
    State(state): State<AppState>,
    auth: Attendant,
    Path(appointment_id): Path<i64>,
    Json(draft): Json<AppointmentDraft>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let replacement = draft.validate()?;
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let original = scheduler
        .find(AppointmentFilter::All, appointment_id)
        .await?
        .ok_or_else(|| ApiError::appointment_not_found(appointment_id))?;

    let updated = scheduler
        .update(&original, &replacement, &auth.principal.email)
        .await?;
    Ok(Json(ApiOk { data: updated }))
}

/// DELETE /attendant/appointments/{id}
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: Attendant,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<CancelData>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let outcome = scheduler
        .cancel_in(AppointmentFilter::All, appointment_id, &auth.principal.email)
        .await?;
    Ok(Json(ApiOk {
        data: CancelData {
            ok: true,
            appointment_id,
            outcome,
        },
    }))
}

/// GET /attendant/practitioners/available?date=&time=&editing=
pub async fn available_practitioners(
    State(state): State<AppState>,
    auth: Attendant,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<Vec<Practitioner>>>, ApiError> {
    let list = availability_in(&state, &auth.credential, AppointmentFilter::All, &q).await?;
    Ok(Json(ApiOk { data: list }))
}
