// src/routes/manager_routes.rs
//
// Manager section: doctor registration and the admin activity log.

use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::{Authorized, ManagerSection},
    models::{AdminLogEntry, ApiOk, AppState, DoctorRecord, Role, UserRecord},
    remote::RegisterDoctor,
    routes::section_me,
    validation::{check_email, check_phone, FieldErrors},
};

type Manager = Authorized<ManagerSection>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(section_me::<ManagerSection>))
        .route("/employees", get(list_employees).post(register_employee))
        .route("/logs", get(list_logs))
}

#[derive(Debug, Deserialize)]
pub struct EmployeeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub crm: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub phone: String,
}

impl EmployeeRequest {
    fn validate(&self) -> Result<RegisterDoctor, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("name", Some(&self.name), "Enter a name");
        check_email(&mut errors, &self.email);
        errors.require("password", Some(&self.password), "Enter a password");
        errors.require("crm", Some(&self.crm), "Enter the CRM");
        errors.require("specialty", Some(&self.specialty), "Enter the specialty");
        // phone is optional for staff
        if !self.phone.trim().is_empty() {
            check_phone(&mut errors, "phone", Some(&self.phone));
        }
        errors.into_result()?;

        Ok(RegisterDoctor {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            crm: self.crm.trim().to_string(),
            specialty: self.specialty.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// GET /manager/employees
pub async fn list_employees(
    State(state): State<AppState>,
    auth: Manager,
) -> Result<Json<ApiOk<Vec<UserRecord>>>, ApiError> {
    let users = state.api.list_users(&auth.credential).await?;
    let doctors = users
        .into_iter()
        .filter(|u| u.role() == Some(Role::Doctor))
        .collect();
    Ok(Json(ApiOk { data: doctors }))
}

/// POST /manager/employees
pub async fn register_employee(
    State(state): State<AppState>,
    auth: Manager,
    Json(req): Json<EmployeeRequest>,
) -> Result<Json<ApiOk<DoctorRecord>>, ApiError> {
    let doctor = req.validate()?;
    let created = state.api.register_doctor(&auth.credential, &doctor).await?;
    tracing::info!(by = auth.principal.id, crm = %created.crm, "doctor registered");
    Ok(Json(ApiOk { data: created }))
}

/// GET /manager/logs
pub async fn list_logs(
    State(state): State<AppState>,
    auth: Manager,
) -> Result<Json<ApiOk<Vec<AdminLogEntry>>>, ApiError> {
    let logs = state.api.admin_logs(&auth.credential).await?;
    Ok(Json(ApiOk { data: logs }))
}
