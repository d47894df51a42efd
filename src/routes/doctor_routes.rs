// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::{Authorized, DoctorSection},
    models::{ApiOk, AppState, Appointment, AppointmentStatus},
    remote::AppointmentFilter,
    routes::{section_me, CancelData},
    scheduler::Scheduler,
};

type Doctor = Authorized<DoctorSection>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(section_me::<DoctorSection>))
        .route("/appointments", get(list_appointments))
        .route("/appointments/{appointment_id}/status", patch(set_status))
        .route("/appointments/{appointment_id}", delete(cancel_appointment))
}

/// A doctor only ever sees their own agenda.
fn scope(auth: &Doctor) -> AppointmentFilter {
    AppointmentFilter::Practitioner(auth.principal.id)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusData {
    pub appointment_id: i64,
    pub status: AppointmentStatus,
}

/// GET /doctor/appointments
pub async fn list_appointments(
    State(state): State<AppState>,
    auth: Doctor,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    Ok(Json(ApiOk {
        data: scheduler.list(scope(&auth)).await?,
    }))
}

/// PATCH /doctor/appointments/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    auth: Doctor,
    Path(appointment_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiOk<StatusData>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let current = scheduler
        .find(scope(&auth), appointment_id)
        .await?
        .ok_or_else(|| ApiError::appointment_not_found(appointment_id))?;

    scheduler.set_status(&current, req.status).await?;
    Ok(Json(ApiOk {
        data: StatusData {
            appointment_id,
            status: req.status,
        },
    }))
}

/// DELETE /doctor/appointments/{id}
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: Doctor,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<CancelData>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let outcome = scheduler
        .cancel_in(scope(&auth), appointment_id, &auth.principal.email)
        .await?;
    Ok(Json(ApiOk {
        data: CancelData {
            ok: true,
            appointment_id,
            outcome,
        },
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::models::{AppointmentStatus, Role};
    use crate::routes::{router, test_support::call};
    use crate::testing::{appointment, session_token, state_with, FakeClinicApi};

    #[tokio::test]
    async fn completed_then_cancelled_is_refused() {
        let api = Arc::new(FakeClinicApi::with_practitioners(&[3]));
        api.seed(appointment(10, 1, 3, "2024-06-01", "09:00", ""));
        let state = state_with(api.clone());
        let token = session_token(&state, &api, Role::Doctor, 3).await;
        let app = router(state);

        let (status, _, body) = call(
            &app,
            Method::PATCH,
            "/doctor/appointments/10/status",
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "completed");

        let (status, _, body) = call(
            &app,
            Method::PATCH,
            "/doctor/appointments/10/status",
            Some(&token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "TERMINAL_STATUS");
        assert_eq!(api.appointments()[0].status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn completed_appointment_cannot_be_deleted() {
        let api = Arc::new(FakeClinicApi::with_practitioners(&[3]));
        api.seed(appointment(10, 1, 3, "2024-06-01", "09:00", ""));
        let state = state_with(api.clone());
        let token = session_token(&state, &api, Role::Doctor, 3).await;
        let app = router(state);

        let (status, _, _) = call(
            &app,
            Method::PATCH,
            "/doctor/appointments/10/status",
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) =
            call(&app, Method::DELETE, "/doctor/appointments/10", Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "TERMINAL_STATUS");
        let remaining = api.appointments();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn remote_status_names_are_accepted() {
        let api = Arc::new(FakeClinicApi::with_practitioners(&[3]));
        api.seed(appointment(10, 1, 3, "2024-06-01", "09:00", ""));
        let state = state_with(api.clone());
        let token = session_token(&state, &api, Role::Doctor, 3).await;
        let app = router(state);

        let (status, _, _) = call(
            &app,
            Method::PATCH,
            "/doctor/appointments/10/status",
            Some(&token),
            Some(json!({ "status": "desmarcada" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(api.appointments()[0].status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn other_doctors_appointments_are_out_of_reach() {
        let api = Arc::new(FakeClinicApi::with_practitioners(&[3, 4]));
        api.seed(appointment(10, 1, 4, "2024-06-01", "09:00", ""));
        let state = state_with(api.clone());
        let token = session_token(&state, &api, Role::Doctor, 3).await;
        let app = router(state);

        let (_, _, body) = call(&app, Method::GET, "/doctor/appointments", Some(&token), None).await;
        assert_eq!(body["data"], json!([]));

        let (status, _, _) = call(
            &app,
            Method::PATCH,
            "/doctor/appointments/10/status",
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) =
            call(&app, Method::DELETE, "/doctor/appointments/10", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "already_cancelled");
        assert_eq!(api.appointments().len(), 1);
    }
}
