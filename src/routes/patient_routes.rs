// src/routes/patient_routes.rs
//
// Patient section (/main): a patient books, edits and cancels their own
// appointments. The room is assigned later by the clinic.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::{Authorized, PatientSection},
    models::{hhmm, ApiOk, AppState, Appointment, Practitioner, ROOM_PENDING},
    remote::AppointmentFilter,
    routes::{availability_in, section_me, AvailabilityQuery, CancelData},
    scheduler::{parse_date, AppointmentDraft, NewAppointment, Scheduler},
    slots,
    validation::FieldErrors,
};

type Patient = Authorized<PatientSection>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(section_me::<PatientSection>))
        .route("/appointments", get(list_appointments).post(book_appointment))
        .route(
            "/appointments/{appointment_id}",
            put(edit_appointment).delete(cancel_appointment),
        )
        .route("/practitioners/available", get(available_practitioners))
        .route("/slots", get(bookable_slots))
}

fn scope(auth: &Patient) -> AppointmentFilter {
    AppointmentFilter::Patient(auth.principal.id)
}

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub practitioner_id: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub contact_phone: Option<String>,
}

impl BookingRequest {
    /// Patients always book for themselves, into the pending room,
    /// at a time still on the clinic's catalogue.
    fn validate(self, patient_id: i64, now: NaiveDateTime) -> Result<NewAppointment, ApiError> {
        let draft = AppointmentDraft {
            patient_id: Some(patient_id),
            practitioner_id: self.practitioner_id,
            date: self.date,
            time: self.time,
            room: Some(ROOM_PENDING.to_string()),
            contact_phone: self.contact_phone,
        };
        let new = draft.validate()?;

        if !slots::is_bookable(new.slot, now) {
            let mut errors = FieldErrors::new();
            errors.add("time", "This time is not available for booking");
            return Err(errors.into());
        }
        Ok(new)
    }
}

/// GET /main/appointments
pub async fn list_appointments(
    State(state): State<AppState>,
    auth: Patient,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    Ok(Json(ApiOk {
        data: scheduler.list(scope(&auth)).await?,
    }))
}

/// POST /main/appointments
pub async fn book_appointment(
    State(state): State<AppState>,
    auth: Patient,
    Json(req): Json<BookingRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let new = req.validate(auth.principal.id, Local::now().naive_local())?;
    let scheduler = Scheduler::new(&*state.api, &auth.credential);
    let created = scheduler.create(&new, &auth.principal.email).await?;
    Ok(Json(ApiOk { data: created }))
}

/// PUT /main/appointments/{id}
pub async fn edit_appointment(
    State(state): State<AppState>,
    auth: Patient,
    Path(appointment_id): Path<i64>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let replacement = req.validate(auth.principal.id, Local::now().naive_local())?;
    let scheduler = Scheduler::new(&*state.api, &auth.credential);

    let original = scheduler
        .find(scope(&auth), appointment_id)
        .await?
        .ok_or_else(|| ApiError::appointment_not_found(appointment_id))?;

    let updated = scheduler
        .update(&original, &replacement, &auth.principal.email)
        .await?;
    Ok(Json(ApiOk { data: updated }))
}

/// DELETE /main/appointments/{id}
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: Patient,
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

/// GET /main/practitioners/available?date=&time=&editing=
pub async fn available_practitioners(
    State(state): State<AppState>,
    auth: Patient,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<Vec<Practitioner>>>, ApiError> {
    let list = availability_in(&state, &auth.credential, scope(&auth), &q).await?;
    Ok(Json(ApiOk { data: list }))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotsData {
    pub min_date: String,
    pub times: Vec<String>,
}

/// GET /main/slots?date=
pub async fn bookable_slots(
    _auth: Patient,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<ApiOk<SlotsData>>, ApiError> {
    let now = Local::now().naive_local();
    let times = match q.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => vec![],
        Some(raw) => {
            let date = parse_date(raw).ok_or_else(|| {
                let mut errors = FieldErrors::new();
                errors.add("date", "Date must be YYYY-MM-DD");
                ApiError::from(errors)
            })?;
            slots::bookable_times(date, now)
                .iter()
                .map(hhmm::format)
                .collect()
        }
    };

    Ok(Json(ApiOk {
        data: SlotsData {
            min_date: slots::min_booking_date(now.date()).to_string(),
            times,
        },
    }))
}
