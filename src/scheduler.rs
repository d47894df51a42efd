// src/scheduler.rs
//
// Slot availability, double-booking prevention and appointment mutations.
// The local checks are advisory: the clinic API has the final word on
// conflicts and every rejection it sends is surfaced unchanged.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    models::{hhmm, Appointment, AppointmentStatus, Credential, Practitioner, Slot, ROOM_PENDING},
    remote::{AppointmentFilter, ClinicApi},
    validation::{check_phone, FieldErrors},
};

/* ============================================================
   Candidate appointments
   ============================================================ */

/// Appointment form as submitted; every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentDraft {
    pub patient_id: Option<i64>,
    pub practitioner_id: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub room: Option<String>,
    pub contact_phone: Option<String>,
}

/// A validated appointment, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub practitioner_id: i64,
    pub slot: Slot,
    pub room: String,
    pub contact_phone: String,
}

impl NewAppointment {
    /// Recreate payload for an existing appointment.
    pub fn from_existing(a: &Appointment) -> Self {
        NewAppointment {
            patient_id: a.patient_id,
            practitioner_id: a.practitioner_id,
            slot: a.slot(),
            room: a.room.clone(),
            contact_phone: a.contact_phone.clone(),
        }
    }

    /// Rooms only clash once the clinic has actually assigned one.
    pub fn room_assigned(&self) -> bool {
        let room = self.room.trim();
        !room.is_empty() && room != ROOM_PENDING
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

impl AppointmentDraft {
    pub fn validate(&self) -> Result<NewAppointment, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.patient_id.is_none() {
            errors.add("patient_id", "Select a patient");
        }
        if self.practitioner_id.is_none() {
            errors.add("practitioner_id", "Select a practitioner");
        }

        errors.require("date", self.date.as_deref(), "Pick a date");
        let date = self.date.as_deref().and_then(parse_date);
        if date.is_none() {
            errors.add("date", "Date must be YYYY-MM-DD");
        }

        errors.require("time", self.time.as_deref(), "Pick a time");
        let time = self.time.as_deref().and_then(hhmm::parse);
        if time.is_none() {
            errors.add("time", "Time must be HH:MM");
        }

        errors.require("room", self.room.as_deref(), "Enter a room");
        check_phone(&mut errors, "contact_phone", self.contact_phone.as_deref());

        let (Some(patient_id), Some(practitioner_id), Some(date), Some(time), true) = (
            self.patient_id,
            self.practitioner_id,
            date,
            time,
            errors.is_empty(),
        ) else {
            return Err(errors);
        };

        Ok(NewAppointment {
            patient_id,
            practitioner_id,
            slot: Slot { date, time },
            room: self.room.as_deref().unwrap_or_default().trim().to_string(),
            contact_phone: self.contact_phone.as_deref().unwrap_or_default().trim().to_string(),
        })
    }
}

/* ============================================================
   Conflict rules
   ============================================================ */

/// Same slot, a live booking, and either the same practitioner or the same assigned room.
pub fn conflicts_with(existing: &Appointment, candidate: &NewAppointment) -> bool {
    existing.status.occupies_slot()
        && existing.slot() == candidate.slot
        && (existing.practitioner_id == candidate.practitioner_id
            || (candidate.room_assigned() && existing.room.trim() == candidate.room.trim()))
}

/// First appointment the candidate would double-book, ignoring the one under edit.
pub fn find_conflict<'a>(
    appointments: &'a [Appointment],
    candidate: &NewAppointment,
    editing: Option<i64>,
) -> Option<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| Some(a.id) != editing)
        .find(|a| conflicts_with(a, candidate))
}

/// Candidates minus everyone holding a live booking at `slot`.
/// The appointment under edit never counts against its own practitioner.
pub fn free_practitioners(
    candidates: &[Practitioner],
    appointments: &[Appointment],
    slot: Slot,
    editing: Option<i64>,
) -> Vec<Practitioner> {
    candidates
        .iter()
        .filter(|p| {
            !appointments.iter().any(|a| {
                Some(a.id) != editing
                    && a.status.occupies_slot()
                    && a.slot() == slot
                    && a.practitioner_id == p.id
            })
        })
        .cloned()
        .collect()
}

/* ============================================================
   Scheduler
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// Already cancelled or gone; nothing was sent.
    AlreadyCancelled,
}

pub struct Scheduler<'a> {
    api: &'a dyn ClinicApi,
    credential: &'a Credential,
}

impl<'a> Scheduler<'a> {
    pub fn new(api: &'a dyn ClinicApi, credential: &'a Credential) -> Self {
        Self { api, credential }
    }

    pub async fn list(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, ApiError> {
        Ok(self.api.list_appointments(self.credential, filter).await?)
    }

    /// Look an appointment up inside the caller's scope.
    pub async fn find(
        &self,
        scope: AppointmentFilter,
        id: i64,
    ) -> Result<Option<Appointment>, ApiError> {
        let all = self.list(scope).await?;
        Ok(all.into_iter().find(|a| a.id == id))
    }

    /// Empty unless both date and time are given.
    pub async fn available_practitioners(
        &self,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        editing: Option<&Appointment>,
    ) -> Result<Vec<Practitioner>, ApiError> {
        let (Some(date), Some(time)) = (date, time) else {
            return Ok(vec![]);
        };
        let slot = Slot { date, time };

        let mut available = self.api.available_practitioners(self.credential, slot).await?;

        if let Some(edit) = editing {
            if !available.iter().any(|p| p.id == edit.practitioner_id) {
                // The API counts the edited booking against its own practitioner.
                // Put them back unless something else keeps them busy.
                let theirs = self
                    .list(AppointmentFilter::Practitioner(edit.practitioner_id))
                    .await?;
                let restored =
                    free_practitioners(&[edit.practitioner_record()], &theirs, slot, Some(edit.id));
                available.extend(restored);
            }
        }

        Ok(available)
    }

    /// Advisory double-booking check run before anything is sent.
    pub async fn precheck(
        &self,
        candidate: &NewAppointment,
        editing: Option<&Appointment>,
    ) -> Result<(), ApiError> {
        let slot = candidate.slot;
        let available = self
            .available_practitioners(Some(slot.date), Some(slot.time), editing)
            .await?;
        if !available.iter().any(|p| p.id == candidate.practitioner_id) {
            return Err(ApiError::slot_conflict(format!(
                "practitioner {} is already booked on {} at {}",
                candidate.practitioner_id,
                slot.date,
                hhmm::format(&slot.time)
            )));
        }

        if candidate.room_assigned() {
            let all = self.list(AppointmentFilter::All).await?;
            if let Some(clash) = find_conflict(&all, candidate, editing.map(|e| e.id)) {
                return Err(ApiError::slot_conflict(format!(
                    "room {} is taken on {} at {} by appointment {}",
                    candidate.room,
                    slot.date,
                    hhmm::format(&slot.time),
                    clash.id
                )));
            }
        }
        Ok(())
    }

    pub async fn create(
        &self,
        candidate: &NewAppointment,
        who: &str,
    ) -> Result<Appointment, ApiError> {
        require_who(who)?;
        self.precheck(candidate, None).await?;

        let created = self
            .api
            .create_appointment(self.credential, candidate, who)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "appointment create rejected"))?;

        tracing::info!(
            appointment_id = created.id,
            practitioner_id = created.practitioner_id,
            date = %created.date,
            "appointment created"
        );
        Ok(created)
    }

    /// Editing is cancel-then-recreate. If the recreate fails the original is
    /// booked again; if that fails too the caller gets `PartialUpdate`.
    pub async fn update(
        &self,
        original: &Appointment,
        replacement: &NewAppointment,
        who: &str,
    ) -> Result<Appointment, ApiError> {
        require_who(who)?;
        if original.status.is_terminal() {
            return Err(ApiError::Conflict(
                "TERMINAL_STATUS",
                format!("appointment {} is {} and cannot be edited", original.id, original.status),
            ));
        }
        self.precheck(replacement, Some(original)).await?;

        self.api
            .cancel_appointment(self.credential, original.id, who)
            .await?;

        let err = match self
            .api
            .create_appointment(self.credential, replacement, who)
            .await
        {
            Ok(created) => {
                tracing::info!(old_id = original.id, new_id = created.id, "appointment updated");
                return Ok(created);
            }
            Err(e) => e,
        };

        tracing::warn!(appointment_id = original.id, error = %err, "replacement rejected, restoring original");
        match self
            .api
            .create_appointment(self.credential, &NewAppointment::from_existing(original), who)
            .await
        {
            Ok(restored) => Err(ApiError::Conflict(
                "UPDATE_REJECTED_RESTORED",
                format!(
                    "the change was rejected ({err}); the original booking was restored as appointment {}",
                    restored.id
                ),
            )),
            Err(restore_err) => {
                tracing::error!(
                    appointment_id = original.id,
                    error = %restore_err,
                    "could not restore cancelled appointment"
                );
                Err(ApiError::PartialUpdate {
                    cancelled_id: original.id,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Cancel by id. An id the API no longer knows counts as cancelled.
    pub async fn cancel(&self, id: i64, who: &str) -> Result<CancelOutcome, ApiError> {
        require_who(who)?;
        match self.api.cancel_appointment(self.credential, id, who).await {
            Ok(()) => {
                tracing::info!(appointment_id = id, who, "appointment cancelled");
                Ok(CancelOutcome::Cancelled)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(appointment_id = id, "cancel of unknown appointment treated as done");
                Ok(CancelOutcome::AlreadyCancelled)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel only if the appointment is visible in `scope`; anything else is a no-op.
    pub async fn cancel_in(
        &self,
        scope: AppointmentFilter,
        id: i64,
        who: &str,
    ) -> Result<CancelOutcome, ApiError> {
        require_who(who)?;
        match self.find(scope, id).await? {
            Some(a) if a.status == AppointmentStatus::Scheduled => self.cancel(id, who).await,
            Some(a) if a.status == AppointmentStatus::Completed => Err(ApiError::Conflict(
                "TERMINAL_STATUS",
                format!("appointment {id} is {} and cannot be cancelled", a.status),
            )),
            _ => Ok(CancelOutcome::AlreadyCancelled),
        }
    }

    pub async fn set_status(
        &self,
        current: &Appointment,
        next: AppointmentStatus,
    ) -> Result<(), ApiError> {
        if next == AppointmentStatus::Scheduled {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "status must be completed or cancelled".into(),
            ));
        }
        if !current.status.can_transition_to(next) {
            return Err(ApiError::Conflict(
                "TERMINAL_STATUS",
                format!("appointment {} is already {}", current.id, current.status),
            ));
        }

        self.api
            .set_appointment_status(self.credential, current.id, next)
            .await?;
        tracing::info!(appointment_id = current.id, from = %current.status, to = %next, "status changed");
        Ok(())
    }
}

fn require_who(who: &str) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("who", Some(who), "Acting user email is required");
    errors.into_result().map_err(ApiError::from)
}
