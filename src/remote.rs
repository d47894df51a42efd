// src/remote.rs
//
// Client side of the external clinic REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::models::{
    hhmm, AdminLogEntry, Appointment, AppointmentStatus, Credential, DoctorRecord, Practitioner,
    Principal, Role, Slot, UserRecord,
};
use crate::scheduler::NewAppointment;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with a non-success status.
    #[error("clinic API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response from clinic API: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Rejected { status: 404, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentFilter {
    All,
    Patient(i64),
    Practitioner(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterDoctor {
    pub name: String,
    pub email: String,
    pub password: String,
    pub crm: String,
    pub specialty: String,
    pub phone: String,
}

/// Everything the portal needs from the clinic API.
#[async_trait]
pub trait ClinicApi: Send + Sync {
    /// GET /users/me
    async fn current_user(&self, credential: &Credential) -> Result<Principal, RemoteError>;
    /// POST /auth/login
    async fn login(&self, email: &str, password: &str) -> Result<Credential, RemoteError>;
    /// POST /auth/register
    async fn register(&self, user: &RegisterUser) -> Result<JsonValue, RemoteError>;

    async fn list_users(&self, credential: &Credential) -> Result<Vec<UserRecord>, RemoteError>;
    async fn create_user(
        &self,
        credential: &Credential,
        user: &RegisterUser,
    ) -> Result<JsonValue, RemoteError>;
    async fn register_doctor(
        &self,
        credential: &Credential,
        doctor: &RegisterDoctor,
    ) -> Result<DoctorRecord, RemoteError>;
    async fn admin_logs(&self, credential: &Credential) -> Result<Vec<AdminLogEntry>, RemoteError>;

    /// Appointments in API order.
    async fn list_appointments(
        &self,
        credential: &Credential,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, RemoteError>;
    /// Practitioners with no booking at the slot, per the API.
    async fn available_practitioners(
        &self,
        credential: &Credential,
        slot: Slot,
    ) -> Result<Vec<Practitioner>, RemoteError>;
    async fn create_appointment(
        &self,
        credential: &Credential,
        appointment: &NewAppointment,
        who: &str,
    ) -> Result<Appointment, RemoteError>;
    async fn cancel_appointment(
        &self,
        credential: &Credential,
        id: i64,
        who: &str,
    ) -> Result<(), RemoteError>;
    async fn set_appointment_status(
        &self,
        credential: &Credential,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<(), RemoteError>;
}

/* ============================================================
   Wire shapes
   ============================================================ */

#[derive(Debug, Deserialize)]
struct RemotePrincipal {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RemotePractitioner {
    id: i64,
    #[serde(default)]
    specialty: String,
    user: RemotePractitionerUser,
}

#[derive(Debug, Deserialize)]
struct RemotePractitionerUser {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateAppointmentBody<'a> {
    #[serde(rename = "pacienteId")]
    patient_id: i64,
    #[serde(rename = "medicoId")]
    practitioner_id: i64,
    #[serde(rename = "data")]
    date: NaiveDate,
    #[serde(rename = "hora")]
    time: String,
    #[serde(rename = "sala")]
    room: &'a str,
    #[serde(rename = "telefone")]
    contact_phone: &'a str,
    who: &'a str,
}

/* ============================================================
   reqwest implementation
   ============================================================ */

pub struct HttpClinicApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpClinicApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str, credential: Option<&Credential>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match credential {
            Some(c) => req.bearer_auth(c.as_str()),
            None => req,
        }
    }

    /// Send, fail on non-success, hand back the raw body.
    async fn send(&self, req: RequestBuilder) -> Result<String, RemoteError> {
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), body = %body, "clinic API returned failure");
            return Err(RemoteError::rejected(status.as_u16(), rejection_message(status, &body)));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let body = self.send(req).await?;
        if body.trim().is_empty() {
            return Err(RemoteError::Decode("empty body".into()));
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// NestJS-style `{"message": "..."}` or `{"message": ["...", "..."]}`, else a generic line.
fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<JsonValue> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| match v.get("message") {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(JsonValue::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    });
    message.unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
}

#[async_trait]
impl ClinicApi for HttpClinicApi {
    async fn current_user(&self, credential: &Credential) -> Result<Principal, RemoteError> {
        let raw: RemotePrincipal = self
            .send_json(self.request(Method::GET, "/users/me", Some(credential)))
            .await?;
        let role = Role::from_wire(&raw.role)
            .ok_or_else(|| RemoteError::Decode(format!("unknown role '{}'", raw.role)))?;
        Ok(Principal {
            id: raw.id,
            name: raw.name,
            email: raw.email,
            role,
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<Credential, RemoteError> {
        let reply: LoginReply = self
            .send_json(
                self.request(Method::POST, "/auth/login", None)
                    .json(&serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        if reply.access_token.is_empty() {
            return Err(RemoteError::Decode("login reply carried no access_token".into()));
        }
        Ok(Credential::new(reply.access_token))
    }

    async fn register(&self, user: &RegisterUser) -> Result<JsonValue, RemoteError> {
        self.send_json(self.request(Method::POST, "/auth/register", None).json(user))
            .await
    }

    async fn list_users(&self, credential: &Credential) -> Result<Vec<UserRecord>, RemoteError> {
        self.send_json(self.request(Method::GET, "/users/all", Some(credential)))
            .await
    }

    async fn create_user(
        &self,
        credential: &Credential,
        user: &RegisterUser,
    ) -> Result<JsonValue, RemoteError> {
        self.send_json(self.request(Method::POST, "/users/", Some(credential)).json(user))
            .await
    }

    async fn register_doctor(
        &self,
        credential: &Credential,
        doctor: &RegisterDoctor,
    ) -> Result<DoctorRecord, RemoteError> {
        self.send_json(
            self.request(Method::POST, "/doctors/register", Some(credential))
                .json(doctor),
        )
        .await
    }

    async fn admin_logs(&self, credential: &Credential) -> Result<Vec<AdminLogEntry>, RemoteError> {
        self.send_json(self.request(Method::GET, "/admin/logs", Some(credential)))
            .await
    }

    async fn list_appointments(
        &self,
        credential: &Credential,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, RemoteError> {
        let req = match filter {
            AppointmentFilter::All => self.request(Method::GET, "/agendamento", Some(credential)),
            AppointmentFilter::Patient(id) => self
                .request(Method::GET, "/agendamento/filtro", Some(credential))
                .query(&[("pacienteId", id)]),
            AppointmentFilter::Practitioner(id) => self
                .request(Method::GET, "/agendamento/filtro", Some(credential))
                .query(&[("medicoId", id)]),
        };
        // no-store: a 304 from an intermediate cache would hide fresh bookings
        self.send_json(req.header(reqwest::header::CACHE_CONTROL, "no-store"))
            .await
    }

    async fn available_practitioners(
        &self,
        credential: &Credential,
        slot: Slot,
    ) -> Result<Vec<Practitioner>, RemoteError> {
        let raw: Vec<RemotePractitioner> = self
            .send_json(
                self.request(Method::GET, "/agendamento/disponiveis", Some(credential))
                    .query(&[
                        ("data", slot.date.to_string()),
                        ("hora", hhmm::format(&slot.time)),
                    ]),
            )
            .await?;
        Ok(raw
            .into_iter()
            .map(|d| Practitioner::new(d.id, d.user.name, d.specialty))
            .collect())
    }

    async fn create_appointment(
        &self,
        credential: &Credential,
        appointment: &NewAppointment,
        who: &str,
    ) -> Result<Appointment, RemoteError> {
        let body = CreateAppointmentBody {
            patient_id: appointment.patient_id,
            practitioner_id: appointment.practitioner_id,
            date: appointment.slot.date,
            time: hhmm::format(&appointment.slot.time),
            room: &appointment.room,
            contact_phone: &appointment.contact_phone,
            who,
        };
        self.send_json(
            self.request(Method::POST, "/agendamento", Some(credential))
                .json(&body),
        )
        .await
    }

    async fn cancel_appointment(
        &self,
        credential: &Credential,
        id: i64,
        who: &str,
    ) -> Result<(), RemoteError> {
        self.send(
            self.request(Method::DELETE, &format!("/agendamento/{id}"), Some(credential))
                .json(&serde_json::json!({ "who": who })),
        )
        .await
        .map(|_| ())
    }

    async fn set_appointment_status(
        &self,
        credential: &Credential,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<(), RemoteError> {
        self.send(
            self.request(Method::PATCH, &format!("/agendamento/{id}/status"), Some(credential))
                .json(&serde_json::json!({ "status": status.wire_name() })),
        )
        .await
        .map(|_| ())
    }
}
