use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::remote::ClinicApi;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ClinicApi>,
    pub sessions: Arc<SessionStore>,
}

/// Room value carried by appointments booked from the patient section.
/// The clinic assigns the real room later.
pub const ROOM_PENDING: &str = "Volte mais tarde";

/* -------------------------
   Envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Roles & principal
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Attendant,
    Doctor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Attendant, Role::Doctor, Role::Admin];

    /// Role names as the remote API spells them.
    /// 'user' is a patient, 'atendent' (sic) an attendant.
    pub fn from_wire(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "patient" => Some(Role::Patient),
            "atendent" | "attendant" => Some(Role::Attendant),
            "doctor" => Some(Role::Doctor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Attendant => "attendant",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// Section a principal of this role lands on after login.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Patient => "/main",
            Role::Attendant => "/attendant",
            Role::Doctor => "/doctor",
            Role::Admin => "/manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Opaque bearer credential issued by the remote API at login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/* -------------------------
   Remote records
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

impl UserRecord {
    pub fn role(&self) -> Option<Role> {
        Role::from_wire(&self.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub crm: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLogEntry {
    pub id: i64,
    #[serde(rename(deserialize = "adminEmail"))]
    pub admin_email: String,
    pub action: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(rename(deserialize = "createdAt"))]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Practitioner {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    /// "<name> - <specialty>", the label the booking form shows.
    pub display: String,
}

impl Practitioner {
    pub fn new(id: i64, name: impl Into<String>, specialty: impl Into<String>) -> Self {
        let name = name.into();
        let specialty = specialty.into();
        let display = if specialty.is_empty() {
            name.clone()
        } else {
            format!("{name} - {specialty}")
        };
        Practitioner {
            id,
            name,
            specialty,
            display,
        }
    }
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename(serialize = "scheduled", deserialize = "agendado"), alias = "scheduled")]
    Scheduled,
    #[serde(rename(serialize = "completed", deserialize = "realizada"), alias = "completed")]
    Completed,
    #[serde(rename(serialize = "cancelled", deserialize = "desmarcada"), alias = "cancelled")]
    Cancelled,
}

impl AppointmentStatus {
    /// Status name the remote API expects on PATCH.
    pub fn wire_name(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "agendado",
            AppointmentStatus::Completed => "realizada",
            AppointmentStatus::Cancelled => "desmarcada",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// A cancelled appointment frees its slot; anything else holds it.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// scheduled -> completed | cancelled. Nothing leaves a terminal status.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed | AppointmentStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerRef {
    pub id: i64,
    #[serde(default)]
    pub crm: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<PersonRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    #[serde(rename(deserialize = "pacienteId"))]
    pub patient_id: i64,
    #[serde(rename(deserialize = "medicoId"))]
    pub practitioner_id: i64,
    #[serde(rename(deserialize = "data"))]
    pub date: NaiveDate,
    #[serde(rename(deserialize = "hora"), with = "hhmm")]
    pub time: NaiveTime,
    #[serde(rename(deserialize = "sala"), default)]
    pub room: String,
    #[serde(rename(deserialize = "telefone"), default)]
    pub contact_phone: String,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: AppointmentStatus,
    #[serde(rename(deserialize = "paciente"), default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PersonRef>,
    #[serde(rename(deserialize = "medico"), default, skip_serializing_if = "Option::is_none")]
    pub practitioner: Option<PractitionerRef>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot {
            date: self.date,
            time: self.time,
        }
    }

    /// Practitioner record for the booking form, built from the nested
    /// `medico` payload when the API sent one.
    pub fn practitioner_record(&self) -> Practitioner {
        let nested = self.practitioner.as_ref();
        let name = nested
            .and_then(|m| m.user.as_ref().map(|u| u.name.clone()).or_else(|| m.name.clone()))
            .unwrap_or_else(|| format!("Practitioner #{}", self.practitioner_id));
        let specialty = nested.and_then(|m| m.specialty.clone()).unwrap_or_default();
        Practitioner::new(self.practitioner_id, name, specialty)
    }
}

/// A (date, time) pair an appointment can be booked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

fn status_or_default<'de, D>(deserializer: D) -> Result<AppointmentStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<AppointmentStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// `HH:MM` times; `HH:MM:SS` is accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }
}

/* -------------------------
   Sessions
--------------------------*/

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
