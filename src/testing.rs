// In-memory clinic API for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use crate::models::{
    hhmm, AdminLogEntry, AppState, Appointment, AppointmentStatus, Credential, DoctorRecord,
    PersonRef, Practitioner, PractitionerRef, Principal, Role, Slot, UserRecord,
};
use crate::remote::{AppointmentFilter, ClinicApi, RegisterDoctor, RegisterUser, RemoteError};
use crate::scheduler::{find_conflict, free_practitioners, parse_date, NewAppointment};
use crate::session::SessionStore;

pub fn slot(date: &str, time: &str) -> Slot {
    Slot {
        date: parse_date(date).expect("test date"),
        time: hhmm::parse(time).expect("test time"),
    }
}

pub fn appointment(
    id: i64,
    patient_id: i64,
    practitioner_id: i64,
    date: &str,
    time: &str,
    room: &str,
) -> Appointment {
    let s = slot(date, time);
    Appointment {
        id,
        patient_id,
        practitioner_id,
        date: s.date,
        time: s.time,
        room: room.to_string(),
        contact_phone: "11987654321".into(),
        status: AppointmentStatus::Scheduled,
        patient: None,
        practitioner: None,
    }
}

#[derive(Default)]
struct FakeState {
    practitioners: Vec<Practitioner>,
    appointments: Vec<Appointment>,
    users: Vec<UserRecord>,
    doctors: Vec<DoctorRecord>,
    logs: Vec<AdminLogEntry>,
    tokens: HashMap<String, Principal>,
    logins: HashMap<String, (String, Principal)>,
    next_id: i64,
    stale_availability: bool,
    reject_creates: usize,
    last_who: Option<String>,
}

#[derive(Default)]
pub struct FakeClinicApi {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

impl FakeClinicApi {
    pub fn with_practitioners(ids: &[i64]) -> Self {
        let api = FakeClinicApi::default();
        {
            let mut st = api.lock();
            st.next_id = 100;
            for &id in ids {
                st.practitioners
                    .push(Practitioner::new(id, format!("Dr {id}"), "General"));
                st.users.push(UserRecord {
                    id,
                    name: format!("Dr {id}"),
                    email: format!("doctor{id}@clinic.test"),
                    role: "doctor".into(),
                });
            }
        }
        api
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of API calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn principal(role: Role, id: i64) -> Principal {
        Principal {
            id,
            name: format!("{role} {id}"),
            email: format!("{role}{id}@clinic.test"),
            role,
        }
    }

    /// Credential the fake resolves to a principal of `role`.
    pub fn credential_for(&self, role: Role, id: i64) -> Credential {
        let token = format!("remote-{role}-{id}");
        self.lock()
            .tokens
            .insert(token.clone(), Self::principal(role, id));
        Credential::new(token)
    }

    pub fn credential_for_patient(&self, id: i64) -> Credential {
        self.credential_for(Role::Patient, id)
    }

    pub fn credential_for_doctor(&self, id: i64) -> Credential {
        self.credential_for(Role::Doctor, id)
    }

    pub fn add_login(&self, email: &str, password: &str, principal: Principal) {
        self.lock()
            .logins
            .insert(email.to_string(), (password.to_string(), principal));
    }

    pub fn add_user(&self, id: i64, name: &str, role: &str) {
        self.lock().users.push(UserRecord {
            id,
            name: name.into(),
            email: format!("{}@clinic.test", name.to_lowercase()),
            role: role.into(),
        });
    }

    pub fn add_log(&self, action: &str) {
        let mut st = self.lock();
        let id = st.logs.len() as i64 + 1;
        st.logs.push(AdminLogEntry {
            id,
            admin_email: "admin@clinic.test".into(),
            action: action.into(),
            target: None,
            created_at: "2024-06-01T09:00:00Z".into(),
        });
    }

    pub fn seed(&self, appointment: Appointment) {
        self.lock().appointments.push(appointment);
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.lock().appointments.clone()
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.lock().users.clone()
    }

    /// Availability ignores existing bookings, as a lagging replica would.
    pub fn set_stale_availability(&self, stale: bool) {
        self.lock().stale_availability = stale;
    }

    /// Reject the next `n` appointment creates.
    pub fn reject_creates(&self, n: usize) {
        self.lock().reject_creates = n;
    }

    pub fn last_who(&self) -> Option<String> {
        self.lock().last_who.clone()
    }

    fn next_id(st: &mut FakeState) -> i64 {
        st.next_id += 1;
        st.next_id
    }
}

#[async_trait]
impl ClinicApi for FakeClinicApi {
    async fn current_user(&self, credential: &Credential) -> Result<Principal, RemoteError> {
        self.hit();
        self.lock()
            .tokens
            .get(credential.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::rejected(401, "Unauthorized"))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Credential, RemoteError> {
        self.hit();
        let mut st = self.lock();
        let principal = match st.logins.get(email) {
            Some((pw, p)) if pw == password => p.clone(),
            _ => return Err(RemoteError::rejected(401, "Invalid credentials")),
        };
        let token = format!("remote-login-{}", principal.id);
        st.tokens.insert(token.clone(), principal);
        Ok(Credential::new(token))
    }

    async fn register(&self, user: &RegisterUser) -> Result<JsonValue, RemoteError> {
        self.hit();
        let mut st = self.lock();
        if st.users.iter().any(|u| u.email == user.email) {
            return Err(RemoteError::rejected(400, "Email already registered"));
        }
        let id = Self::next_id(&mut st);
        st.users.push(UserRecord {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: "user".into(),
        });
        Ok(json!({ "id": id, "name": user.name, "email": user.email, "role": "user" }))
    }

    async fn list_users(&self, _credential: &Credential) -> Result<Vec<UserRecord>, RemoteError> {
        self.hit();
        Ok(self.lock().users.clone())
    }

    async fn create_user(
        &self,
        _credential: &Credential,
        user: &RegisterUser,
    ) -> Result<JsonValue, RemoteError> {
        self.register(user).await
    }

    async fn register_doctor(
        &self,
        _credential: &Credential,
        doctor: &RegisterDoctor,
    ) -> Result<DoctorRecord, RemoteError> {
        self.hit();
        let mut st = self.lock();
        let id = Self::next_id(&mut st);
        st.users.push(UserRecord {
            id,
            name: doctor.name.clone(),
            email: doctor.email.clone(),
            role: "doctor".into(),
        });
        st.practitioners
            .push(Practitioner::new(id, doctor.name.clone(), doctor.specialty.clone()));
        let record = DoctorRecord {
            id: Some(id),
            name: doctor.name.clone(),
            email: doctor.email.clone(),
            crm: doctor.crm.clone(),
            specialty: doctor.specialty.clone(),
            phone: doctor.phone.clone(),
        };
        st.doctors.push(record.clone());
        Ok(record)
    }

    async fn admin_logs(&self, _credential: &Credential) -> Result<Vec<AdminLogEntry>, RemoteError> {
        self.hit();
        Ok(self.lock().logs.clone())
    }

    async fn list_appointments(
        &self,
        _credential: &Credential,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, RemoteError> {
        self.hit();
        let st = self.lock();
        Ok(st
            .appointments
            .iter()
            .filter(|a| match filter {
                AppointmentFilter::All => true,
                AppointmentFilter::Patient(id) => a.patient_id == id,
                AppointmentFilter::Practitioner(id) => a.practitioner_id == id,
            })
            .cloned()
            .collect())
    }

    async fn available_practitioners(
        &self,
        _credential: &Credential,
        slot: Slot,
    ) -> Result<Vec<Practitioner>, RemoteError> {
        self.hit();
        let st = self.lock();
        if st.stale_availability {
            return Ok(st.practitioners.clone());
        }
        Ok(free_practitioners(&st.practitioners, &st.appointments, slot, None))
    }

    async fn create_appointment(
        &self,
        _credential: &Credential,
        appointment: &NewAppointment,
        who: &str,
    ) -> Result<Appointment, RemoteError> {
        self.hit();
        let mut st = self.lock();
        st.last_who = Some(who.to_string());
        if st.reject_creates > 0 {
            st.reject_creates -= 1;
            return Err(RemoteError::rejected(400, "Agendamento recusado"));
        }
        if find_conflict(&st.appointments, appointment, None).is_some() {
            return Err(RemoteError::rejected(409, "Horário indisponível"));
        }

        let id = Self::next_id(&mut st);
        let medico = st
            .practitioners
            .iter()
            .find(|p| p.id == appointment.practitioner_id)
            .map(|p| PractitionerRef {
                id: p.id,
                crm: None,
                specialty: Some(p.specialty.clone()),
                phone: None,
                name: None,
                user: Some(PersonRef {
                    id: p.id,
                    name: p.name.clone(),
                }),
            });
        let created = Appointment {
            id,
            patient_id: appointment.patient_id,
            practitioner_id: appointment.practitioner_id,
            date: appointment.slot.date,
            time: appointment.slot.time,
            room: appointment.room.clone(),
            contact_phone: appointment.contact_phone.clone(),
            status: AppointmentStatus::Scheduled,
            patient: None,
            practitioner: medico,
        };
        st.appointments.push(created.clone());
        Ok(created)
    }

    async fn cancel_appointment(
        &self,
        _credential: &Credential,
        id: i64,
        who: &str,
    ) -> Result<(), RemoteError> {
        self.hit();
        let mut st = self.lock();
        st.last_who = Some(who.to_string());
        let Some(pos) = st.appointments.iter().position(|a| a.id == id) else {
            return Err(RemoteError::rejected(404, "Agendamento não encontrado"));
        };
        st.appointments.remove(pos);
        Ok(())
    }

    async fn set_appointment_status(
        &self,
        _credential: &Credential,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<(), RemoteError> {
        self.hit();
        let mut st = self.lock();
        let Some(a) = st.appointments.iter_mut().find(|a| a.id == id) else {
            return Err(RemoteError::rejected(404, "Agendamento não encontrado"));
        };
        a.status = status;
        Ok(())
    }
}

/// App state wired to a fake API.
pub fn state_with(api: Arc<FakeClinicApi>) -> AppState {
    AppState {
        api,
        sessions: Arc::new(SessionStore::new(24)),
    }
}

/// Open a portal session whose remote credential resolves to `role`/`id`.
pub async fn session_token(state: &AppState, api: &FakeClinicApi, role: Role, id: i64) -> String {
    let credential = api.credential_for(role, id);
    state.sessions.open(credential).await.0
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve_stub(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Base URL of a local port with nothing listening on it.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind spare port");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}
