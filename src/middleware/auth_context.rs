use std::marker::PhantomData;
use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::token_fingerprint;
use crate::error::ApiError;
use crate::models::{AppState, Credential, Principal, Role};

/// Resolved session: who is calling and the remote credential acting for them.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub credential: Credential,
    pub session_id: Uuid,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <session token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::Unauthenticated)?;
            let token = authz.token();

            let session = state.sessions.lookup(token).await.ok_or_else(|| {
                tracing::debug!(token = %token_fingerprint(token), "no live session for token");
                ApiError::Unauthenticated
            })?;

            // Re-resolve on every request; a dead credential ends the session.
            let principal = match state.api.current_user(&session.credential).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(session_id = %session.session_id, error = %e, "principal lookup failed, dropping session");
                    state.sessions.close(token).await;
                    return Err(ApiError::Unauthenticated);
                }
            };

            Ok(AuthContext {
                principal,
                credential: session.credential,
                session_id: session.session_id,
            })
        }
    }
}

/// Role-scoped part of the portal.
pub trait Section: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct PatientSection;
pub struct AttendantSection;
pub struct DoctorSection;
pub struct ManagerSection;

impl Section for PatientSection {
    const ROLE: Role = Role::Patient;
}
impl Section for AttendantSection {
    const ROLE: Role = Role::Attendant;
}
impl Section for DoctorSection {
    const ROLE: Role = Role::Doctor;
}
impl Section for ManagerSection {
    const ROLE: Role = Role::Admin;
}

/// Wrong role gets the same answer as no session at all.
pub fn authorize(principal: &Principal, required: Role) -> Result<(), ApiError> {
    if principal.role == required {
        Ok(())
    } else {
        tracing::info!(user_id = principal.id, role = %principal.role, required = %required, "role not allowed in section");
        Err(ApiError::Unauthenticated)
    }
}

/// A session admitted to section `S`. Handlers taking this never run for anyone else.
pub struct Authorized<S: Section> {
    ctx: AuthContext,
    _section: PhantomData<fn() -> S>,
}

impl<S: Section> Deref for Authorized<S> {
    type Target = AuthContext;

    fn deref(&self) -> &AuthContext {
        &self.ctx
    }
}

impl<S: Section> FromRequestParts<AppState> for Authorized<S> {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let ctx = AuthContext::from_request_parts(parts, state).await?;
            authorize(&ctx.principal, S::ROLE)?;
            tracing::debug!(session_id = %ctx.session_id, user_id = ctx.principal.id, section = %S::ROLE, "section admitted");
            Ok(Authorized {
                ctx,
                _section: PhantomData,
            })
        }
    }
}
