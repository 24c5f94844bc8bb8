use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::models::profile::Role;
use crate::models::session::Session;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity as asserted by the identity gateway in front of the
/// service. Absent or malformed headers resolve to no session.
pub struct MaybeSession(pub Option<Session>);

impl MaybeSession {
    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_parts(parts)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn session_from_parts(parts: &Parts) -> Option<Session> {
    let user_id = header(parts, USER_ID_HEADER)?;
    let role = match header(parts, USER_ROLE_HEADER)?.parse::<Role>() {
        Ok(role) => role,
        Err(err) => {
            debug!(error = %err, "ignoring session with malformed role");
            return None;
        }
    };

    Some(Session::new(user_id, role))
}
