use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::profile::Role;

/// The authenticated caller, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn require(session: Option<&Session>) -> Result<&Session, AppError> {
        session.ok_or(AppError::Unauthenticated)
    }

    pub fn require_role(session: Option<&Session>, role: Role) -> Result<&Session, AppError> {
        let session = Self::require(session)?;
        if session.role != role {
            return Err(AppError::Forbidden(format!(
                "this action requires the {role} role"
            )));
        }
        Ok(session)
    }
}
