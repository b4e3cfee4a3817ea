use axum::http::StatusCode;

/// Domain errors surfaced by the attendance store and registration flow.
/// All of these are recoverable at the handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("professor and semester must both be non-empty")]
    InvalidPartitionKey,

    #[error("no record found for roll number {0}")]
    RecordNotFound(String),

    #[error("roll number and status arrays must have the same length")]
    MalformedBatch,

    #[error("{0} is already registered")]
    DuplicateCredential(String),

    #[error("failed to encode attendance event")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AttendanceError {
    pub fn status(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidPartitionKey => StatusCode::BAD_REQUEST,
            AttendanceError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::MalformedBatch => StatusCode::BAD_REQUEST,
            AttendanceError::DuplicateCredential(_) => StatusCode::CONFLICT,
            AttendanceError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AttendanceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response_parts(self) -> (StatusCode, String) {
        (self.status(), self.to_string())
    }

    /// Recognizes a Postgres unique violation and names the credential
    /// that collided, so a lost insert race still surfaces as a
    /// conflict rather than a server error.
    pub fn duplicate_from(e: &anyhow::Error) -> Option<AttendanceError> {
        let db = e.downcast_ref::<sqlx::Error>()?.as_database_error()?;
        if db.code().as_deref() != Some("23505") {
            return None;
        }
        Some(AttendanceError::DuplicateCredential(
            credential_for_constraint(db.constraint()).into(),
        ))
    }
}

fn credential_for_constraint(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.contains("roll_no") => "Roll number",
        _ => "Email",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_pick_the_colliding_credential() {
        assert_eq!(
            credential_for_constraint(Some("users_roll_no_key")),
            "Roll number"
        );
        assert_eq!(credential_for_constraint(Some("users_email_key")), "Email");
        assert_eq!(credential_for_constraint(None), "Email");
    }

    #[test]
    fn duplicate_from_ignores_non_database_errors() {
        let err = anyhow::anyhow!("connection reset");
        assert!(AttendanceError::duplicate_from(&err).is_none());
    }

    #[test]
    fn duplicate_credential_maps_to_conflict() {
        let err = AttendanceError::DuplicateCredential("Roll number".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Roll number is already registered");
    }
}
