use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, ProfessorLoginRequest, PublicUser, RefreshRequest,
            RegisterProfessorRequest, RegisterStudentRequest, TokenKind,
        },
        repo::User,
        services::{hash_password, is_valid_email, verify_password, AuthUser, JwtKeys},
    },
    error::AttendanceError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_student))
        .route("/auth/register/professor", post(register_professor))
        .route("/auth/login", post(login))
        .route("/auth/login/professor", post(login_professor))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn public(user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        roll_no: user.roll_no.clone(),
        semester: user.semester.clone(),
    }
}

fn token_pair(
    keys: &JwtKeys,
    user: &User,
    semester: Option<&str>,
) -> Result<(String, String), (StatusCode, String)> {
    let access = keys.sign_access(user, semester).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let refresh = keys.sign_refresh(user, semester).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok((access, refresh))
}

#[instrument(skip(state, payload))]
pub async fn register_student(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterStudentRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }
    if payload.roll_no.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Roll number is required".into()));
    }

    // Both the email and the roll number must be unique. The database
    // constraints are the source of truth; these lookups just give a
    // friendlier first answer.
    match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AttendanceError::DuplicateCredential("Email".into()).into_response_parts());
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }
    match User::find_by_roll_no(&state.db, &payload.roll_no).await {
        Ok(Some(_)) => {
            warn!(roll_no = %payload.roll_no, "roll number already registered");
            return Err(
                AttendanceError::DuplicateCredential("Roll number".into()).into_response_parts(),
            );
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_roll_no failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let user = match User::create_student(
        &state.db,
        &payload.name,
        &payload.email,
        payload.phone.as_deref(),
        payload.dob.as_deref(),
        &hash,
        &payload.roll_no,
        &payload.semester,
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            // A concurrent registration can win the race between the
            // lookup and the insert; the unique violation is still a
            // duplicate credential, not a server error.
            if let Some(dup) = AttendanceError::duplicate_from(&e) {
                warn!(error = %e, "registration lost uniqueness race");
                return Err(dup.into_response_parts());
            }
            error!(error = %e, "create student failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, &user, None)?;

    info!(user_id = %user.id, email = %user.email, "student registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register_professor(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterProfessorRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AttendanceError::DuplicateCredential("Email".into()).into_response_parts());
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let user = match User::create_professor(
        &state.db,
        &payload.name,
        &payload.email,
        payload.phone.as_deref(),
        payload.dob.as_deref(),
        payload.qualification.as_deref(),
        &hash,
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            if let Some(dup) = AttendanceError::duplicate_from(&e) {
                warn!(error = %e, "registration lost uniqueness race");
                return Err(dup.into_response_parts());
            }
            error!(error = %e, "create professor failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, &user, None)?;

    info!(user_id = %user.id, email = %user.email, "professor registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public(&user),
    }))
}

async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, (StatusCode, String)> {
    let user = match User::find_by_email(&state.db, email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let ok = match verify_password(password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }
    Ok(user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = authenticate(&state, &payload.email, &payload.password).await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, &user, None)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public(&user),
    }))
}

/// Professor login: the chosen semester goes into the token and scopes
/// every attendance request for this session.
#[instrument(skip(state, payload))]
pub async fn login_professor(
    State(state): State<AppState>,
    Json(mut payload): Json<ProfessorLoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.semester.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Semester is required".into()));
    }

    let user = authenticate(&state, &payload.email, &payload.password).await?;
    if user.role != "professor" {
        warn!(user_id = %user.id, "professor login by non-professor");
        return Err((StatusCode::FORBIDDEN, "Professor account required".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = token_pair(&keys, &user, Some(&payload.semester))?;

    info!(user_id = %user.id, semester = %payload.semester, "professor logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, format!("{}", e)))?;

    // Issue a new pair from the verified claims so the semester context
    // survives the rotation.
    let access_token = keys
        .resign(&claims, TokenKind::Access)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let refresh_token = keys
        .resign(&claims, TokenKind::Refresh)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .ok()
        .flatten()
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public(&user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %claims.sub, "find_by_id failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(public(&user)))
}

#[cfg(test)]
mod me_tests {
    use super::*;

    #[test]
    fn test_me_response_serialization() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role: "student".to_string(),
            roll_no: Some("CS-1".to_string()),
            semester: Some("Sem1".to_string()),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("CS-1"));
    }
}
