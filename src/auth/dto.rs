use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Token type used to distinguish Access and Refresh JWTs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Professor,
    Student,
}

/// JWT claims. Besides the standard fields they carry the full request
/// context (role, semester, roll number) so no per-request state lives
/// anywhere but the token itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub semester: Option<String>,
    pub roll_no: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Request body for student registration.
#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub password: String,
    pub roll_no: String,
    pub semester: String,
}

/// Request body for professor registration.
#[derive(Debug, Deserialize)]
pub struct RegisterProfessorRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub qualification: Option<String>,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Professor login also names the semester being taught; it scopes the
/// attendance partition for the whole session.
#[derive(Debug, Deserialize)]
pub struct ProfessorLoginRequest {
    pub email: String,
    pub password: String,
    pub semester: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub roll_no: Option<String>,
    pub semester: Option<String>,
}
