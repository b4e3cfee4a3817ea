pub(crate) use crate::auth::dto::{Claims, JwtKeys, Role, TokenKind};
use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(
        &self,
        user: &User,
        semester: Option<&str>,
        kind: TokenKind,
    ) -> anyhow::Result<String> {
        let role = match user.role.as_str() {
            "professor" => Role::Professor,
            "student" => Role::Student,
            other => anyhow::bail!("unknown role {other}"),
        };
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role,
            semester: semester.map(str::to_string).or_else(|| user.semester.clone()),
            roll_no: user.roll_no.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User, semester: Option<&str>) -> anyhow::Result<String> {
        self.sign_with_kind(user, semester, TokenKind::Access)
    }
    pub fn sign_refresh(&self, user: &User, semester: Option<&str>) -> anyhow::Result<String> {
        self.sign_with_kind(user, semester, TokenKind::Refresh)
    }

    /// Re-issue a token from verified claims, keeping the semester and
    /// roll-number context established at login.
    pub fn resign(&self, claims: &Claims, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            kind,
            ..claims.clone()
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Extracts and validates the access token, yielding the full claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or((
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header".to_string(),
        ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Access token required".to_string(),
            ));
        }

        Ok(AuthUser(claims))
    }
}

/// The professor's per-request partition context: who owns the records
/// and which semester they are teaching. Derived from the token so no
/// identity ever lives in process-wide state.
pub struct ProfessorContext {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub semester: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for ProfessorContext
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Professor {
            return Err((
                StatusCode::FORBIDDEN,
                "Professor access required".to_string(),
            ));
        }
        let semester = claims.semester.ok_or((
            StatusCode::BAD_REQUEST,
            "No semester selected; log in again with a semester".to_string(),
        ))?;
        Ok(ProfessorContext {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            semester,
        })
    }
}

/// A logged-in student with their roll number.
pub struct StudentContext {
    pub user_id: Uuid,
    pub roll_no: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for StudentContext
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Student {
            return Err((
                StatusCode::FORBIDDEN,
                "Student access required".to_string(),
            ));
        }
        let roll_no = claims.roll_no.ok_or((
            StatusCode::BAD_REQUEST,
            "No roll number on this account".to_string(),
        ))?;
        Ok(StudentContext {
            user_id: claims.sub,
            roll_no,
        })
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("prof@uni.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@uni.edu"));
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    fn professor() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Prof. Ada".into(),
            email: "ada@uni.edu".into(),
            phone: None,
            dob: None,
            qualification: Some("PhD".into()),
            password_hash: "hash".into(),
            role: "professor".into(),
            roll_no: None,
            semester: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn student() -> User {
        User {
            roll_no: Some("CS-7".into()),
            semester: Some("Sem3".into()),
            role: "student".into(),
            ..professor()
        }
    }

    #[tokio::test]
    async fn sign_and_verify_access_token_carries_context() {
        let keys = make_keys();
        let user = professor();
        let token = keys
            .sign_access(&user, Some("Fall2024"))
            .expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ada@uni.edu");
        assert_eq!(claims.role, Role::Professor);
        assert_eq!(claims.semester.as_deref(), Some("Fall2024"));
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn student_token_keeps_roll_number_and_semester() {
        let keys = make_keys();
        let user = student();
        let token = keys.sign_access(&user, None).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.roll_no.as_deref(), Some("CS-7"));
        assert_eq!(claims.semester.as_deref(), Some("Sem3"));
    }

    #[tokio::test]
    async fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let token = keys.sign_access(&professor(), None).expect("sign access");
        let err = keys.verify_refresh(&token).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[tokio::test]
    async fn resign_preserves_semester_context() {
        let keys = make_keys();
        let token = keys
            .sign_refresh(&professor(), Some("Sem5"))
            .expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        let access = keys.resign(&claims, TokenKind::Access).expect("resign");
        let access_claims = keys.verify(&access).expect("verify resigned");
        assert_eq!(access_claims.kind, TokenKind::Access);
        assert_eq!(access_claims.semester.as_deref(), Some("Sem5"));
    }

    #[tokio::test]
    async fn rejects_unknown_role() {
        let keys = make_keys();
        let mut user = professor();
        user.role = "admin".into();
        assert!(keys.sign_access(&user, None).is_err());
    }
}
