use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Professors and students share the
/// table; roll_no and semester are only set for students.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub qualification: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub roll_no: Option<String>,
    pub semester: Option<String>,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, name, email, phone, dob, qualification, password_hash, role, roll_no, semester, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by roll number (students only carry one).
    pub async fn find_by_roll_no(db: &PgPool, roll_no: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE roll_no = $1"
        ))
        .bind(roll_no)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new student with hashed password.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_student(
        db: &PgPool,
        name: &str,
        email: &str,
        phone: Option<&str>,
        dob: Option<&str>,
        password_hash: &str,
        roll_no: &str,
        semester: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, phone, dob, password_hash, role, roll_no, semester)
            VALUES ($1, $2, $3, $4, $5, 'student', $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(dob)
        .bind(password_hash)
        .bind(roll_no)
        .bind(semester)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Create a new professor with hashed password.
    pub async fn create_professor(
        db: &PgPool,
        name: &str,
        email: &str,
        phone: Option<&str>,
        dob: Option<&str>,
        qualification: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, phone, dob, qualification, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6, 'professor')
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(dob)
        .bind(qualification)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
