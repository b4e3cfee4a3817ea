use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub message: String,
    pub created_at: OffsetDateTime,
}

pub async fn insert(
    db: &PgPool,
    name: &str,
    email: &str,
    phone: Option<&str>,
    address: Option<&str>,
    message: &str,
) -> anyhow::Result<Feedback> {
    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        INSERT INTO feedback (name, email, phone, address, message)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, email, phone, address, message, created_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(address)
    .bind(message)
    .fetch_one(db)
    .await?;
    Ok(feedback)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Feedback>> {
    let rows = sqlx::query_as::<_, Feedback>(
        r#"
        SELECT id, name, email, phone, address, message, created_at
        FROM feedback
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}
