use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::services::{is_valid_email, ProfessorContext},
    feedback::{
        dto::{FeedbackView, SubmitFeedbackRequest},
        repo,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(submit_feedback))
        .route("/feedback", get(list_feedback))
}

/// Public feedback form; no login required.
#[instrument(skip(state, payload))]
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackView>), (StatusCode, String)> {
    if payload.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required".into()));
    }
    if !is_valid_email(payload.email.trim()) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let feedback = repo::insert(
        &state.db,
        &payload.name,
        &payload.email,
        payload.phone.as_deref(),
        payload.address.as_deref(),
        &payload.message,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "insert feedback failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(feedback_id = %feedback.id, "feedback submitted");
    Ok((StatusCode::CREATED, Json(view(feedback))))
}

#[instrument(skip(state, ctx), fields(professor = %ctx.email))]
pub async fn list_feedback(
    State(state): State<AppState>,
    ctx: ProfessorContext,
) -> Result<Json<Vec<FeedbackView>>, (StatusCode, String)> {
    let rows = repo::list_all(&state.db).await.map_err(|e| {
        error!(error = %e, "list feedback failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(rows.into_iter().map(view).collect()))
}

fn view(f: repo::Feedback) -> FeedbackView {
    FeedbackView {
        id: f.id,
        name: f.name,
        email: f.email,
        phone: f.phone,
        address: f.address,
        message: f.message,
        created_at: f.created_at,
    }
}
