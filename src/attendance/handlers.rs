use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument};

use crate::{
    attendance::{
        dto::{
            RecordBatchRequest, RecordBatchResponse, ReplaceStudentRequest, SheetResponse,
            StudentView, UpsertStudentRequest,
        },
        repo,
        repo::AttendanceTotal,
    },
    auth::services::{ProfessorContext, StudentContext},
    error::AttendanceError,
    state::AppState,
};

pub fn professor_routes() -> Router<AppState> {
    Router::new()
        .route("/attendance", get(list_sheet))
        .route("/attendance/students", post(upsert_student))
        .route("/attendance/students/:roll_no", put(replace_student))
        .route("/attendance/students/:roll_no", delete(remove_student))
        .route("/attendance/record", post(record_batch))
}

pub fn student_routes() -> Router<AppState> {
    Router::new().route("/attendance/summary", get(attendance_summary))
}

/// Enrollment fields must be present: a blank roll number can never be
/// addressed again, and a blank name would poison the display-name
/// selection in the cross-partition summary.
fn validate_enrollment(roll_no: &str, name: &str) -> Result<(), (StatusCode, String)> {
    if roll_no.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Roll number is required".into()));
    }
    if name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name is required".into()));
    }
    Ok(())
}

fn domain(e: AttendanceError) -> (StatusCode, String) {
    if let AttendanceError::Database(ref db) = e {
        error!(error = %db, "attendance store error");
    }
    e.into_response_parts()
}

/// The professor's sheet: every student of the current (professor,
/// semester) partition, ordered by roll number.
#[instrument(skip(state, ctx), fields(professor = %ctx.email, semester = %ctx.semester))]
pub async fn list_sheet(
    State(state): State<AppState>,
    ctx: ProfessorContext,
) -> Result<Json<SheetResponse>, (StatusCode, String)> {
    let records = repo::list_ordered(&state.db, &ctx.email, &ctx.semester)
        .await
        .map_err(domain)?;
    Ok(Json(SheetResponse {
        professor: ctx.name,
        semester: ctx.semester,
        students: records.into_iter().map(StudentView::from).collect(),
    }))
}

/// Enrolls a student into the sheet, or updates name/class for an
/// existing roll number. Attendance history is preserved either way.
#[instrument(skip(state, ctx, payload), fields(professor = %ctx.email, semester = %ctx.semester))]
pub async fn upsert_student(
    State(state): State<AppState>,
    ctx: ProfessorContext,
    Json(payload): Json<UpsertStudentRequest>,
) -> Result<Json<StudentView>, (StatusCode, String)> {
    validate_enrollment(&payload.roll_no, &payload.name)?;
    let class_name = payload.class_name.as_deref().unwrap_or(&ctx.semester);
    let record = repo::upsert_student(
        &state.db,
        &ctx.email,
        &ctx.semester,
        &payload.roll_no,
        &payload.name,
        class_name,
    )
    .await
    .map_err(domain)?;

    info!(roll_no = %record.roll_no, "student upserted");
    Ok(Json(StudentView::from(record)))
}

/// Full overwrite of a student record. Unlike the upsert this resets
/// the attendance history, so it is its own explicit endpoint.
#[instrument(skip(state, ctx, payload), fields(professor = %ctx.email, semester = %ctx.semester))]
pub async fn replace_student(
    State(state): State<AppState>,
    ctx: ProfessorContext,
    Path(roll_no): Path<String>,
    Json(payload): Json<ReplaceStudentRequest>,
) -> Result<Json<StudentView>, (StatusCode, String)> {
    validate_enrollment(&roll_no, &payload.name)?;
    let class_name = payload.class_name.as_deref().unwrap_or(&ctx.semester);
    let record = repo::replace_student(
        &state.db,
        &ctx.email,
        &ctx.semester,
        &roll_no,
        &payload.name,
        class_name,
    )
    .await
    .map_err(domain)?;

    info!(roll_no = %record.roll_no, "student replaced, history reset");
    Ok(Json(StudentView::from(record)))
}

/// Records one day's attendance for the whole sheet. Each roll number
/// succeeds or fails independently; the response lists both.
#[instrument(skip(state, ctx, payload), fields(professor = %ctx.email, semester = %ctx.semester))]
pub async fn record_batch(
    State(state): State<AppState>,
    ctx: ProfessorContext,
    Json(payload): Json<RecordBatchRequest>,
) -> Result<Json<RecordBatchResponse>, (StatusCode, String)> {
    let today = OffsetDateTime::now_utc().date();
    let outcomes = repo::record_attendance(
        &state.db,
        &ctx.email,
        &ctx.semester,
        &payload.roll_nos,
        &payload.statuses,
        today,
    )
    .await
    .map_err(domain)?;

    let resp = RecordBatchResponse::from_outcomes(outcomes);
    info!(
        professor_id = %ctx.user_id,
        recorded = resp.recorded,
        not_found = resp.not_found,
        "attendance batch recorded"
    );
    Ok(Json(resp))
}

#[instrument(skip(state, ctx), fields(professor = %ctx.email, semester = %ctx.semester))]
pub async fn remove_student(
    State(state): State<AppState>,
    ctx: ProfessorContext,
    Path(roll_no): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = repo::remove_student(&state.db, &ctx.email, &ctx.semester, &roll_no)
        .await
        .map_err(domain)?;

    if removed {
        info!(%roll_no, "student removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(domain(AttendanceError::RecordNotFound(roll_no)))
    }
}

/// A student's own attendance, summed across every professor's
/// partition they appear in.
#[instrument(skip(state, ctx), fields(user_id = %ctx.user_id, roll_no = %ctx.roll_no))]
pub async fn attendance_summary(
    State(state): State<AppState>,
    ctx: StudentContext,
) -> Result<Json<AttendanceTotal>, (StatusCode, String)> {
    let total = repo::total_attendance(&state.db, &ctx.roll_no)
        .await
        .map_err(domain)?;
    Ok(Json(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_requires_roll_number_and_name() {
        assert!(validate_enrollment("CS-1", "Ada").is_ok());

        let (status, _) = validate_enrollment("", "Ada").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, msg) = validate_enrollment("CS-1", "   ").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Name is required");
    }
}
