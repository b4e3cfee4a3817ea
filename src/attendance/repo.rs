use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::attendance::ordering::compare_roll_numbers;
use crate::attendance::partition::partition_key;
use crate::error::AttendanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// One present/absent entry in a student's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub status: AttendanceStatus,
    pub date: Date,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentRecord {
    pub id: Uuid,
    pub partition: String,
    pub roll_no: String,
    pub name: String,
    pub class_name: String,
    pub semester: String,
    pub owner_email: String,
    pub attendance_count: i32,
    pub events: Json<Vec<AttendanceEvent>>,
    pub created_at: OffsetDateTime,
}

/// Outcome of one item in an attendance batch. Items are independent;
/// a batch can partially succeed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BatchItemOutcome {
    pub roll_no: String,
    pub applied: bool,
}

/// Cross-partition attendance total for a single student.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceTotal {
    pub roll_no: String,
    pub name: String,
    pub total_attendance_count: i64,
}

/// Inserts the student or, when the roll number already exists in the
/// partition, updates name and class while preserving the attendance
/// history. Overwriting the history is a separate, explicit operation
/// (`replace_student`).
pub async fn upsert_student(
    db: &PgPool,
    owner: &str,
    semester: &str,
    roll_no: &str,
    name: &str,
    class_name: &str,
) -> Result<StudentRecord, AttendanceError> {
    let partition = partition_key(owner, semester)?;
    let record = sqlx::query_as::<_, StudentRecord>(
        r#"
        INSERT INTO attendance_records (partition, roll_no, name, class_name, semester, owner_email)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (partition, roll_no)
        DO UPDATE SET name = EXCLUDED.name, class_name = EXCLUDED.class_name
        RETURNING id, partition, roll_no, name, class_name, semester, owner_email,
                  attendance_count, events, created_at
        "#,
    )
    .bind(&partition)
    .bind(roll_no)
    .bind(name)
    .bind(class_name)
    .bind(semester)
    .bind(owner)
    .fetch_one(db)
    .await?;
    Ok(record)
}

/// Overwrites the student document wholesale, resetting the attendance
/// count and event history to empty.
pub async fn replace_student(
    db: &PgPool,
    owner: &str,
    semester: &str,
    roll_no: &str,
    name: &str,
    class_name: &str,
) -> Result<StudentRecord, AttendanceError> {
    let partition = partition_key(owner, semester)?;
    let record = sqlx::query_as::<_, StudentRecord>(
        r#"
        INSERT INTO attendance_records (partition, roll_no, name, class_name, semester, owner_email)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (partition, roll_no)
        DO UPDATE SET name = EXCLUDED.name, class_name = EXCLUDED.class_name,
                      attendance_count = 0, events = '[]'::jsonb
        RETURNING id, partition, roll_no, name, class_name, semester, owner_email,
                  attendance_count, events, created_at
        "#,
    )
    .bind(&partition)
    .bind(roll_no)
    .bind(name)
    .bind(class_name)
    .bind(semester)
    .bind(owner)
    .fetch_one(db)
    .await?;
    Ok(record)
}

/// Collapses parallel roll-number/status arrays into the list of updates
/// to apply. A roll number repeated within one batch is applied once,
/// with the last status winning.
pub fn plan_batch(
    roll_nos: &[String],
    statuses: &[AttendanceStatus],
) -> Result<Vec<(String, AttendanceStatus)>, AttendanceError> {
    if roll_nos.len() != statuses.len() {
        return Err(AttendanceError::MalformedBatch);
    }
    let mut last_index = std::collections::HashMap::new();
    for (i, roll_no) in roll_nos.iter().enumerate() {
        last_index.insert(roll_no.as_str(), i);
    }
    Ok(roll_nos
        .iter()
        .zip(statuses)
        .enumerate()
        .filter(|(i, (roll_no, _))| last_index[roll_no.as_str()] == *i)
        .map(|(_, (roll_no, status))| (roll_no.clone(), *status))
        .collect())
}

/// The per-record effect of one attendance event: exactly one entry
/// appended to the history, and a count increment of 1 only when the
/// status is Present.
fn event_effect(
    status: AttendanceStatus,
    date: Date,
) -> Result<(serde_json::Value, i32), serde_json::Error> {
    let events = serde_json::to_value(vec![AttendanceEvent { status, date }])?;
    let increment = if status == AttendanceStatus::Present { 1 } else { 0 };
    Ok((events, increment))
}

/// Appends one attendance event to an existing record. Present events
/// also bump the attendance count. Returns false (leaving the store
/// untouched) when no record exists for the roll number.
async fn record_one(
    db: &PgPool,
    partition: &str,
    roll_no: &str,
    status: AttendanceStatus,
    date: Date,
) -> Result<bool, AttendanceError> {
    let (event, increment) = event_effect(status, date)?;
    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET events = events || $3::jsonb,
            attendance_count = attendance_count + $4
        WHERE partition = $1 AND roll_no = $2
        "#,
    )
    .bind(partition)
    .bind(roll_no)
    .bind(event)
    .bind(increment)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Records a batch of attendance events dated `date`, one per roll
/// number after last-write-wins de-duplication. Each item succeeds or
/// fails on its own; unknown roll numbers are reported as not applied,
/// never silently dropped.
pub async fn record_attendance(
    db: &PgPool,
    owner: &str,
    semester: &str,
    roll_nos: &[String],
    statuses: &[AttendanceStatus],
    date: Date,
) -> Result<Vec<BatchItemOutcome>, AttendanceError> {
    let partition = partition_key(owner, semester)?;
    let plan = plan_batch(roll_nos, statuses)?;

    let mut outcomes = Vec::with_capacity(plan.len());
    for (roll_no, status) in plan {
        let applied = record_one(db, &partition, &roll_no, status, date).await?;
        if !applied {
            tracing::warn!(%roll_no, %partition, "attendance update skipped, roll number not found");
        }
        outcomes.push(BatchItemOutcome { roll_no, applied });
    }
    Ok(outcomes)
}

/// Sorts records in place by roll number, ascending.
pub fn sort_records(records: &mut [StudentRecord]) {
    records.sort_by(|a, b| compare_roll_numbers(&a.roll_no, &b.roll_no));
}

/// All records of the (owner, semester) partition, ordered by roll
/// number.
pub async fn list_ordered(
    db: &PgPool,
    owner: &str,
    semester: &str,
) -> Result<Vec<StudentRecord>, AttendanceError> {
    let partition = partition_key(owner, semester)?;
    let mut records = sqlx::query_as::<_, StudentRecord>(
        r#"
        SELECT id, partition, roll_no, name, class_name, semester, owner_email,
               attendance_count, events, created_at
        FROM attendance_records
        WHERE partition = $1
        "#,
    )
    .bind(&partition)
    .fetch_all(db)
    .await?;
    sort_records(&mut records);
    Ok(records)
}

/// Deletes the record and reports whether one was actually removed.
/// Absence is not an error here; the handler decides how to surface it.
pub async fn remove_student(
    db: &PgPool,
    owner: &str,
    semester: &str,
    roll_no: &str,
) -> Result<bool, AttendanceError> {
    let partition = partition_key(owner, semester)?;
    let result = sqlx::query(
        r#"DELETE FROM attendance_records WHERE partition = $1 AND roll_no = $2"#,
    )
    .bind(&partition)
    .bind(roll_no)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Folds per-partition (name, count) rows into one total. The display
/// name comes from the first row that has one.
pub fn aggregate_totals(roll_no: &str, rows: &[(String, i32)]) -> Option<AttendanceTotal> {
    if rows.is_empty() {
        return None;
    }
    let name = rows
        .iter()
        .map(|(name, _)| name.as_str())
        .find(|name| !name.is_empty())
        .unwrap_or("")
        .to_string();
    let total = rows.iter().map(|(_, count)| i64::from(*count)).sum();
    Some(AttendanceTotal {
        roll_no: roll_no.to_string(),
        name,
        total_attendance_count: total,
    })
}

/// Sums a student's attendance across every attendance partition. The
/// same roll number may appear once per (professor, semester) pair.
pub async fn total_attendance(
    db: &PgPool,
    roll_no: &str,
) -> Result<AttendanceTotal, AttendanceError> {
    let rows = sqlx::query_as::<_, (String, i32)>(
        r#"
        SELECT name, attendance_count
        FROM attendance_records
        WHERE roll_no = $1 AND partition LIKE 'attendance\_%'
        ORDER BY created_at
        "#,
    )
    .bind(roll_no)
    .fetch_all(db)
    .await?;

    aggregate_totals(roll_no, &rows)
        .ok_or_else(|| AttendanceError::RecordNotFound(roll_no.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record(roll_no: &str) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            partition: "attendance_prof_Sem1".into(),
            roll_no: roll_no.into(),
            name: "Student".into(),
            class_name: "Sem1".into(),
            semester: "Sem1".into(),
            owner_email: "prof@uni.edu".into(),
            attendance_count: 0,
            events: Json(vec![]),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn plan_batch_rejects_unequal_lengths() {
        let roll_nos = vec!["CS-1".to_string(), "CS-2".to_string()];
        let statuses = vec![AttendanceStatus::Present];
        assert!(matches!(
            plan_batch(&roll_nos, &statuses),
            Err(AttendanceError::MalformedBatch)
        ));
    }

    #[test]
    fn plan_batch_last_write_wins_on_duplicates() {
        let roll_nos: Vec<String> = ["CS-1", "CS-2", "CS-1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let statuses = vec![
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Absent,
        ];
        let plan = plan_batch(&roll_nos, &statuses).unwrap();
        assert_eq!(
            plan,
            vec![
                ("CS-2".to_string(), AttendanceStatus::Absent),
                ("CS-1".to_string(), AttendanceStatus::Absent),
            ]
        );
    }

    #[test]
    fn plan_batch_preserves_order_without_duplicates() {
        let roll_nos: Vec<String> = ["CS-2", "CS-1"].iter().map(|s| s.to_string()).collect();
        let statuses = vec![AttendanceStatus::Present, AttendanceStatus::Present];
        let plan = plan_batch(&roll_nos, &statuses).unwrap();
        assert_eq!(plan[0].0, "CS-2");
        assert_eq!(plan[1].0, "CS-1");
    }

    #[test]
    fn sort_records_uses_roll_number_order() {
        let mut records = vec![record("CS-10"), record("EE-1"), record("CS-9")];
        sort_records(&mut records);
        let order: Vec<&str> = records.iter().map(|r| r.roll_no.as_str()).collect();
        assert_eq!(order, vec!["CS-9", "CS-10", "EE-1"]);
    }

    #[test]
    fn aggregate_totals_sums_across_partitions() {
        let rows = vec![("Ada".to_string(), 3), ("Ada".to_string(), 5)];
        let total = aggregate_totals("CS-1", &rows).unwrap();
        assert_eq!(total.total_attendance_count, 8);
        assert_eq!(total.name, "Ada");
        assert_eq!(total.roll_no, "CS-1");
    }

    #[test]
    fn aggregate_totals_takes_first_nonempty_name() {
        let rows = vec![(String::new(), 2), ("Ada".to_string(), 1)];
        let total = aggregate_totals("CS-1", &rows).unwrap();
        assert_eq!(total.name, "Ada");
        assert_eq!(total.total_attendance_count, 3);
    }

    #[test]
    fn aggregate_totals_none_when_no_rows() {
        assert!(aggregate_totals("CS-404", &[]).is_none());
    }

    #[test]
    fn present_event_appends_one_entry_and_increments_once() {
        let (events, increment) = event_effect(AttendanceStatus::Present, date!(2024 - 09 - 02))
            .expect("encode event");
        let entries = events.as_array().expect("jsonb array");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["status"], "Present");
        assert_eq!(entries[0]["date"], "2024-09-02");
        assert_eq!(increment, 1);
    }

    #[test]
    fn absent_event_appends_without_incrementing() {
        let (events, increment) = event_effect(AttendanceStatus::Absent, date!(2024 - 09 - 03))
            .expect("encode event");
        let entries = events.as_array().expect("jsonb array");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["status"], "Absent");
        assert_eq!(increment, 0);
    }

    #[test]
    fn attendance_event_serializes_with_calendar_date() {
        let event = AttendanceEvent {
            status: AttendanceStatus::Present,
            date: date!(2024 - 09 - 02),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "Present");
        let back: AttendanceEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
