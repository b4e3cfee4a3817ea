use serde::{Deserialize, Serialize};

use crate::attendance::repo::{AttendanceEvent, AttendanceStatus, BatchItemOutcome, StudentRecord};

/// A student row as rendered on the professor's sheet.
#[derive(Debug, Serialize)]
pub struct StudentView {
    pub roll_no: String,
    pub name: String,
    pub class_name: String,
    pub semester: String,
    pub attendance_count: i32,
    pub events: Vec<AttendanceEvent>,
}

impl From<StudentRecord> for StudentView {
    fn from(r: StudentRecord) -> Self {
        Self {
            roll_no: r.roll_no,
            name: r.name,
            class_name: r.class_name,
            semester: r.semester,
            attendance_count: r.attendance_count,
            events: r.events.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SheetResponse {
    pub professor: String,
    pub semester: String,
    pub students: Vec<StudentView>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertStudentRequest {
    pub roll_no: String,
    pub name: String,
    // Defaults to the session semester, like the original enrollment form.
    pub class_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceStudentRequest {
    pub name: String,
    pub class_name: Option<String>,
}

/// Parallel arrays, one status per roll number.
#[derive(Debug, Deserialize)]
pub struct RecordBatchRequest {
    pub roll_nos: Vec<String>,
    pub statuses: Vec<AttendanceStatus>,
}

#[derive(Debug, Serialize)]
pub struct RecordBatchResponse {
    pub recorded: usize,
    pub not_found: usize,
    pub items: Vec<BatchItemOutcome>,
}

impl RecordBatchResponse {
    pub fn from_outcomes(items: Vec<BatchItemOutcome>) -> Self {
        let recorded = items.iter().filter(|o| o.applied).count();
        Self {
            recorded,
            not_found: items.len() - recorded,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_response_counts_outcomes() {
        let items = vec![
            BatchItemOutcome { roll_no: "CS-1".into(), applied: true },
            BatchItemOutcome { roll_no: "CS-2".into(), applied: false },
            BatchItemOutcome { roll_no: "CS-3".into(), applied: true },
        ];
        let resp = RecordBatchResponse::from_outcomes(items);
        assert_eq!(resp.recorded, 2);
        assert_eq!(resp.not_found, 1);
        assert_eq!(resp.items.len(), 3);
    }

    #[test]
    fn batch_request_deserializes_parallel_arrays() {
        let body = r#"{"roll_nos":["CS-1","CS-2"],"statuses":["Present","Absent"]}"#;
        let req: RecordBatchRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.roll_nos.len(), 2);
        assert_eq!(req.statuses[0], AttendanceStatus::Present);
        assert_eq!(req.statuses[1], AttendanceStatus::Absent);
    }
}
