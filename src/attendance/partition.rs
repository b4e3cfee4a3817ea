use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AttendanceError;

pub const PARTITION_PREFIX: &str = "attendance_";

/// Builds the normalized partition key for a (professor, semester) pair.
/// The professor identity and the semester label are sanitized
/// independently, each with its own character whitelist.
pub fn partition_key(owner: &str, semester: &str) -> Result<String, AttendanceError> {
    if owner.trim().is_empty() || semester.trim().is_empty() {
        return Err(AttendanceError::InvalidPartitionKey);
    }

    lazy_static! {
        static ref OWNER_UNSAFE: Regex = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
        static ref SEMESTER_UNSAFE: Regex = Regex::new(r"[^a-zA-Z0-9_() ]").unwrap();
    }

    let owner = OWNER_UNSAFE.replace_all(owner, "_");
    let semester = SEMESTER_UNSAFE.replace_all(semester, "_");
    Ok(format!("{PARTITION_PREFIX}{owner}_{semester}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_owner_and_semester_independently() {
        let key = partition_key("prof@uni.edu", "Fall (2024) #1").unwrap();
        // '@' and '.' are unsafe in the owner; '#' is unsafe in the
        // semester but '(', ')' and spaces are kept.
        assert_eq!(key, "attendance_prof_uni_edu_Fall (2024) _1");
    }

    #[test]
    fn plain_inputs_pass_through() {
        let key = partition_key("alice", "Sem3").unwrap();
        assert_eq!(key, "attendance_alice_Sem3");
    }

    #[test]
    fn rejects_empty_owner() {
        assert!(matches!(
            partition_key("", "Fall2024"),
            Err(AttendanceError::InvalidPartitionKey)
        ));
        assert!(matches!(
            partition_key("   ", "Fall2024"),
            Err(AttendanceError::InvalidPartitionKey)
        ));
    }

    #[test]
    fn rejects_empty_semester() {
        assert!(matches!(
            partition_key("prof@uni.edu", ""),
            Err(AttendanceError::InvalidPartitionKey)
        ));
    }
}
