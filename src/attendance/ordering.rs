use std::cmp::Ordering;

/// Orders roll numbers the way a human reads them: hyphen-delimited
/// segments are compared pairwise, numerically when both sides are
/// numbers ("CS-9" before "CS-10") and lexically otherwise.
///
/// A missing segment counts as empty and sorts before anything else.
/// At a differing position a numeric segment always sorts before a
/// non-numeric one. Numeric comparison ignores leading zeros, so
/// "CS-02" and "CS-2" compare equal even though the strings differ.
pub fn compare_roll_numbers(a: &str, b: &str) -> Ordering {
    let parts_a: Vec<&str> = a.split('-').collect();
    let parts_b: Vec<&str> = b.split('-').collect();

    for i in 0..parts_a.len().max(parts_b.len()) {
        let seg_a = parts_a.get(i).copied().unwrap_or("");
        let seg_b = parts_b.get(i).copied().unwrap_or("");
        match compare_segments(seg_a, seg_b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().cmp(&b.len());
    }
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(na), Ok(nb)) => na.cmp(&nb),
        (Err(_), Err(_)) => a.cmp(b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_sorts_numerically() {
        assert_eq!(compare_roll_numbers("CS-9", "CS-10"), Ordering::Less);
        assert_eq!(compare_roll_numbers("CS-10", "CS-9"), Ordering::Greater);
    }

    #[test]
    fn alpha_prefix_sorts_lexically() {
        assert_eq!(compare_roll_numbers("CS-10", "EE-1"), Ordering::Less);
        assert_eq!(compare_roll_numbers("EE-1", "CS-10"), Ordering::Greater);
    }

    #[test]
    fn leading_zeros_compare_equal() {
        assert_eq!(compare_roll_numbers("CS-02", "CS-2"), Ordering::Equal);
        assert_eq!(compare_roll_numbers("CS-2", "CS-02"), Ordering::Equal);
    }

    #[test]
    fn numeric_segment_sorts_before_alpha() {
        assert_eq!(compare_roll_numbers("CS-1", "CS-A"), Ordering::Less);
        assert_eq!(compare_roll_numbers("CS-A", "CS-1"), Ordering::Greater);
    }

    #[test]
    fn missing_segment_sorts_first() {
        assert_eq!(compare_roll_numbers("CS", "CS-1"), Ordering::Less);
        assert_eq!(compare_roll_numbers("CS-1", "CS"), Ordering::Greater);
        assert_eq!(compare_roll_numbers("", "CS-1"), Ordering::Less);
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let pairs = [
            ("CS-9", "CS-10"),
            ("CS-10", "EE-1"),
            ("A-1-B", "A-1-C"),
            ("X", "X-5"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                compare_roll_numbers(a, b),
                compare_roll_numbers(b, a).reverse()
            );
        }
    }

    #[test]
    fn deep_segments_break_ties() {
        assert_eq!(compare_roll_numbers("A-1-2", "A-1-10"), Ordering::Less);
        assert_eq!(compare_roll_numbers("A-1-2", "A-1-2"), Ordering::Equal);
    }
}
