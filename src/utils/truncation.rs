const MAX_DUMP_LENGTH: usize = 15_000;
const MAX_ROWS_LENGTH: usize = 4_000;

/// Shortens a harness stream or config dump, keeping its head and tail.
pub fn truncate_dump(output: &str) -> String {
    if output.len() <= MAX_DUMP_LENGTH {
        output.to_string()
    } else {
        let half = MAX_DUMP_LENGTH / 2;
        let start = &output[..floor_boundary(output, half)];
        let end = &output[ceil_boundary(output, output.len() - half)..];
        format!("{}\n\n... [truncated {} bytes] ...\n\n{}", start, output.len() - start.len() - end.len(), end)
    }
}

pub fn truncate_rows(rows: &str) -> String {
    if rows.len() <= MAX_ROWS_LENGTH {
        rows.to_string()
    } else {
        format!("{}...", &rows[..floor_boundary(rows, MAX_ROWS_LENGTH)])
    }
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_dump_untouched() {
        assert_eq!(truncate_dump("stderr text"), "stderr text");
    }

    #[test]
    fn test_long_dump_keeps_head_and_tail() {
        let body = format!("HEAD{}TAIL", "x".repeat(40_000));
        let out = truncate_dump(&body);
        assert!(out.starts_with("HEAD"));
        assert!(out.ends_with("TAIL"));
        assert!(out.contains("[truncated"));
        assert!(out.len() < body.len());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = "§".repeat(10_000);
        let out = truncate_dump(&body);
        assert!(out.contains("[truncated"));
        let rows = truncate_rows(&body);
        assert!(rows.ends_with("..."));
    }
}
