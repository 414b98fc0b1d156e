//! Source excerpts with line numbers.

use std::fs;
use tracing::debug;

/// Number every line of `filename`, marking `target_line` with an arrow.
///
/// With `context`, only that many lines either side of the target are kept.
/// A missing or unreadable file produces an inline message instead of an
/// error.
pub fn render_source(filename: &str, target_line: i64, context: Option<usize>) -> String {
    if filename.is_empty() {
        return "No source file available.".to_string();
    }

    let content = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(err) => {
            debug!(file = filename, error = %err, "source file unavailable");
            return format!("Error reading file {}:\n{}", filename, err);
        }
    };
    number_lines(&content, target_line, context)
}

/// Number the lines of `content` in the `"%4d | "` format.
pub fn number_lines(content: &str, target_line: i64, context: Option<usize>) -> String {
    let window = |line_number: usize| match (context, usize::try_from(target_line)) {
        (Some(context), Ok(target)) if target > 0 => line_number.abs_diff(target) <= context,
        _ => true,
    };

    let mut out = String::new();
    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        if !window(line_number) {
            continue;
        }
        if i64::try_from(line_number).is_ok_and(|n| n == target_line) {
            out.push_str("  -> | ");
        } else {
            out.push_str(&format!("{:4} | ", line_number));
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNIPPET: &str = "package main\n\nfunc main() {\n\twork()\n}\n";

    #[test]
    fn numbers_and_marks_target() {
        let out = number_lines(SNIPPET, 4, None);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "   1 | package main");
        assert_eq!(lines[2], "   3 | func main() {");
        assert_eq!(lines[3], "  -> | \twork()");
    }

    #[test]
    fn context_window() {
        let out = number_lines(SNIPPET, 4, Some(1));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["   3 | func main() {", "  -> | \twork()", "   5 | }"]);
    }

    #[test]
    fn unknown_target_shows_everything() {
        let out = number_lines(SNIPPET, 0, Some(1));
        assert_eq!(out.lines().count(), 5);
        assert!(!out.contains("->"));
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNIPPET.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap();

        let out = render_source(path, 3, None);
        assert!(out.contains("  -> | func main() {"));
    }

    #[test]
    fn missing_file_is_inline_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.go");
        let path = path.to_str().unwrap();

        let out = render_source(path, 3, None);
        assert!(out.starts_with(&format!("Error reading file {}:", path)));
        assert_eq!(render_source("", 3, None), "No source file available.");
    }
}
