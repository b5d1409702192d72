//! Label sanitization for orchestrator resource names.

/// Returned when sanitization leaves nothing usable.
pub const DEFAULT_LABEL: &str = "default-label";

const MAX_LABEL_LEN: usize = 63;

/// Normalize a free-form identifier into an orchestrator-safe label.
///
/// Every run of characters outside `[A-Za-z0-9._-]` collapses to a single
/// `-`, leading/trailing non-alphanumerics are trimmed, the result is capped
/// at 63 characters (re-trimmed so it never ends on a separator), and the
/// whole thing is lowercased. An input with no usable characters yields
/// [`DEFAULT_LABEL`].
pub fn sanitize_label(input: &str) -> String {
    let mut collapsed = String::with_capacity(input.len());
    let mut pending_separator = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            collapsed.push(c);
            pending_separator = false;
        } else if !pending_separator {
            collapsed.push('-');
            pending_separator = true;
        }
    }

    let mut label: String = collapsed
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();

    if label.len() > MAX_LABEL_LEN {
        // Everything left is ASCII, so byte truncation is char-safe.
        label.truncate(MAX_LABEL_LEN);
        while label.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
            label.pop();
        }
    }

    if label.is_empty() {
        return DEFAULT_LABEL.to_string();
    }

    label.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn passes_through_clean_identifiers() {
        assert_eq!(sanitize_label("my-video-123"), "my-video-123");
        assert_eq!(sanitize_label("Video.Segment_01"), "video.segment_01");
    }

    #[test]
    fn collapses_runs_of_invalid_characters() {
        assert_eq!(sanitize_label("my video!!!id"), "my-video-id");
        assert_eq!(sanitize_label("a///b:::c"), "a-b-c");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(sanitize_label("--video--"), "video");
        assert_eq!(sanitize_label("...video..."), "video");
        assert_eq!(sanitize_label("  spaced  "), "spaced");
    }

    #[test]
    fn truncates_to_63_and_retrims() {
        let long = "a".repeat(80);
        assert_eq!(sanitize_label(&long).len(), 63);

        // Character 63 lands on a separator; it must not survive.
        let tricky = format!("{}-{}", "a".repeat(62), "b".repeat(20));
        let sanitized = sanitize_label(&tricky);
        assert_eq!(sanitized, "a".repeat(62));
    }

    #[test]
    fn unusable_input_yields_default() {
        assert_eq!(sanitize_label(""), DEFAULT_LABEL);
        assert_eq!(sanitize_label("!!!"), DEFAULT_LABEL);
        assert_eq!(sanitize_label("---"), DEFAULT_LABEL);
    }

    #[test]
    fn lowercases_result() {
        assert_eq!(sanitize_label("MyVideo"), "myvideo");
    }

    fn is_orchestrator_safe(label: &str) -> bool {
        let bytes = label.as_bytes();
        if bytes.is_empty() || bytes.len() > 63 {
            return false;
        }
        let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        let inner_ok =
            |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-');
        edge_ok(bytes[0])
            && edge_ok(bytes[bytes.len() - 1])
            && bytes.iter().all(|&b| inner_ok(b))
    }

    proptest! {
        #[test]
        fn prop_output_is_always_orchestrator_safe(input in ".*") {
            let label = sanitize_label(&input);
            prop_assert!(is_orchestrator_safe(&label), "unsafe label: {label:?}");
        }

        #[test]
        fn prop_sanitize_is_idempotent(input in ".*") {
            let once = sanitize_label(&input);
            prop_assert_eq!(sanitize_label(&once), once);
        }
    }
}
