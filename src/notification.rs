//! Notification payload assembly — title/body normalization and size
//! bounding.

/// A resolved notification, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The channel this publishes to, derived from the recipient address.
    pub topic: String,
    /// Decoded Subject header; empty when absent or when the body swap
    /// moved it into the body.
    pub title: String,
    /// Readable message text, bounded by the configured byte limit.
    pub body: String,
}

/// Combine the decoded Subject header with the extracted body text.
///
/// A notification needs visible content: when the extracted body has no
/// text, the subject becomes the body and no title is shown.
pub fn normalize(subject: &str, body: &str) -> (String, String) {
    let subject = subject.trim();
    let body = body.trim();
    if body.is_empty() {
        (String::new(), subject.to_string())
    } else {
        (subject.to_string(), body.to_string())
    }
}

/// Bound `body` to at most `limit` bytes.
///
/// The cut backs off to the previous character boundary when byte
/// `limit` would split a multi-byte character, since a `String` must
/// stay valid UTF-8. For ASCII input the cut is byte-exact; a
/// multi-byte tail loses at most three extra bytes.
pub fn truncate(mut body: String, limit: usize) -> String {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_title_when_body_present() {
        let (title, body) = normalize("and one more", "what's up");
        assert_eq!(title, "and one more");
        assert_eq!(body, "what's up");
    }

    #[test]
    fn normalize_swaps_subject_into_empty_body() {
        let (title, body) = normalize("This email has a subject but no body", "");
        assert_eq!(title, "");
        assert_eq!(body, "This email has a subject but no body");
    }

    #[test]
    fn normalize_treats_whitespace_body_as_empty() {
        let (title, body) = normalize("subject only", "  \n\n  ");
        assert_eq!(title, "");
        assert_eq!(body, "subject only");
    }

    #[test]
    fn normalize_trims_subject_and_body() {
        let (title, body) = normalize("  hello  ", "  world  ");
        assert_eq!(title, "hello");
        assert_eq!(body, "world");
    }

    #[test]
    fn normalize_empty_everything_yields_empty() {
        let (title, body) = normalize("", "");
        assert_eq!(title, "");
        assert_eq!(body, "");
    }

    #[test]
    fn truncate_cuts_overlong_body_byte_exact() {
        let body = "a".repeat(4097);
        let out = truncate(body, 4096);
        assert_eq!(out.len(), 4096);
        assert_eq!(out, "a".repeat(4096));
    }

    #[test]
    fn truncate_leaves_body_at_limit_unchanged() {
        let body = "a".repeat(4096);
        assert_eq!(truncate(body.clone(), 4096), body);
    }

    #[test]
    fn truncate_leaves_short_body_unchanged() {
        assert_eq!(truncate("short".into(), 4096), "short");
    }

    #[test]
    fn truncate_backs_off_to_char_boundary() {
        // 'é' is two bytes; a limit of 3 lands mid-character.
        let out = truncate("aéé".into(), 3);
        assert_eq!(out, "aé");
    }
}
