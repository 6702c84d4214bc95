//! Recipient-to-topic resolution.

use crate::error::RecipientError;

/// Static recipient policy: the domain addresses must carry, plus an
/// optional local-part prefix that is stripped from the topic.
#[derive(Debug, Clone)]
pub struct TopicPolicy {
    pub domain: String,
    pub prefix: String,
}

/// Resolve a recipient mailbox address to a topic name.
///
/// The address domain must equal `policy.domain` (case-insensitive).
/// A non-empty `policy.prefix` must prefix the local part
/// (case-sensitive) and is stripped; an empty prefix takes the local
/// part verbatim. Topic-name validity is the dispatch sink's rule, so
/// the caller supplies it as `is_valid`.
pub fn resolve(
    address: &str,
    policy: &TopicPolicy,
    is_valid: impl Fn(&str) -> bool,
) -> Result<String, RecipientError> {
    let (local, domain) = address
        .rsplit_once('@')
        .ok_or_else(|| RecipientError::MalformedAddress(address.to_string()))?;

    if !domain.eq_ignore_ascii_case(&policy.domain) {
        return Err(RecipientError::DomainMismatch {
            expected: policy.domain.clone(),
        });
    }

    let topic = if policy.prefix.is_empty() {
        local
    } else {
        local
            .strip_prefix(&policy.prefix)
            .ok_or_else(|| RecipientError::PrefixMismatch {
                expected: policy.prefix.clone(),
            })?
    };

    if topic.is_empty() || !is_valid(topic) {
        return Err(RecipientError::InvalidTopic {
            topic: topic.to_string(),
        });
    }

    Ok(topic.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(domain: &str, prefix: &str) -> TopicPolicy {
        TopicPolicy {
            domain: domain.into(),
            prefix: prefix.into(),
        }
    }

    fn accept_all(_: &str) -> bool {
        true
    }

    #[test]
    fn prefix_is_stripped_from_topic() {
        let topic = resolve("ntfy-mytopic@ntfy.sh", &policy("ntfy.sh", "ntfy-"), accept_all);
        assert_eq!(topic.unwrap(), "mytopic");
    }

    #[test]
    fn empty_prefix_takes_local_part_verbatim() {
        let topic = resolve("mytopic@ntfy.sh", &policy("ntfy.sh", ""), accept_all);
        assert_eq!(topic.unwrap(), "mytopic");
    }

    #[test]
    fn empty_prefix_keeps_unstripped_local_part() {
        // Under an empty prefix nothing is stripped; the whole local part
        // is the topic, distinct from "mytopic".
        let topic = resolve("ntfy-mytopic@ntfy.sh", &policy("ntfy.sh", ""), accept_all);
        assert_eq!(topic.unwrap(), "ntfy-mytopic");
    }

    #[test]
    fn domain_match_is_case_insensitive() {
        let topic = resolve("mytopic@NTFY.SH", &policy("ntfy.sh", ""), accept_all);
        assert_eq!(topic.unwrap(), "mytopic");
    }

    #[test]
    fn wrong_domain_is_rejected() {
        let err = resolve("mytopic@other.org", &policy("ntfy.sh", ""), accept_all);
        assert!(matches!(err, Err(RecipientError::DomainMismatch { .. })));
    }

    #[test]
    fn missing_prefix_is_rejected() {
        let err = resolve("mytopic@ntfy.sh", &policy("ntfy.sh", "ntfy-"), accept_all);
        assert!(matches!(err, Err(RecipientError::PrefixMismatch { .. })));
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let err = resolve("NTFY-mytopic@ntfy.sh", &policy("ntfy.sh", "ntfy-"), accept_all);
        assert!(matches!(err, Err(RecipientError::PrefixMismatch { .. })));
    }

    #[test]
    fn empty_topic_is_rejected() {
        let err = resolve("ntfy-@ntfy.sh", &policy("ntfy.sh", "ntfy-"), accept_all);
        assert!(matches!(err, Err(RecipientError::InvalidTopic { .. })));
    }

    #[test]
    fn sink_validation_is_consulted() {
        let err = resolve("mytopic@ntfy.sh", &policy("ntfy.sh", ""), |_| false);
        assert!(matches!(err, Err(RecipientError::InvalidTopic { .. })));
    }

    #[test]
    fn address_without_at_sign_is_rejected() {
        let err = resolve("not-an-address", &policy("ntfy.sh", ""), accept_all);
        assert!(matches!(err, Err(RecipientError::MalformedAddress(_))));
    }
}
