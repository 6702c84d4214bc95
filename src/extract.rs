//! Body extraction — selects the best human-readable text from a parsed
//! email.
//!
//! Supported shapes: `text/plain` messages, `multipart/alternative`
//! messages, and `multipart/mixed` wrappers around either. Anything else
//! is a hard rejection — no partial delivery.

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};

use crate::error::DataError;

/// Well-formed MIME has no cycles; this bounds the walk anyway.
const MAX_MULTIPART_DEPTH: usize = 8;

/// Extract readable text from a parsed email.
///
/// For multipart messages the first `text/plain` sub-part in document
/// order always wins, even when empty; the first `text/html` sub-part is
/// only used (markup stripped) when no plain-text alternative exists at
/// all. An empty result is a valid outcome, handled by the title/body
/// normalization step.
pub fn extract<'a>(message: &'a Message<'a>) -> Result<String, DataError> {
    let root = message.parts.first().ok_or(DataError::Parse)?;
    match media_type(root) {
        (t, s) if t == "text" && s == "plain" => Ok(part_text(root)),
        (t, s) if is_supported_multipart(&t, &s) => {
            let mut html = None;
            if let Some(plain) = find_plain_part(message, root, 0, &mut html) {
                return Ok(part_text(plain));
            }
            match html {
                Some(part) => Ok(strip_html(&part_text(part))),
                None => Err(DataError::UnsupportedContentType(format!("{t}/{s}"))),
            }
        }
        (t, s) => Err(DataError::UnsupportedContentType(format!("{t}/{s}"))),
    }
}

fn is_supported_multipart(ctype: &str, subtype: &str) -> bool {
    ctype == "multipart" && (subtype == "alternative" || subtype == "mixed")
}

/// Declared media type of a part, lowercased. A missing Content-Type
/// header defaults to text/plain per RFC 2045.
fn media_type(part: &MessagePart<'_>) -> (String, String) {
    match part.content_type() {
        Some(ct) => (
            ct.ctype().to_ascii_lowercase(),
            ct.subtype().unwrap_or("plain").to_ascii_lowercase(),
        ),
        None => ("text".to_string(), "plain".to_string()),
    }
}

/// Charset-decoded content of a text part.
fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        _ => String::new(),
    }
}

/// Depth-first walk in document order. Returns the first `text/plain`
/// part found; records the first `text/html` part in `html` as the
/// fallback.
fn find_plain_part<'a>(
    message: &'a Message<'a>,
    part: &'a MessagePart<'a>,
    depth: usize,
    html: &mut Option<&'a MessagePart<'a>>,
) -> Option<&'a MessagePart<'a>> {
    if depth >= MAX_MULTIPART_DEPTH {
        return None;
    }
    let PartType::Multipart(children) = &part.body else {
        return None;
    };
    for id in children {
        let Some(child) = message.part(*id) else {
            continue;
        };
        match media_type(child) {
            (t, s) if t == "text" && s == "plain" => return Some(child),
            (t, s) if t == "text" && s == "html" => {
                if html.is_none() {
                    *html = Some(child);
                }
            }
            (t, s) if is_supported_multipart(&t, &s) => {
                if let Some(found) = find_plain_part(message, child, depth + 1, html) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

/// Recover visible text from HTML: tags removed, character entities
/// decoded, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the common named entities plus numeric references.
/// Unrecognized sequences pass through unchanged.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        // Entity names are short; ';' is ASCII so the byte position is
        // a valid char boundary.
        let end = rest.bytes().take(12).position(|b| b == b';');
        match end.and_then(|end| decode_entity(&rest[1..end]).map(|ch| (ch, end))) {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = if let Some(hex) = num.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                num.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
