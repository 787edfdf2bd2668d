//! Decoding Gmail message resources into [`Message`]
//!
//! Nothing here fails. Malformed base64, invalid UTF-8 and unparseable dates
//! all degrade to empty or best-effort values, logged at debug level.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};

use super::api::{GmailMessage, Header, MessagePart};
use crate::models::{Attachment, Message, MessageBody, MessageId, ThreadId};

/// URL-safe alphabet that tolerates missing, present or partial padding
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode Gmail's base64url, accepting the standard alphabet and stray
/// padding or whitespace. Returns an empty vector if nothing can be salvaged.
pub fn decode_base64url(data: &str) -> Vec<u8> {
    let mut cleaned: String = data
        .chars()
        .filter_map(|c| match c {
            '+' => Some('-'),
            '/' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    // A lone trailing sextet cannot encode a byte
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    match LENIENT_URL_SAFE.decode(cleaned.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Undecodable base64 body ({} chars): {}", data.len(), e);
            Vec::new()
        }
    }
}

/// Decode the `data` field of an attachment response
pub fn decode_attachment_data(data: &str) -> Vec<u8> {
    decode_base64url(data)
}

/// UTF-8, falling back to a byte-per-char (Latin-1) mapping
fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::debug!("Body is not valid UTF-8; decoding as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

fn decode_body_text(data: &str) -> String {
    bytes_to_text(decode_base64url(data))
}

/// Case-insensitive header lookup; missing headers are empty
fn header<'a>(headers: &'a [Header], name: &str) -> &'a str {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

/// Parse an RFC 2822 `Date` header, ignoring a trailing `(Zone)` comment
fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let value = match value.rfind('(') {
        Some(idx) if value.ends_with(')') => value[..idx].trim_end(),
        _ => value,
    };
    DateTime::parse_from_rfc2822(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| log::debug!("Unparseable Date header {:?}: {}", value, e))
        .ok()
}

/// Decode common HTML entities (Gmail snippets are HTML-escaped)
pub(crate) fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
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

#[derive(Default)]
struct PartWalk {
    html: String,
    text: String,
    attachments: Vec<Attachment>,
}

impl PartWalk {
    fn visit(&mut self, part: &MessagePart) {
        let mime_type = part.mime_type.as_deref().unwrap_or("");
        let filename = part.filename.as_deref().unwrap_or("");

        if let Some(body) = &part.body {
            if !filename.is_empty()
                && let Some(attachment_id) = body.attachment_id.as_deref().filter(|id| !id.is_empty())
            {
                self.attachments.push(Attachment {
                    filename: filename.to_string(),
                    mime_type: mime_type.to_string(),
                    size: body.size.unwrap_or(0),
                    attachment_id: attachment_id.to_string(),
                });
            }

            if let Some(data) = body.data.as_deref().filter(|d| !d.is_empty()) {
                if mime_type.eq_ignore_ascii_case("text/html") {
                    self.html.push_str(&decode_body_text(data));
                } else if mime_type.eq_ignore_ascii_case("text/plain")
                    || (mime_type.is_empty() && filename.is_empty())
                {
                    self.text.push_str(&decode_body_text(data));
                }
            }
        }

        for child in &part.parts {
            self.visit(child);
        }
    }
}

/// Decode one Gmail message.
///
/// `thread_id` is used when the message itself does not carry one.
pub fn decode_message(raw: &GmailMessage, thread_id: &str) -> Message {
    let empty = MessagePart::default();
    let payload = raw.payload.as_ref().unwrap_or(&empty);
    let headers = payload.headers.as_slice();

    let mut walk = PartWalk::default();
    walk.visit(payload);

    if walk.html.is_empty()
        && walk.text.is_empty()
        && let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref())
        && !data.is_empty()
    {
        let decoded = decode_body_text(data);
        let top_level_type = payload.mime_type.as_deref().unwrap_or("");
        if top_level_type.to_ascii_lowercase().contains("html") {
            walk.html = decoded;
        } else {
            walk.text = decoded;
        }
    }

    let header_date = parse_date_header(header(headers, "Date"));
    let provider_millis = raw
        .internal_date
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&ms| ms > 0);
    let (internal_date, date) = match provider_millis {
        Some(ms) => (ms, DateTime::from_timestamp_millis(ms).or(header_date)),
        None => (header_date.map_or(0, |d| d.timestamp_millis()), header_date),
    };

    let thread_id = raw
        .thread_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(thread_id);

    Message::builder(MessageId::new(raw.id.clone()), ThreadId::new(thread_id))
        .subject(header(headers, "Subject"))
        .from(header(headers, "From"))
        .to(header(headers, "To"))
        .cc(header(headers, "Cc"))
        .bcc(header(headers, "Bcc"))
        .reply_to(header(headers, "Reply-To"))
        .internal_date(internal_date)
        .date(date)
        .snippet(unescape_html(raw.snippet.as_deref().unwrap_or("")))
        .label_ids(raw.label_ids.iter().cloned())
        .body(MessageBody {
            html: walk.html,
            text: walk.text,
        })
        .attachments(walk.attachments)
        .message_id(header(headers, "Message-ID"))
        .references(header(headers, "References"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::PartBody;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn h(name: &str, value: &str) -> Header {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn inline(mime_type: &str, data: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(PartBody {
                size: Some(data.len() as u64),
                data: Some(data.to_string()),
                attachment_id: None,
            }),
            ..Default::default()
        }
    }

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn message(payload: MessagePart) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            thread_id: Some("t1".to_string()),
            label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
            snippet: Some("Hi &amp; welcome, it&#39;s here".to_string()),
            internal_date: Some("1700000000000".to_string()),
            payload: Some(payload),
        }
    }

    #[test]
    fn test_base64_variants() {
        assert_eq!(decode_base64url("SGVsbG8"), b"Hello");
        assert_eq!(decode_base64url("SGVsbG8="), b"Hello");
        assert_eq!(decode_base64url("SGVs\nbG8=="), b"Hello");
        // standard alphabet: 0xfb 0xff
        assert_eq!(decode_base64url("+/8"), vec![0xfb, 0xff]);
        assert_eq!(decode_base64url("-_8"), vec![0xfb, 0xff]);
        assert!(decode_base64url("").is_empty());
    }

    #[test]
    fn test_latin1_fallback() {
        // "caf\xe9" is not UTF-8
        let data = URL_SAFE_NO_PAD.encode([b'c', b'a', b'f', 0xe9]);
        assert_eq!(decode_body_text(&data), "café");
    }

    #[test]
    fn test_multipart_alternative_with_attachment() {
        let mut pdf = MessagePart {
            mime_type: Some("application/pdf".to_string()),
            filename: Some("offer.pdf".to_string()),
            body: Some(PartBody {
                size: Some(2048),
                data: None,
                attachment_id: Some("ANGjdJ_1".to_string()),
            }),
            ..Default::default()
        };
        pdf.headers.push(h("Content-Disposition", "attachment"));

        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            headers: vec![
                h("subject", "Offer on 12 Elm St"),
                h("FROM", "Dana Broker <dana@realty.example>"),
                h("To", "agent@example.com"),
                h("Message-ID", "<abc@mail.example>"),
                h("References", "<root@mail.example>"),
            ],
            parts: vec![
                MessagePart {
                    mime_type: Some("multipart/alternative".to_string()),
                    parts: vec![
                        inline("text/plain", &encode("Plain body")),
                        inline("text/html", &encode("<p>Html body</p>")),
                    ],
                    ..Default::default()
                },
                pdf,
            ],
            ..Default::default()
        };

        let msg = decode_message(&message(payload), "fallback");
        assert_eq!(msg.subject, "Offer on 12 Elm St");
        assert_eq!(msg.from, "Dana Broker <dana@realty.example>");
        assert_eq!(msg.cc, "");
        assert_eq!(msg.reply_to, "");
        assert_eq!(msg.body.text, "Plain body");
        assert_eq!(msg.body.html, "<p>Html body</p>");
        assert_eq!(msg.message_id, "<abc@mail.example>");
        assert_eq!(msg.references, "<root@mail.example>");
        assert_eq!(msg.thread_id.as_str(), "t1");
        assert_eq!(msg.snippet, "Hi & welcome, it's here");
        assert!(msg.has_label("UNREAD"));

        assert_eq!(msg.attachments.len(), 1);
        let att = &msg.attachments[0];
        assert_eq!(att.filename, "offer.pdf");
        assert_eq!(att.mime_type, "application/pdf");
        assert_eq!(att.size, 2048);
        assert_eq!(att.attachment_id, "ANGjdJ_1");
    }

    #[test]
    fn test_same_type_parts_concatenate_in_order() {
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: vec![
                inline("text/plain", &encode("first ")),
                inline("text/plain", &encode("second")),
            ],
            ..Default::default()
        };
        assert_eq!(decode_message(&message(payload), "t").body.text, "first second");
    }

    #[test]
    fn test_top_level_body_fallback_uses_payload_type() {
        let mut payload = inline("Text/HTML; charset=utf-8", &encode("<b>hi</b>"));
        payload.parts.clear();
        let msg = decode_message(&message(payload), "t");
        assert_eq!(msg.body.html, "<b>hi</b>");
        assert_eq!(msg.body.text, "");
    }

    #[test]
    fn test_untyped_inline_part_is_text() {
        let mut part = inline("", &encode("untyped"));
        part.mime_type = None;
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: vec![part],
            ..Default::default()
        };
        assert_eq!(decode_message(&message(payload), "t").body.text, "untyped");
    }

    #[test]
    fn test_malformed_padding_does_not_fail() {
        let pdf = MessagePart {
            mime_type: Some("application/pdf".to_string()),
            filename: Some("a.pdf".to_string()),
            body: Some(PartBody {
                size: Some(10),
                data: None,
                attachment_id: Some("att-1".to_string()),
            }),
            ..Default::default()
        };
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: vec![inline("text/plain", "SGVsbG8==="), inline("text/plain", "A"), pdf],
            ..Default::default()
        };

        let msg = decode_message(&message(payload), "t");
        assert_eq!(msg.body.text, "Hello");
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].attachment_id, "att-1");
    }

    #[test]
    fn test_timestamp_resolution() {
        let dated = |internal: Option<&str>, date: &str| {
            let mut raw = message(MessagePart {
                headers: vec![h("Date", date)],
                ..Default::default()
            });
            raw.internal_date = internal.map(str::to_string);
            decode_message(&raw, "t")
        };

        let from_provider = dated(Some("1700000000000"), "Mon, 1 Jan 2024 10:00:00 +0000");
        assert_eq!(from_provider.internal_date, 1_700_000_000_000);

        let from_header = dated(None, "Mon, 1 Jan 2024 10:00:00 +0000 (UTC)");
        assert_eq!(from_header.internal_date, 1_704_103_200_000);
        assert!(from_header.date.is_some());

        let neither = dated(Some("not-a-number"), "garbage");
        assert_eq!(neither.internal_date, 0);
        assert!(neither.date.is_none());
    }

    #[test]
    fn test_missing_payload_yields_empty_message() {
        let raw = GmailMessage {
            id: "m9".to_string(),
            ..Default::default()
        };
        let msg = decode_message(&raw, "t9");
        assert_eq!(msg.thread_id.as_str(), "t9");
        assert!(msg.body.is_empty());
        assert!(msg.attachments.is_empty());
        assert_eq!(msg.subject, "");
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &lt;b&gt; &#x41;&#66; &bogus; &"), "a <b> AB &bogus; &");
    }
}
