//! RFC 822 / MIME serialization of outgoing mail

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::path::Path;

/// Base64 line length for attachment parts
const BASE64_LINE_WIDTH: usize = 76;

/// A file attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl OutgoingAttachment {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk, guessing its content type from the extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            filename,
            mime_type,
            data,
        })
    }
}

/// Everything needed to serialize one message. Empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

/// How a message reaches Gmail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    /// `messages.send`
    Direct,
    /// `drafts.create` followed by `drafts.send`
    DraftThenSend,
}

impl SendPath {
    pub fn use_draft(&self) -> bool {
        matches!(self, SendPath::DraftThenSend)
    }
}

/// Transport-ready message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// URL-safe base64 of the full RFC 822 text, unpadded
    pub raw: String,
    pub has_attachments: bool,
}

impl EncodedMessage {
    /// Messages with attachments go through a draft first
    pub fn send_path(&self) -> SendPath {
        if self.has_attachments {
            SendPath::DraftThenSend
        } else {
            SendPath::Direct
        }
    }
}

/// Serialize and encode `message` for `messages.send` / `drafts.create`
pub fn build_mime_message(message: &OutgoingMessage) -> EncodedMessage {
    let boundary = format!("mixed_{}", uuid::Uuid::new_v4().as_simple());
    let rfc822 = render_mime_message(message, &boundary);
    EncodedMessage {
        raw: URL_SAFE_NO_PAD.encode(rfc822.as_bytes()),
        has_attachments: !message.attachments.is_empty(),
    }
}

/// RFC 822 text of `message`, CRLF line endings. `boundary` is only used
/// when there are attachments.
pub fn render_mime_message(message: &OutgoingMessage, boundary: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    let mut push_header = |name: &str, value: &str| {
        let value = header_value(value);
        if !value.is_empty() {
            lines.push(format!("{}: {}", name, value));
        }
    };
    push_header("To", &message.to);
    push_header("Cc", &message.cc);
    push_header("Bcc", &message.bcc);
    push_header("From", &message.from);
    push_header("Subject", &encode_subject(&header_value(&message.subject)));
    push_header("MIME-Version", "1.0");
    push_header("In-Reply-To", message.in_reply_to.as_deref().unwrap_or(""));
    push_header("References", message.references.as_deref().unwrap_or(""));

    let text_headers = [
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        format!("Content-Transfer-Encoding: {}", transfer_encoding(&message.body)),
    ];

    if message.attachments.is_empty() {
        lines.extend(text_headers);
        lines.push(String::new());
        lines.push(message.body.clone());
        return lines.join("\r\n");
    }

    lines.push(format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"",
        boundary
    ));
    lines.push(String::new());
    lines.push(format!("--{}", boundary));
    lines.extend(text_headers);
    lines.push(String::new());
    lines.push(message.body.clone());
    lines.push(String::new());

    for attachment in &message.attachments {
        let filename = quoted_param(&attachment.filename);
        let mime_type = match attachment.mime_type.trim() {
            "" => "application/octet-stream",
            t => t,
        };
        lines.push(format!("--{}", boundary));
        lines.push(format!("Content-Type: {}; name=\"{}\"", mime_type, filename));
        lines.push(format!(
            "Content-Disposition: attachment; filename=\"{}\"",
            filename
        ));
        lines.push("Content-Transfer-Encoding: base64".to_string());
        lines.push(String::new());
        lines.push(wrap_base64(&STANDARD.encode(&attachment.data)));
        lines.push(String::new());
    }

    lines.push(format!("--{}--", boundary));
    lines.join("\r\n")
}

/// Header values are single-line
fn header_value(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// RFC 2047 encoded word for non-ASCII subjects
fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        subject.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}

fn quoted_param(value: &str) -> String {
    header_value(value).replace('\\', "\\\\").replace('"', "\\\"")
}

fn transfer_encoding(body: &str) -> &'static str {
    if body.is_ascii() { "7bit" } else { "8bit" }
}

/// Split base64 text into CRLF-separated lines of 76 characters
pub fn wrap_base64(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(BASE64_LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{GmailMessage, Header, MessagePart, PartBody};
    use crate::gmail::decode_message;
    use crate::models::Message;

    fn decode_raw(raw: &str) -> String {
        String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap()
    }

    fn plain() -> OutgoingMessage {
        OutgoingMessage {
            to: "dana@realty.example".to_string(),
            from: "agent@example.com".to_string(),
            subject: "Re: Showing".to_string(),
            body: "See you at 10.".to_string(),
            in_reply_to: Some("<m1@realty.example>".to_string()),
            references: Some("<root@realty.example> <m1@realty.example>".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_message_layout() {
        let encoded = build_mime_message(&plain());
        assert!(!encoded.has_attachments);
        assert_eq!(encoded.send_path(), SendPath::Direct);
        assert!(!encoded.raw.contains('='));
        assert!(!encoded.raw.contains('+'));
        assert!(!encoded.raw.contains('/'));

        assert_eq!(
            decode_raw(&encoded.raw),
            "To: dana@realty.example\r\n\
             From: agent@example.com\r\n\
             Subject: Re: Showing\r\n\
             MIME-Version: 1.0\r\n\
             In-Reply-To: <m1@realty.example>\r\n\
             References: <root@realty.example> <m1@realty.example>\r\n\
             Content-Type: text/plain; charset=\"UTF-8\"\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             See you at 10."
        );
    }

    #[test]
    fn test_multipart_with_attachment() {
        let mut message = plain();
        message.attachments.push(OutgoingAttachment::new(
            "disclosure.pdf",
            "application/pdf",
            vec![7u8; 100],
        ));

        let encoded = build_mime_message(&message);
        assert!(encoded.has_attachments);
        assert_eq!(encoded.send_path(), SendPath::DraftThenSend);

        let text = render_mime_message(&message, "mixed_test");
        assert!(text.contains("Content-Type: multipart/mixed; boundary=\"mixed_test\"\r\n\r\n--mixed_test\r\n"));
        assert!(text.contains("Content-Type: application/pdf; name=\"disclosure.pdf\"\r\n"));
        assert!(text.contains("Content-Disposition: attachment; filename=\"disclosure.pdf\"\r\n"));
        assert!(text.ends_with("\r\n--mixed_test--"));

        let b64_lines: Vec<&str> = text
            .split("Content-Transfer-Encoding: base64\r\n\r\n")
            .nth(1)
            .unwrap()
            .split("\r\n")
            .take_while(|l| !l.is_empty())
            .collect();
        assert_eq!(b64_lines[0].len(), 76);
        assert!(b64_lines.iter().all(|l| l.len() <= 76));
        assert_eq!(STANDARD.decode(b64_lines.concat()).unwrap(), vec![7u8; 100]);
    }

    #[test]
    fn test_empty_headers_are_omitted() {
        let message = OutgoingMessage {
            to: "a@x.com".to_string(),
            body: "hi".to_string(),
            ..Default::default()
        };
        let text = render_mime_message(&message, "b");
        assert!(!text.contains("Cc:"));
        assert!(!text.contains("Subject:"));
        assert!(!text.contains("In-Reply-To:"));
        assert!(text.starts_with("To: a@x.com\r\nMIME-Version: 1.0\r\n"));
    }

    #[test]
    fn test_non_ascii_subject_and_body() {
        let message = OutgoingMessage {
            to: "a@x.com".to_string(),
            subject: "Café offer".to_string(),
            body: "Prix: 500 000 €".to_string(),
            ..Default::default()
        };
        let text = render_mime_message(&message, "b");
        assert!(text.contains("Subject: =?UTF-8?B?Q2Fmw6kgb2ZmZXI=?=\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: 8bit\r\n"));
        assert!(text.ends_with("\r\n\r\nPrix: 500 000 €"));
    }

    #[test]
    fn test_header_injection_is_flattened() {
        let message = OutgoingMessage {
            to: "a@x.com\r\nBcc: evil@x.com".to_string(),
            ..Default::default()
        };
        let text = render_mime_message(&message, "b");
        assert!(text.starts_with("To: a@x.com Bcc: evil@x.com\r\n"));
    }

    #[test]
    fn test_attachment_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("Offer.PDF", "application/pdf"),
            ("front-porch.webp", "image/webp"),
            ("walkthrough.mp4", "video/mp4"),
            ("floorplan.svg", "image/svg+xml"),
            ("listing.zzq", "application/octet-stream"),
            ("noext", "application/octet-stream"),
        ];
        for (name, expected) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();

            let attachment = OutgoingAttachment::from_path(&path).unwrap();
            assert_eq!(attachment.mime_type, expected, "{}", name);
            assert_eq!(attachment.filename, name);
            assert_eq!(attachment.data, name.as_bytes());
        }
    }

    #[test]
    fn test_missing_attachment_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OutgoingAttachment::from_path(&dir.path().join("gone.pdf")).is_err());
    }

    /// Gmail-style part tree for rendered RFC 822 text. Attachment parts get a
    /// synthetic id and no inline data, as `threads.get` returns them.
    fn parse_part(text: &str, next_id: &mut usize) -> MessagePart {
        let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text, ""));
        let headers: Vec<Header> = head
            .split("\r\n")
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| Header {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        let value = |name: &str| {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };
        let param = |header: &str, key: &str| {
            header
                .split(';')
                .find_map(|p| p.trim().strip_prefix(key))
                .map(|v| v.trim_matches('"').to_string())
        };

        let content_type = value("Content-Type");
        let mut part = MessagePart {
            mime_type: content_type.split(';').next().map(|t| t.trim().to_string()),
            headers: headers.clone(),
            ..Default::default()
        };

        if let Some(boundary) = param(&content_type, "boundary=") {
            let delimiter = format!("--{}", boundary);
            part.parts = body
                .split(delimiter.as_str())
                .skip(1)
                .filter(|chunk| !chunk.starts_with("--"))
                .map(|chunk| {
                    let chunk = chunk.strip_prefix("\r\n").unwrap_or(chunk);
                    // The CRLF before a delimiter belongs to the delimiter
                    let chunk = chunk.strip_suffix("\r\n").unwrap_or(chunk);
                    parse_part(chunk, &mut *next_id)
                })
                .collect();
        } else if let Some(filename) = param(&value("Content-Disposition"), "filename=") {
            *next_id += 1;
            let data = STANDARD.decode(body.replace("\r\n", "")).unwrap();
            part.filename = Some(filename);
            part.body = Some(PartBody {
                size: Some(data.len() as u64),
                data: None,
                attachment_id: Some(format!("att-{}", next_id)),
            });
        } else {
            part.body = Some(PartBody {
                size: Some(body.len() as u64),
                data: Some(URL_SAFE_NO_PAD.encode(body.as_bytes())),
                attachment_id: None,
            });
        }
        part
    }

    fn reread(message: &OutgoingMessage) -> Message {
        let encoded = build_mime_message(message);
        let rfc822 = decode_raw(&encoded.raw);
        let raw = GmailMessage {
            id: "sent-1".to_string(),
            payload: Some(parse_part(&rfc822, &mut 0)),
            ..Default::default()
        };
        decode_message(&raw, "t-1")
    }

    #[test]
    fn test_plain_message_reads_back() {
        let message = plain();
        let decoded = reread(&message);

        assert_eq!(decoded.body.text, message.body);
        assert!(decoded.body.html.is_empty());
        assert!(decoded.attachments.is_empty());
        assert_eq!(decoded.subject, message.subject);
        assert_eq!(decoded.to, message.to);
        assert_eq!(decoded.references, "<root@realty.example> <m1@realty.example>");
    }

    #[test]
    fn test_multiline_non_ascii_body_reads_back() {
        let message = OutgoingMessage {
            to: "a@x.com".to_string(),
            subject: "Counter offer".to_string(),
            body: "Prix: 500 000 €\r\n\r\n> On Tue, Dana wrote:\r\n> 480 000".to_string(),
            ..Default::default()
        };
        let decoded = reread(&message);

        assert_eq!(decoded.body.text, message.body);
        assert!(decoded.attachments.is_empty());
    }

    #[test]
    fn test_message_with_attachments_reads_back() {
        let mut message = plain();
        message.attachments.push(OutgoingAttachment::new(
            "disclosure.pdf",
            "application/pdf",
            vec![7u8; 100],
        ));
        message.attachments.push(OutgoingAttachment::new(
            "front porch.webp",
            "image/webp",
            vec![1, 2, 3],
        ));
        let decoded = reread(&message);

        assert_eq!(decoded.body.text.trim_end(), message.body);
        let names: Vec<(&str, &str, u64)> = decoded
            .attachments
            .iter()
            .map(|a| (a.filename.as_str(), a.mime_type.as_str(), a.size))
            .collect();
        assert_eq!(
            names,
            vec![
                ("disclosure.pdf", "application/pdf", 100),
                ("front porch.webp", "image/webp", 3),
            ]
        );
    }
}
