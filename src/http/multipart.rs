//! `multipart/form-data` bodies (RFC 7578).
//!
//! [`Form`] builds a request body; [`parse_form_data`] reads the text
//! fields back out of a response.

use crate::base::neterror::NetError;
use bytes::Bytes;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

/// A multipart form.
#[derive(Debug, Clone)]
pub struct Form {
    boundary: String,
    fields: Vec<(String, Part)>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: generate_boundary(),
            fields: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Add a text field.
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(name, Part::text(value))
    }

    pub fn part(mut self, name: impl Into<String>, part: Part) -> Self {
        self.fields.push((name.into(), part));
        self
    }

    /// Append in place. Repeated names produce repeated parts.
    pub fn append(&mut self, name: impl Into<String>, part: Part) {
        self.fields.push((name.into(), part));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `Content-Type` header value carrying this form's boundary.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Serialize the form. An empty form still gets its closing delimiter.
    pub fn to_body(&self) -> Bytes {
        let mut output = Vec::new();

        for (name, part) in &self.fields {
            output.extend_from_slice(b"--");
            output.extend_from_slice(self.boundary.as_bytes());
            output.extend_from_slice(b"\r\n");

            output.extend_from_slice(part.format_headers(name).as_bytes());
            output.extend_from_slice(b"\r\n\r\n");

            output.extend_from_slice(&part.data);
            output.extend_from_slice(b"\r\n");
        }

        output.extend_from_slice(b"--");
        output.extend_from_slice(self.boundary.as_bytes());
        output.extend_from_slice(b"--\r\n");

        Bytes::from(output)
    }
}

/// One part of a multipart form.
///
/// Text parts carry no `Content-Type`; binary parts default to
/// `application/octet-stream` once they are given a file name.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(value.into()),
            content_type: None,
            file_name: None,
        }
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn format_headers(&self, name: &str) -> String {
        let mut header = format!(
            "Content-Disposition: form-data; name=\"{}\"",
            escape_quotes(name)
        );

        if let Some(ref filename) = self.file_name {
            header.push_str(&format!("; filename=\"{}\"", escape_quotes(filename)));
        }

        match (&self.content_type, &self.file_name) {
            (Some(mime), _) => header.push_str(&format!("\r\nContent-Type: {}", mime)),
            (None, Some(_)) => header.push_str("\r\nContent-Type: application/octet-stream"),
            (None, None) => {}
        }

        header
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!(
        "----syncnet-boundary-{:016x}{:08x}{:04x}",
        nanos,
        std::process::id(),
        seq & 0xffff
    )
}

/// Extract `boundary=` from a multipart `Content-Type` value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Parse a `multipart/form-data` body into `(name, value)` pairs.
///
/// Part bodies are decoded as lossy UTF-8.
pub fn parse_form_data(boundary: &str, body: &[u8]) -> Result<Vec<(String, String)>, NetError> {
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{}", boundary);
    let mut fields = Vec::new();

    let mut sections = text.split(delimiter.as_str());
    // Preamble before the first delimiter.
    sections.next();

    let mut closed = false;
    for section in sections {
        if section.starts_with("--") {
            closed = true;
            break;
        }
        let section = section.strip_prefix("\r\n").ok_or(NetError::InvalidResponse)?;
        let (head, value) = section
            .split_once("\r\n\r\n")
            .ok_or(NetError::InvalidResponse)?;
        let value = value.strip_suffix("\r\n").unwrap_or(value);

        let name = head
            .split("\r\n")
            .filter(|line| {
                line.split_once(':')
                    .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case("content-disposition"))
            })
            .find_map(disposition_name)
            .ok_or(NetError::InvalidResponse)?;

        fields.push((name, value.to_string()));
    }

    if !closed {
        return Err(NetError::InvalidResponse);
    }
    Ok(fields)
}

fn disposition_name(line: &str) -> Option<String> {
    let (_, params) = line.split_once(':')?;
    params.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        (key.trim() == "name").then(|| value.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_form_has_closing_delimiter() {
        let form = Form::new();
        let body = form.to_body();
        assert_eq!(body, Bytes::from(format!("--{}--\r\n", form.boundary())));
    }

    #[test]
    fn test_text_field_has_no_content_type() {
        let body = Form::new().text("fb_dtsg", "token").to_body();
        let body_str = String::from_utf8_lossy(&body);
        assert!(body_str.contains("name=\"fb_dtsg\"\r\n\r\ntoken\r\n"));
        assert!(!body_str.contains("Content-Type"));
    }

    #[test]
    fn test_file_part() {
        let part = Part::bytes(b"file data".as_slice()).file_name("photo.jpg");
        let body = Form::new().part("upload", part).to_body();

        let body_str = String::from_utf8_lossy(&body);
        assert!(body_str.contains("filename=\"photo.jpg\""));
        assert!(body_str.contains("Content-Type: application/octet-stream"));
        assert!(body_str.contains("file data"));
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(Form::new().boundary(), Form::new().boundary());
        assert!(Form::new().boundary().starts_with("----syncnet-boundary-"));
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes("normal"), "normal");
        assert_eq!(escape_quotes("with\"quote"), "with\\\"quote");
        assert_eq!(escape_quotes("with\\slash"), "with\\\\slash");
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc"),
            Some("abc")
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; charset=utf-8; boundary=\"x y\""),
            Some("x y")
        );
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_form_data_reads_back_form() {
        let form = Form::new()
            .text("a", "1")
            .text("b", "two\r\nlines")
            .part("c", Part::bytes(b"raw".as_slice()).file_name("c.bin"));
        let fields = parse_form_data(form.boundary(), &form.to_body()).unwrap();

        assert_eq!(
            fields,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two\r\nlines".to_string()),
                ("c".to_string(), "raw".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_form_data_rejects_unterminated() {
        let err = parse_form_data("b", b"--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1")
            .unwrap_err();
        assert_eq!(err, NetError::InvalidResponse);
    }
}
