use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::errors::ApiError;

/// Parse an `application/x-www-form-urlencoded` body.
///
/// Same shape as query parsing, plus `+` means space in form bodies.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let raw = String::from_utf8_lossy(body);
    let mut fields = HashMap::new();

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.find('=') {
            Some(idx) => (&pair[..idx], &pair[idx + 1..]),
            None => (pair, ""),
        };
        let value = value.replace('+', " ");
        let decoded = urlencoding::decode(&value)
            .map(|v| v.to_string())
            .unwrap_or(value);
        let key = urlencoding::decode(key)
            .map(|k| k.to_string())
            .unwrap_or_else(|_| key.to_string());
        fields.insert(key, decoded);
    }

    fields
}

/// One part of a `multipart/form-data` body.
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A parsed form post, either urlencoded or multipart.
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<FormPart>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First file part with the given field name that actually has content.
    pub fn file(&self, name: &str) -> Option<&FormPart> {
        self.files
            .iter()
            .find(|p| p.name == name && p.filename.as_deref().map(|f| !f.is_empty()).unwrap_or(false) && !p.data.is_empty())
    }
}

/// Parse a form post body based on its Content-Type header.
pub fn parse_form_data(content_type: Option<&str>, body: &[u8]) -> Result<FormData, ApiError> {
    let content_type = content_type.unwrap_or("");
    if let Some(boundary) = multipart_boundary(content_type) {
        parse_multipart(&boundary, body)
    } else {
        Ok(FormData {
            fields: parse_form(body),
            files: Vec::new(),
        })
    }
}

fn boundary_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"boundary="?([^";]+)"?"#).expect("Regex should compile")
    })
}

fn disposition_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\bname="([^"]*)"(?:;\s*filename="([^"]*)")?"#)
            .expect("Regex should compile")
    })
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }
    boundary_regex()
        .captures(content_type)
        .map(|c| c[1].to_string())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_multipart(boundary: &str, body: &[u8]) -> Result<FormData, ApiError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    let mut pos = find_subsequence(body, &delimiter)
        .ok_or_else(|| ApiError::BadRequest("Malformed multipart body".to_string()))?
        + delimiter.len();

    loop {
        // Terminal delimiter is "--boundary--"
        if body[pos..].starts_with(b"--") {
            break;
        }
        // Skip the CRLF after the delimiter
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        }

        let rest = &body[pos..];
        let header_end = find_subsequence(rest, b"\r\n\r\n")
            .ok_or_else(|| ApiError::BadRequest("Malformed multipart part".to_string()))?;
        let headers = String::from_utf8_lossy(&rest[..header_end]);

        let mut name = String::new();
        let mut filename = None;
        let mut content_type = None;
        for line in headers.lines() {
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("content-disposition:") {
                if let Some(caps) = disposition_regex().captures(line) {
                    name = caps[1].to_string();
                    filename = caps.get(2).map(|m| m.as_str().to_string());
                }
            } else if lower.starts_with("content-type:") {
                content_type = Some(line[13..].trim().to_string());
            }
        }

        let data_start = header_end + 4;
        let data_end = find_subsequence(&rest[data_start..], &delimiter)
            .ok_or_else(|| ApiError::BadRequest("Unterminated multipart part".to_string()))?;
        // Part data ends with CRLF before the next delimiter
        let mut data = &rest[data_start..data_start + data_end];
        if data.ends_with(b"\r\n") {
            data = &data[..data.len() - 2];
        }

        if filename.is_some() {
            files.push(FormPart {
                name,
                filename,
                content_type,
                data: data.to_vec(),
            });
        } else {
            fields.insert(name, String::from_utf8_lossy(data).to_string());
        }

        pos += data_start + data_end + delimiter.len();
    }

    Ok(FormData { fields, files })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoded_form() {
        let fields = parse_form(b"username=alice&content=hello+world%21&empty=");
        assert_eq!(fields.get("username").map(String::as_str), Some("alice"));
        assert_eq!(fields.get("content").map(String::as_str), Some("hello world!"));
        assert_eq!(fields.get("empty").map(String::as_str), Some(""));
    }

    fn multipart_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"--XBOUND\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"content\"\r\n\r\n");
        body.extend_from_slice(b"a post with a picture\r\n");
        body.extend_from_slice(b"--XBOUND\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"pic.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
        body.extend_from_slice(b"\r\n--XBOUND--\r\n");
        body
    }

    #[test]
    fn multipart_fields_and_files() {
        let form = parse_form_data(
            Some("multipart/form-data; boundary=XBOUND"),
            &multipart_body(),
        )
        .unwrap();

        assert_eq!(form.field("content"), Some("a post with a picture"));
        let file = form.file("image").expect("file part");
        assert_eq!(file.filename.as_deref(), Some("pic.png"));
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(file.data, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
    }

    #[test]
    fn empty_file_part_is_ignored_by_file() {
        let mut body = Vec::new();
        body.extend_from_slice(b"--B\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\r\n",
        );
        body.extend_from_slice(b"\r\n--B--\r\n");
        let form =
            parse_form_data(Some("multipart/form-data; boundary=B"), &body).unwrap();
        assert!(form.file("image").is_none());
    }

    #[test]
    fn urlencoded_when_no_boundary() {
        let form = parse_form_data(
            Some("application/x-www-form-urlencoded"),
            b"username=bob&password=pw",
        )
        .unwrap();
        assert_eq!(form.field("username"), Some("bob"));
        assert!(form.files.is_empty());
    }

    #[test]
    fn malformed_multipart_is_rejected() {
        let err = parse_form_data(Some("multipart/form-data; boundary=B"), b"garbage");
        assert!(err.is_err());
    }
}
