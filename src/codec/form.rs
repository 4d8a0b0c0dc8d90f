use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::query::parse_query;
use super::request::{find_head_end, Request};
use crate::error::ParseError;

/// One decoded form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    /// Raw payload of a multipart file part
    File(Vec<u8>),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }

    /// Bytes of the value regardless of variant.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FormValue::Text(s) => s.as_bytes(),
            FormValue::File(b) => b,
        }
    }
}

pub type FormData = HashMap<String, FormValue>;

/// A part to emit with [`build_multipart`].
#[derive(Debug, Clone)]
pub struct MultipartPart<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

static DISPOSITION_PARAM: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(name|filename)\s*=\s*(?:"([^"]*)"|([^;\s]*))"#).ok()
});

/// Decode a request body according to its `Content-Type`.
///
/// urlencoded bodies reuse the query parser; multipart bodies are split on
/// their boundary. Any other (or missing) content type yields an empty map.
pub fn parse_form(request: &Request) -> Result<FormData, ParseError> {
    let body = request.body_bytes();
    if body.is_empty() {
        return Ok(FormData::new());
    }
    let content_type = request.header("Content-Type").unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => {
            let text = String::from_utf8_lossy(body);
            Ok(parse_query(&text)
                .into_iter()
                .map(|(k, v)| (k, FormValue::Text(v)))
                .collect())
        }
        "multipart/form-data" => {
            let boundary = boundary_param(content_type)
                .ok_or_else(|| ParseError::BadMultipart("missing boundary".into()))?;
            parse_multipart(body, &boundary)
        }
        other => {
            debug!(content_type = %other, "Body with unhandled content type ignored");
            Ok(FormData::new())
        }
    }
}

fn boundary_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn disposition_params(headers: &str) -> (Option<String>, Option<String>) {
    let Some(line) = headers
        .split("\r\n")
        .find(|l| l.to_ascii_lowercase().starts_with("content-disposition"))
    else {
        return (None, None);
    };
    let Some(re) = DISPOSITION_PARAM.as_ref() else {
        return (None, None);
    };
    let mut name = None;
    let mut filename = None;
    for caps in re.captures_iter(line) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string());
        match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("name") => name = value,
            Some("filename") => filename = value,
            _ => {}
        }
    }
    (name, filename)
}

/// Split a multipart/form-data body into fields.
///
/// A part with a `filename` stores the filename under the key `filename` and
/// its payload under the part's `name` as [`FormValue::File`]. Parts without
/// a usable `Content-Disposition` are skipped.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<FormData, ParseError> {
    // A delimiter only counts at the start of a line; boundary text in the
    // middle of a payload line is data.
    let delimiter = format!("\r\n--{boundary}");
    let delimiter = delimiter.as_bytes();
    let dash_boundary = &delimiter[2..];
    let mut form = FormData::new();

    let mut cursor = if body.starts_with(dash_boundary) {
        dash_boundary.len()
    } else {
        find_subslice(body, delimiter, 0)
            .ok_or_else(|| ParseError::BadMultipart(format!("boundary '{boundary}' not found")))?
            + delimiter.len()
    };

    loop {
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let Some(next) = find_subslice(body, delimiter, cursor) else {
            warn!(boundary = %boundary, "Multipart body ends without closing delimiter");
            break;
        };
        // The CRLF before `next` belongs to the delimiter, not the payload.
        let mut part = &body[cursor..next];
        part = part.strip_prefix(b"\r\n").unwrap_or(part);
        cursor = next + delimiter.len();

        let Some(split) = find_head_end(part) else {
            warn!(part_len = part.len(), "Multipart part without header block skipped");
            continue;
        };
        let headers = String::from_utf8_lossy(&part[..split - 4]);
        let payload = &part[split..];

        match disposition_params(&headers) {
            (Some(name), Some(filename)) => {
                form.insert("filename".to_string(), FormValue::Text(filename));
                form.insert(name, FormValue::File(payload.to_vec()));
            }
            (Some(name), None) => {
                let text = String::from_utf8_lossy(payload).into_owned();
                form.insert(name, FormValue::Text(text));
            }
            _ => {
                warn!("Multipart part without a field name skipped");
            }
        }
    }

    Ok(form)
}

/// Assemble a multipart/form-data body. The matching header value is
/// `multipart/form-data; boundary=<boundary>`.
pub fn build_multipart(boundary: &str, parts: &[MultipartPart<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let disposition = match part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                part.name, filename
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name),
        };
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_request_head;

    fn request_with(content_type: &str, body: &[u8]) -> Request {
        let mut raw = format!(
            "POST /form HTTP/1.1\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        parse_request_head(&raw).unwrap()
    }

    #[test]
    fn test_urlencoded_body() {
        let req = request_with("application/x-www-form-urlencoded", b"a=1&b=two+words");
        let form = parse_form(&req).unwrap();
        assert_eq!(form["a"], FormValue::Text("1".into()));
        assert_eq!(form["b"].as_text(), Some("two words"));
    }

    #[test]
    fn test_multipart_text_and_file() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"filedir\"\r\n\r\n\
/files/up\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"upfile\"; filename=\"a.bin\"\r\n\
Content-Type: application/octet-stream\r\n\r\n\
\x00\x01\r\n\x02\r\n\
--XyZ--\r\n";
        let req = request_with("multipart/form-data; boundary=XyZ", body);
        let form = parse_form(&req).unwrap();
        assert_eq!(form["filedir"].as_text(), Some("/files/up"));
        assert_eq!(form["filename"].as_text(), Some("a.bin"));
        assert_eq!(form["upfile"], FormValue::File(b"\x00\x01\r\n\x02".to_vec()));
    }

    #[test]
    fn test_multipart_quoted_boundary_and_unquoted_name() {
        let body = b"--b1\r\nContent-Disposition: form-data; name=field\r\n\r\nv\r\n--b1--";
        let req = request_with("multipart/form-data; boundary=\"b1\"", body);
        let form = parse_form(&req).unwrap();
        assert_eq!(form["field"].as_text(), Some("v"));
    }

    #[test]
    fn test_multipart_without_delimiter_is_error() {
        let req = request_with("multipart/form-data; boundary=nope", b"garbage");
        assert!(matches!(parse_form(&req), Err(ParseError::BadMultipart(_))));
    }

    #[test]
    fn test_multipart_missing_boundary_param() {
        let req = request_with("multipart/form-data", b"--x\r\n");
        assert!(matches!(parse_form(&req), Err(ParseError::BadMultipart(_))));
    }

    #[test]
    fn test_unknown_content_type_yields_empty_form() {
        let req = request_with("application/json", b"{\"a\":1}");
        assert!(parse_form(&req).unwrap().is_empty());
    }

    #[test]
    fn test_build_then_parse() {
        let parts = [
            MultipartPart { name: "note", filename: None, data: b"hi" },
            MultipartPart { name: "upfile", filename: Some("x.txt"), data: b"payload" },
        ];
        let body = build_multipart("BOUND", &parts);
        let form = parse_multipart(&body, "BOUND").unwrap();
        assert_eq!(form.len(), 3);
        assert_eq!(form["note"].as_text(), Some("hi"));
        assert_eq!(form["upfile"].as_bytes(), b"payload");
        assert_eq!(form["filename"].as_text(), Some("x.txt"));
    }

    #[test]
    fn test_boundary_text_inside_payload_is_data() {
        let parts = [
            MultipartPart { name: "filedir", filename: None, data: b"/up --BND here" },
            MultipartPart {
                name: "filecontent",
                filename: Some("a.txt"),
                data: b"see --BND inside the file\n--BND-- too",
            },
        ];
        let body = build_multipart("BND", &parts);
        let form = parse_multipart(&body, "BND").unwrap();
        assert_eq!(form["filedir"].as_text(), Some("/up --BND here"));
        assert_eq!(
            form["filecontent"].as_bytes(),
            b"see --BND inside the file\n--BND-- too"
        );
    }

    #[test]
    fn test_preamble_before_first_delimiter() {
        let body = b"ignored preamble\r\n--B\r\nContent-Disposition: form-data; name=\"k\"\r\n\r\nv\r\n--B--\r\n";
        let form = parse_multipart(body, "B").unwrap();
        assert_eq!(form["k"].as_text(), Some("v"));
    }

    #[test]
    fn test_empty_payload_part() {
        let parts = [MultipartPart { name: "empty", filename: None, data: b"" }];
        let body = build_multipart("E", &parts);
        let form = parse_multipart(&body, "E").unwrap();
        assert_eq!(form["empty"].as_text(), Some(""));
    }
}
