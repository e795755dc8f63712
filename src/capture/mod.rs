//! Capture loading
//!
//! Parses a HAR capture into an ordered, immutable sequence of entries.
//! The whole load aborts on the first malformed record; no partial capture
//! is ever returned.

mod har;

use crate::error::{ReqtraceError, Result};
use serde::{Deserialize, Serialize};

/// Part of an entry a piece of text was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Location {
    Url,
    RequestHeader,
    RequestBody,
    ResponseHeader,
    ResponseBody,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Url => "url",
            Location::RequestHeader => "request-header",
            Location::RequestBody => "request-body",
            Location::ResponseHeader => "response-header",
            Location::ResponseBody => "response-body",
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single HTTP header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new(headers: Vec<Header>) -> Self {
        Self(headers)
    }

    /// First header value whose name matches, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One recorded request/response pair
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Position in the capture (chronological order)
    pub index: usize,
    pub method: String,
    pub url: String,
    pub http_version: Option<String>,
    pub request_headers: Headers,
    pub request_body: Option<String>,
    pub status: i32,
    pub response_headers: Headers,
    pub response_body: Option<String>,
    pub mime_type: String,
}

impl Entry {
    /// All searchable text of the entry, in fixed location order
    ///
    /// Header names and values are yielded as separate fields.
    pub fn text_fields(&self) -> Vec<(Location, &str)> {
        self.fields(true)
    }

    /// Text that can carry candidate values: everything except header names
    pub fn value_fields(&self) -> Vec<(Location, &str)> {
        self.fields(false)
    }

    fn fields(&self, with_header_names: bool) -> Vec<(Location, &str)> {
        let mut fields = Vec::with_capacity(
            3 + 2 * (self.request_headers.len() + self.response_headers.len()),
        );
        fields.push((Location::Url, self.url.as_str()));
        for h in self.request_headers.iter() {
            if with_header_names {
                fields.push((Location::RequestHeader, h.name.as_str()));
            }
            fields.push((Location::RequestHeader, h.value.as_str()));
        }
        if let Some(body) = &self.request_body {
            fields.push((Location::RequestBody, body.as_str()));
        }
        for h in self.response_headers.iter() {
            if with_header_names {
                fields.push((Location::ResponseHeader, h.name.as_str()));
            }
            fields.push((Location::ResponseHeader, h.value.as_str()));
        }
        if let Some(body) = &self.response_body {
            fields.push((Location::ResponseBody, body.as_str()));
        }
        fields
    }

    /// Containment rule shared by walk-back and graph expansion
    pub fn contains(&self, value: &str) -> bool {
        self.locate(value).is_some()
    }

    /// First location in which `value` occurs as a substring
    pub fn locate(&self, value: &str) -> Option<Location> {
        if value.is_empty() {
            return None;
        }
        self.text_fields()
            .into_iter()
            .find(|(_, text)| text.contains(value))
            .map(|(location, _)| location)
    }

    /// Host component of the request URL
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// Path component of the request URL, falling back to the raw URL
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }

    /// Request line as `METHOD URL VERSION`
    pub fn top_line(&self) -> String {
        format!(
            "{} {} {}",
            self.method,
            self.url,
            self.http_version.as_deref().unwrap_or("HTTP/?")
        )
    }

    /// Whether the response body should be treated as JSON
    pub fn looks_like_json(&self) -> bool {
        let Some(body) = self.response_body.as_deref() else {
            return false;
        };
        if body.is_empty() {
            return false;
        }
        if self.mime_type.to_ascii_lowercase().contains("json") {
            return true;
        }
        let trimmed = body.trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    }
}

/// Ordered, immutable capture
#[derive(Debug, Clone, Default)]
pub struct Capture {
    entries: Vec<Entry>,
}

impl Capture {
    /// Parse a HAR document
    pub fn from_har_str(raw: &str) -> Result<Self> {
        let file: har::HarFile = serde_json::from_str(raw)
            .map_err(|e| ReqtraceError::Parse(format!("malformed HAR document: {}", e)))?;

        let entries = file
            .log
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_entry(index))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Parsed {} capture entries", entries.len());

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Host of the first entry, taken as the capture's target
    pub fn primary_host(&self) -> Option<String> {
        self.entries.iter().find_map(|e| e.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn har(entries: serde_json::Value) -> String {
        json!({ "log": { "version": "1.2", "entries": entries } }).to_string()
    }

    #[test]
    fn test_load_minimal_capture() {
        let raw = har(json!([
            {
                "request": {
                    "method": "GET",
                    "url": "https://example.com/api/match/1629454135",
                    "httpVersion": "HTTP/2",
                    "headers": [{ "name": "Authorization", "value": "Bearer abc" }]
                },
                "response": {
                    "status": 200,
                    "headers": [{ "name": "Content-Type", "value": "application/json" }],
                    "content": { "mimeType": "application/json", "text": "{\"ok\":true}" }
                }
            }
        ]));

        let capture = Capture::from_har_str(&raw).unwrap();
        assert_eq!(capture.len(), 1);

        let entry = &capture.entries()[0];
        assert_eq!(entry.index, 0);
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.status, 200);
        assert_eq!(entry.request_headers.get("authorization"), Some("Bearer abc"));
        assert_eq!(entry.response_body.as_deref(), Some("{\"ok\":true}"));
        assert_eq!(entry.top_line(), "GET https://example.com/api/match/1629454135 HTTP/2");
        assert!(entry.looks_like_json());
        assert_eq!(capture.primary_host().as_deref(), Some("example.com"));

        // Header names are searchable but never offered as values
        assert!(entry.contains("Authorization"));
        assert_eq!(entry.text_fields().len(), 6);
        let values: Vec<&str> = entry.value_fields().iter().map(|(_, t)| *t).collect();
        assert_eq!(
            values,
            vec![
                "https://example.com/api/match/1629454135",
                "Bearer abc",
                "application/json",
                "{\"ok\":true}"
            ]
        );
    }

    #[test]
    fn test_missing_url_aborts_load() {
        let raw = har(json!([
            { "request": { "method": "GET", "url": "https://a.test/" }, "response": { "status": 200 } },
            { "request": { "method": "GET" }, "response": { "status": 200 } }
        ]));

        let err = Capture::from_har_str(&raw).unwrap_err();
        assert!(matches!(err, ReqtraceError::Parse(_)));
        assert!(err.to_string().contains("entry 1"));
    }

    #[test]
    fn test_missing_status_aborts_load() {
        let raw = har(json!([
            { "request": { "method": "GET", "url": "https://a.test/" }, "response": {} }
        ]));

        assert!(matches!(
            Capture::from_har_str(&raw),
            Err(ReqtraceError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            Capture::from_har_str("{ not json"),
            Err(ReqtraceError::Parse(_))
        ));
        assert!(matches!(
            Capture::from_har_str(r#"{"log": {}}"#),
            Err(ReqtraceError::Parse(_))
        ));
    }

    #[test]
    fn test_locate_order() {
        let raw = har(json!([
            {
                "request": {
                    "method": "POST",
                    "url": "https://a.test/x",
                    "postData": { "text": "token=SEED123" }
                },
                "response": { "status": 200, "content": { "text": "SEED123" } }
            }
        ]));

        let capture = Capture::from_har_str(&raw).unwrap();
        let entry = &capture.entries()[0];
        assert_eq!(entry.locate("SEED123"), Some(Location::RequestBody));
        assert!(!entry.contains("missing"));
        assert!(!entry.contains(""));
    }
}
