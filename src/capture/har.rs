// Raw HAR 1.2 records as they appear on disk
use base64::Engine;
use serde::Deserialize;

use crate::capture::{Entry, Header, Headers};
use crate::error::{ReqtraceError, Result};

#[derive(Debug, Deserialize)]
pub(super) struct HarFile {
    pub log: HarLog,
}

#[derive(Debug, Deserialize)]
pub(super) struct HarLog {
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HarEntry {
    #[serde(default)]
    request: Option<HarRequest>,
    #[serde(default)]
    response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    http_version: Option<String>,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(default)]
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    http_version: Option<String>,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(default)]
    content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
struct HarHeader {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct HarPostData {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl HarEntry {
    /// Convert a raw record into an immutable entry, rejecting incomplete records
    pub(super) fn into_entry(self, index: usize) -> Result<Entry> {
        let request = self
            .request
            .ok_or_else(|| ReqtraceError::Parse(format!("entry {} has no request", index)))?;
        let response = self
            .response
            .ok_or_else(|| ReqtraceError::Parse(format!("entry {} has no response", index)))?;

        let url = request
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ReqtraceError::Parse(format!("entry {} is missing request.url", index)))?;
        let status = response.status.ok_or_else(|| {
            ReqtraceError::Parse(format!("entry {} is missing response.status", index))
        })?;
        let status = i32::try_from(status).map_err(|_| {
            ReqtraceError::Parse(format!(
                "entry {} has out-of-range response.status {}",
                index, status
            ))
        })?;

        let (response_body, mime_type) = match response.content {
            Some(content) => {
                let body = match content.text {
                    Some(text) => Some(decode_body(index, text, content.encoding.as_deref())?),
                    None => None,
                };
                (body, content.mime_type.unwrap_or_default())
            }
            None => (None, String::new()),
        };

        Ok(Entry {
            index,
            method: request.method.unwrap_or_else(|| "?".to_string()),
            url,
            http_version: request.http_version.or(response.http_version),
            request_headers: convert_headers(request.headers),
            request_body: request.post_data.and_then(|p| p.text),
            status,
            response_headers: convert_headers(response.headers),
            response_body,
            mime_type,
        })
    }
}

fn convert_headers(raw: Vec<HarHeader>) -> Headers {
    Headers::new(
        raw.into_iter()
            .map(|h| Header {
                name: h.name,
                value: h.value,
            })
            .collect(),
    )
}

/// Decode `content.text`, honoring base64 encoding
///
/// Non-UTF-8 payloads fall back to a latin-1 reading so no byte is dropped.
fn decode_body(index: usize, text: String, encoding: Option<&str>) -> Result<String> {
    if encoding != Some("base64") {
        return Ok(text);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| {
            ReqtraceError::Parse(format!("entry {} has an undecodable base64 body: {}", index, e))
        })?;

    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    })
}
