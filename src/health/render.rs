//! Content negotiation and response rendering.
//!
//! # Design Decisions
//! - Rendering never fails: any serialization problem falls back to plain text
//! - `details` only appear in detailed mode
//! - Per-backend output follows configured order in every format

use std::time::UNIX_EPOCH;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::health::aggregator::AggregateResult;
use crate::health::result::CheckResult;

/// Media types the endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Plain,
    Html,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Plain => "text/plain; charset=utf-8",
            ContentType::Html => "text/html; charset=utf-8",
        }
    }

    fn from_media_range(range: &str) -> Option<Self> {
        match range {
            "application/json" | "application/*" => Some(ContentType::Json),
            "text/plain" | "text/*" | "*/*" => Some(ContentType::Plain),
            "text/html" => Some(ContentType::Html),
            _ => None,
        }
    }
}

/// Pick the response type for an `Accept` header value.
///
/// Media ranges are ranked by `q` (ties keep header order) and the first
/// supported one wins. Anything unparseable counts as "no preference".
pub fn negotiate(accept: Option<&str>) -> ContentType {
    let Some(accept) = accept else {
        return ContentType::Plain;
    };

    let mut ranges: Vec<(String, f32)> = accept
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let media = parts.next()?.trim().to_ascii_lowercase();
            if media.is_empty() {
                return None;
            }
            let mut quality = 1.0_f32;
            for param in parts {
                if let Some((key, value)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        quality = value.trim().parse().unwrap_or(0.0);
                    }
                }
            }
            (quality > 0.0).then_some((media, quality))
        })
        .collect();

    // Stable: equal weights keep client order.
    ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranges
        .iter()
        .find_map(|(media, _)| ContentType::from_media_range(media))
        .unwrap_or(ContentType::Plain)
}

/// A fully rendered health response, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub status: StatusCode,
    pub content_type: ContentType,
    pub body: String,
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type.as_str()),
        );
        response
    }
}

/// Render an evaluation for the negotiated content type.
pub fn render(result: &AggregateResult, accept: Option<&str>, detailed: bool) -> RenderedResponse {
    let status = if result.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let content_type = negotiate(accept);
    let body = match content_type {
        ContentType::Json => match render_json(result, detailed) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "JSON rendering failed, falling back to plain text");
                return RenderedResponse {
                    status,
                    content_type: ContentType::Plain,
                    body: render_plain(result, detailed),
                };
            }
        },
        ContentType::Plain => render_plain(result, detailed),
        ContentType::Html => render_html(result, detailed),
    };

    RenderedResponse {
        status,
        content_type,
        body,
    }
}

#[derive(serde::Serialize)]
struct JsonBody<'a> {
    available: bool,
    detailed: bool,
    reasons: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backends: Option<OrderedBackends<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    now: Option<u64>,
}

/// Serializes as a JSON object whose keys keep configured order.
struct OrderedBackends<'a>(&'a [(String, CheckResult)]);

impl Serialize for OrderedBackends<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in self.0 {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

fn render_json(result: &AggregateResult, detailed: bool) -> Result<String, serde_json::Error> {
    let body = JsonBody {
        available: result.is_available(),
        detailed,
        reasons: result.failures().map(|(_, r)| r.reason()).collect(),
        backends: detailed.then(|| OrderedBackends(result.results())),
        version: detailed.then_some(env!("CARGO_PKG_VERSION")),
        now: detailed.then(|| {
            result
                .evaluated_at()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        }),
    };
    serde_json::to_string(&body)
}

fn failure_line(name: &str, result: &CheckResult, detailed: bool) -> String {
    match (detailed, result.details()) {
        (true, Some(details)) => format!("{}: {} ({})", name, result.reason(), details),
        _ => format!("{}: {}", name, result.reason()),
    }
}

fn render_plain(result: &AggregateResult, detailed: bool) -> String {
    if result.is_available() {
        return "OK".to_string();
    }
    let mut lines = vec!["FAIL".to_string()];
    lines.extend(result.failures().map(|(name, r)| failure_line(name, r, detailed)));
    lines.join("\n")
}

fn render_html(result: &AggregateResult, detailed: bool) -> String {
    let headline = if result.is_available() { "OK" } else { "FAIL" };
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><title>Healthcheck Status</title></head>\n<body>\n",
    );
    html.push_str(&format!("<h1>{}</h1>\n", headline));

    let failures: Vec<String> = result
        .failures()
        .map(|(name, r)| format!("<li>{}</li>", escape_html(&failure_line(name, r, detailed))))
        .collect();
    if !failures.is_empty() {
        html.push_str("<ul>\n");
        html.push_str(&failures.join("\n"));
        html.push_str("\n</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
