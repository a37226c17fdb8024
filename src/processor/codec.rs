//! JSON decoding for response bodies.
//!
//! Dates are expected as ISO-8601 strings, which `chrono`'s serde support
//! decodes straight into `DateTime<Utc>` fields. An empty (or all
//! whitespace) body decodes as `null`, so unit and `Option` payloads can
//! describe bodiless responses such as `304 Not Modified`.

use serde::de::DeserializeOwned;

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(body)
    }
}

/// Body rendered for diagnostics: pretty JSON if it parses, else lossy UTF-8.
pub fn pretty_printed(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
