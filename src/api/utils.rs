//! Request header checks for the handlers that take a JSON body

use axum::http::{HeaderMap, header::CONTENT_TYPE};

use crate::api::error::ApiError;

const JSON_MEDIA_TYPE: &str = "application/json";

/// The body must be declared as `application/json`; parameters such as a
/// charset are ignored.
pub fn require_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Err(ApiError::invalid("content-type", "header is required"));
    };

    let media_type = value
        .to_str()
        .ok()
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .ok_or_else(|| ApiError::invalid("content-type", "header is not a media type"))?;

    match media_type.essence_str() {
        JSON_MEDIA_TYPE => Ok(()),
        other => Err(ApiError::invalid(
            "content-type",
            format!("expected {JSON_MEDIA_TYPE}, got {other}"),
        )),
    }
}
