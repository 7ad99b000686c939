use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::CoreError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(CoreError))]
#[allow(dead_code)]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for CoreError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> CoreError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.to_string();
            if let Some(field) = extract_missing_field(&message) {
                CoreError::Invalid(format!("missing required field: {field}"))
            } else {
                CoreError::Invalid(format!("invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => CoreError::Invalid(format!("JSON syntax error: {err}")),
        JsonRejection::MissingJsonContentType(_) => {
            CoreError::Invalid("missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(_) => CoreError::Internal("failed to read request body".to_string()),
        _ => CoreError::Invalid(rejection.to_string()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
