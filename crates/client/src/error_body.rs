use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Pulls the message out of an `{ "error": ... }` body, falling back to the raw text.
pub(crate) fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "No message".to_string(),
        Err(_) => body,
    }
}

/// Both gateway routes answer "... API key is missing." when unconfigured.
pub(crate) fn names_missing_key(message: &str) -> bool {
    message.to_lowercase().contains("key is missing")
}
