//! Small helpers shared by the remote and auth modules.

/// Trim optional text, mapping empty results to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string carries an `http://` or `https://` scheme.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Clip response bodies to a readable length for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}
