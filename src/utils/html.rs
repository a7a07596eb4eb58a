// src/utils/html.rs

/// Sanitizes user-supplied rich text (messages, descriptions) with ammonia's
/// whitelist. Script tags are dropped along with their content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// `clean_html` for optional fields; blank input becomes `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(clean_html)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
