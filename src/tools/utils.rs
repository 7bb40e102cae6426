/// Normalize an incomplete URL by adding missing protocol and handling common patterns
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    // If already has a protocol, return as-is
    if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("file://")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("about:")
    {
        return trimmed.to_string();
    }

    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        return format!("http://{}", trimmed);
    }

    // Library sites are only reachable over TLS
    format!("https://{}", trimmed)
}

/// Fill the `{page}` placeholder of a paginated listing URL
pub fn page_url(template: &str, page: u32) -> String {
    if template.contains("{page}") {
        template.replace("{page}", &page.to_string())
    } else {
        template.to_string()
    }
}
