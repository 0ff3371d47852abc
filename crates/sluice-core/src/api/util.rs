/// Normalize a chat completions URL.
/// Ensures the URL ends with the correct path for chat completions.
pub fn normalize_chat_url(base_url: Option<&str>, default_url: &str) -> String {
    let base_url = base_url.unwrap_or(default_url).to_string();

    if base_url.ends_with("/chat/completions") {
        return base_url;
    }

    if let Ok(mut parsed) = url::Url::parse(&base_url) {
        let path = parsed.path().trim_end_matches('/').to_string();

        if path.ends_with("/v1") {
            parsed.set_path(&format!("{path}/chat/completions"));
        } else if path.is_empty() {
            parsed.set_path("/v1/chat/completions");
        } else {
            parsed.set_path(&format!("{path}/v1/chat/completions"));
        }
        parsed.to_string()
    } else if base_url.ends_with('/') {
        format!("{base_url}v1/chat/completions")
    } else {
        format!("{base_url}/v1/chat/completions")
    }
}
