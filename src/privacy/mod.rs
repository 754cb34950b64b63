use axum::http::HeaderMap;

/// Replacement shown for every address when IPs are hidden.
pub const MASKED_IP: &str = "***.***.***.***";

/// Check if DNT (Do Not Track) or GPC (Global Privacy Control) is enabled
pub fn is_dnt_enabled(headers: &HeaderMap) -> bool {
    let dnt = headers
        .get("dnt")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "1")
        .unwrap_or(false);

    let gpc = headers
        .get("sec-gpc")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "1")
        .unwrap_or(false);

    dnt || gpc
}

/// Extract client IP from headers (supports common proxy headers)
pub fn get_client_ip(headers: &HeaderMap) -> Option<String> {
    // X-Forwarded-For first, then Nginx, Cloudflare and Akamai headers
    for name in [
        "x-forwarded-for",
        "x-real-ip",
        "cf-connecting-ip",
        "true-client-ip",
    ] {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };

        // Take the first IP (client IP in a proxy chain)
        let ip = value.split(',').next().unwrap_or_default().trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    None
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Get the user agent string from headers
pub fn get_user_agent(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "user-agent")
}

/// Get the referrer URL from headers
pub fn get_referrer(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "referer")
}

/// Reduce a reported location to its path. Absolute URLs lose scheme, host,
/// query and fragment; anything else is kept as given.
pub fn request_path(location: &str) -> String {
    let location = location.trim();

    match url::Url::parse(location) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => location.to_string(),
    }
}

pub fn mask_ip(ip: &str) -> String {
    if ip.is_empty() {
        String::new()
    } else {
        MASKED_IP.to_string()
    }
}
