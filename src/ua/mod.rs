use woothee::parser::Parser;

pub const UNKNOWN_BROWSER: &str = "Unknown";

/// Short browser family shown in the visitor log.
pub fn browser_name(user_agent: &str) -> String {
    if user_agent.trim().is_empty() {
        return UNKNOWN_BROWSER.to_string();
    }

    let parser = Parser::new();

    let name = match parser.parse(user_agent) {
        Some(result) => match result.name {
            "Chrome" => "Chrome",
            "Firefox" => "Firefox",
            "Safari" => "Safari",
            "Edge" => "Edge",
            "Internet Explorer" => "IE",
            _ => UNKNOWN_BROWSER,
        },
        None => UNKNOWN_BROWSER,
    };

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_chrome_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
        assert_eq!(browser_name(ua), "Chrome");
    }

    #[test]
    fn test_browser_firefox() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0";
        assert_eq!(browser_name(ua), "Firefox");
    }

    #[test]
    fn test_browser_safari_mac() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15";
        assert_eq!(browser_name(ua), "Safari");
    }

    #[test]
    fn test_browser_legacy_edge() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36 Edge/18.18363";
        assert_eq!(browser_name(ua), "Edge");
    }

    #[test]
    fn test_browser_internet_explorer() {
        let ua = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";
        assert_eq!(browser_name(ua), "IE");
    }

    #[test]
    fn test_browser_android_chrome() {
        let ua = "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36";
        assert_eq!(browser_name(ua), "Chrome");
    }

    #[test]
    fn test_browser_empty_ua() {
        assert_eq!(browser_name(""), UNKNOWN_BROWSER);
        assert_eq!(browser_name("   "), UNKNOWN_BROWSER);
    }

    #[test]
    fn test_browser_crawler_is_unknown() {
        let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        assert_eq!(browser_name(ua), UNKNOWN_BROWSER);
    }

    #[test]
    fn test_browser_unknown_app() {
        assert_eq!(browser_name("SomeUnknownApp/1.0"), UNKNOWN_BROWSER);
    }
}
