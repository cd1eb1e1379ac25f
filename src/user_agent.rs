//! User-Agent string for page requests.
//!
//! Novel hosts commonly serve an empty shell to non-browser agents, so the
//! client presents itself as a desktop browser.

/// Browser User-Agent sent with every page request.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for page requests.
#[must_use]
pub(crate) fn default_page_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ua_looks_like_a_browser() {
        let ua = default_page_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "UA must be browser-like: {ua}");
        assert!(ua.contains("Chrome/"), "UA must name an engine: {ua}");
    }
}
