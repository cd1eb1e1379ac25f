//! Constants for the download module (timeouts, request headers).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout (30 seconds; chapter pages are small).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// `Accept` header sent with every page request.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// `Accept-Language` header sent with every page request.
pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3";
