use std::fmt;

use labhttp::{Header, Headers};

/// Only scripts served from the page's own origin may run, which rules out
/// inline `<script>` blocks and `on*=` attribute handlers.
pub const STRICT_POLICY: &str = "script-src 'self'";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CspMode {
    Disabled,
    Strict,
}

impl CspMode {
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "--no-csp" => Some(CspMode::Disabled),
            "--strict-csp" => Some(CspMode::Strict),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CspMode::Disabled => "none",
            CspMode::Strict => "strict",
        }
    }

    /// What a visitor trying the XSS demo should expect.
    pub fn effect(self) -> &'static str {
        match self {
            CspMode::Disabled => "No CSP headers (XSS will work)",
            CspMode::Strict => "CSP: script-src 'self' (XSS blocked)",
        }
    }

    pub fn headers(self) -> Headers {
        match self {
            CspMode::Disabled => Headers::default(),
            CspMode::Strict => Headers::default().with(Header::ContentSecurityPolicy, STRICT_POLICY),
        }
    }
}

impl fmt::Display for CspMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keeps browsers from caching pages across a switch between CSP modes.
pub fn cache_busting_headers() -> Headers {
    Headers::default()
        .with(Header::CacheControl, "no-store, no-cache, must-revalidate, max-age=0")
        .with(Header::Pragma, "no-cache")
        .with(Header::Expires, "0")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_map_to_modes() {
        assert_eq!(CspMode::from_flag("--no-csp"), Some(CspMode::Disabled));
        assert_eq!(CspMode::from_flag("--strict-csp"), Some(CspMode::Strict));
        assert_eq!(CspMode::from_flag("--strict"), None);
        assert_eq!(CspMode::from_flag("foo"), None);
    }

    #[test]
    fn only_strict_mode_sets_a_policy() {
        assert!(CspMode::Disabled.headers().is_empty());

        let strict = CspMode::Strict.headers();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict.get(Header::ContentSecurityPolicy), Some("script-src 'self'"));
    }

    #[test]
    fn cache_busting_headers_are_complete() {
        let headers = cache_busting_headers();
        assert_eq!(headers.get(Header::CacheControl), Some("no-store, no-cache, must-revalidate, max-age=0"));
        assert_eq!(headers.get(Header::Pragma), Some("no-cache"));
        assert_eq!(headers.get(Header::Expires), Some("0"));
    }
}
