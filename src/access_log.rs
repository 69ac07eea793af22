use std::net::SocketAddr;

use chrono::{DateTime, Local};
use labhttp::{Handler, Rejection, Request, Response};

const DATE_FORMAT: &str = "%d/%b/%Y %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessLogStyle {
    /// Nothing is written.
    Off,
    /// `[date] "request line" status -` on stdout.
    Timestamped,
    /// `client - - [date] "request line" status -` on stderr.
    Standard,
}

/// Writes one access-log line per response the inner handler produces.
pub struct AccessLog<H> {
    inner: H,
    style: AccessLogStyle,
}

impl<H: Handler> AccessLog<H> {
    pub fn new(inner: H, style: AccessLogStyle) -> Self {
        AccessLog { inner, style }
    }

    fn record(&self, remote_addr: Option<SocketAddr>, message: &str) {
        match entry(self.style, remote_addr, message, Local::now()) {
            Some(line) if self.style == AccessLogStyle::Standard => eprintln!("{}", line),
            Some(line) => println!("{}", line),
            None => {}
        }
    }
}

impl<H: Handler> Handler for AccessLog<H> {
    fn handle(&self, request: &Request) -> Response {
        let response = self.inner.handle(request);
        for message in messages(&request.request_line(), response.status(), response.error_message()) {
            self.record(request.remote_addr(), &message);
        }
        response
    }

    fn reject(&self, rejection: &Rejection) -> Response {
        let response = self.inner.reject(rejection);
        for message in messages(&rejection.request_line, rejection.status, Some(rejection.reason)) {
            self.record(rejection.remote_addr, &message);
        }
        response
    }
}

/// Error pages get a `code N, message M` line ahead of the request line.
pub fn messages(request_line: &str, status: u16, error: Option<&str>) -> Vec<String> {
    let mut messages = Vec::with_capacity(2);
    if let Some(error) = error {
        messages.push(format!("code {}, message {}", status, error));
    }
    messages.push(format!("\"{}\" {} -", request_line, status));
    messages
}

pub fn entry(style: AccessLogStyle, remote_addr: Option<SocketAddr>, message: &str, at: DateTime<Local>) -> Option<String> {
    let timestamp = at.format(DATE_FORMAT);
    match style {
        AccessLogStyle::Off => None,
        AccessLogStyle::Timestamped => Some(format!("[{}] {}", timestamp, message)),
        AccessLogStyle::Standard => {
            let client = remote_addr.map(|a| a.ip().to_string()).unwrap_or_else(|| "-".into());
            Some(format!("{} - - [{}] {}", client, timestamp, message))
        }
    }
}
