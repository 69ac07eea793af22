use std::net::SocketAddr;

use super::server::Response;
use super::{Headers, Request};

/// A request that never made it to `Handler::handle` because it couldn't be
/// parsed. `request_line` is empty when the line itself was unreadable.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub status: u16,
    pub reason: &'static str,
    pub request_line: String,
    pub remote_addr: Option<SocketAddr>,
}

pub trait Handler {
    fn handle(&self, request: &Request) -> Response;

    fn reject(&self, rejection: &Rejection) -> Response {
        Response::error(rejection.status, rejection.reason)
    }
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Sets a fixed group of headers on everything the inner handler returns,
/// rejections included.
pub struct WithHeaders<H> {
    inner: H,
    headers: Headers,
}

pub fn with_headers<H: Handler>(inner: H, headers: Headers) -> WithHeaders<H> {
    WithHeaders { inner, headers }
}

impl<H> WithHeaders<H> {
    fn decorate(&self, mut response: Response) -> Response {
        response.headers_mut().extend(&self.headers);
        response
    }
}

impl<H: Handler> Handler for WithHeaders<H> {
    fn handle(&self, request: &Request) -> Response {
        self.decorate(self.inner.handle(request))
    }

    fn reject(&self, rejection: &Rejection) -> Response {
        self.decorate(self.inner.reject(rejection))
    }
}
