use std::fmt;
use std::net::SocketAddr;

pub mod files;
pub mod handler;
pub mod query;
pub mod server;

pub use handler::{with_headers, Handler, Rejection, WithHeaders};
pub use query::QueryParams;
pub use files::StaticFiles;
pub use server::{Response, ResponseBuilder, Server, ShutdownHandle};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    PUT,
    DELETE,
    POST,
    OPTIONS,
    PATCH,
    Other(String),
}

impl Method {
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "POST" => Method::POST,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::POST => "POST",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpProtocolVersion {
    H1_0,
    H1_1,
}

impl HttpProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpProtocolVersion::H1_0 => "HTTP/1.0",
            HttpProtocolVersion::H1_1 => "HTTP/1.1",
        }
    }
}

/// Header names this crate knows how to render. Anything else read off the
/// wire lands in `Other`, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Header {
    Host,
    UserAgent,
    Accept,
    ContentType,
    ContentLength,
    Authorization,
    Connection,
    Date,
    Server,
    Location,
    LastModified,
    IfModifiedSince,
    IfNoneMatch,
    CacheControl,
    Pragma,
    Expires,
    ContentSecurityPolicy,
    AccessControlAllowOrigin,
    Other(String),
}

impl Header {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "host" => Header::Host,
            "user-agent" => Header::UserAgent,
            "accept" => Header::Accept,
            "content-type" => Header::ContentType,
            "content-length" => Header::ContentLength,
            "authorization" => Header::Authorization,
            "connection" => Header::Connection,
            "date" => Header::Date,
            "server" => Header::Server,
            "location" => Header::Location,
            "last-modified" => Header::LastModified,
            "if-modified-since" => Header::IfModifiedSince,
            "if-none-match" => Header::IfNoneMatch,
            "cache-control" => Header::CacheControl,
            "pragma" => Header::Pragma,
            "expires" => Header::Expires,
            "content-security-policy" => Header::ContentSecurityPolicy,
            "access-control-allow-origin" => Header::AccessControlAllowOrigin,
            other => Header::Other(other.to_string()),
        }
    }

    pub fn as_header_string(&self) -> &str {
        match self {
            Header::Host => "Host",
            Header::UserAgent => "User-Agent",
            Header::Accept => "Accept",
            Header::ContentType => "Content-Type",
            Header::ContentLength => "Content-Length",
            Header::Authorization => "Authorization",
            Header::Connection => "Connection",
            Header::Date => "Date",
            Header::Server => "Server",
            Header::Location => "Location",
            Header::LastModified => "Last-Modified",
            Header::IfModifiedSince => "If-Modified-Since",
            Header::IfNoneMatch => "If-None-Match",
            Header::CacheControl => "Cache-Control",
            Header::Pragma => "Pragma",
            Header::Expires => "Expires",
            Header::ContentSecurityPolicy => "Content-Security-Policy",
            Header::AccessControlAllowOrigin => "Access-Control-Allow-Origin",
            Header::Other(name) => name,
        }
    }
}

/// Ordered header list. `set` replaces an existing value in place so the
/// rendered order follows first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    data: Vec<(Header, String)>,
}

impl Headers {
    pub fn set<V>(&mut self, key: Header, value: V)
        where V: Into<String> {
        let value = value.into();
        match self.data.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.data.push((key, value)),
        }
    }

    pub fn with<V>(mut self, key: Header, value: V) -> Self
        where V: Into<String> {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: Header) -> Option<&str> {
        self.data.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: Header) -> bool {
        self.get(key).is_some()
    }

    pub fn extend(&mut self, other: &Headers) {
        for (key, value) in other.iter() {
            self.set(key.clone(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item=(&Header, &str)> {
        self.data.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}


#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    version: HttpProtocolVersion,
    headers: Headers,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(method: Method, target: &str) -> Self {
        Request {
            method,
            target: target.to_string(),
            version: HttpProtocolVersion::H1_1,
            headers: Headers::default(),
            remote_addr: None,
        }
    }

    pub fn with_header<V: Into<String>>(mut self, key: Header, value: V) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn with_version(mut self, version: HttpProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as the client sent it.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> HttpProtocolVersion {
        self.version
    }

    /// Target with any query string and fragment removed.
    pub fn path(&self) -> &str {
        let without_fragment = self.target.split('#').next().unwrap_or("");
        without_fragment.split('?').next().unwrap_or("")
    }

    /// Raw query string; empty when the target has none.
    pub fn query(&self) -> &str {
        let without_fragment = self.target.split('#').next().unwrap_or("");
        match without_fragment.find('?') {
            Some(idx) => &without_fragment[idx + 1..],
            None => "",
        }
    }

    pub fn query_params(&self) -> QueryParams {
        QueryParams::parse(self.query())
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, key: Header) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(Header::UserAgent)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version.as_str())
    }
}
