use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};
use thiserror::Error;

use super::files::escape_html;
use super::handler::{Handler, Rejection};
use super::*;

pub const SERVER_NAME: &str = concat!("labhttp/", env!("CARGO_PKG_VERSION"));

const LINE_LEN_LIMIT: usize = 8192;
const MAX_HEADERS: usize = 100;

pub struct Responder {
    imp: Box<dyn ResponseWriter + Send>,
}

impl Responder {
    /// Writes `response` preceded by the `Server` and `Date` headers, then
    /// closes the connection.
    pub fn send_response(mut self, response: Response) -> Result<(), io::Error> {
        let mut headers = Headers::default()
            .with(Header::Server, SERVER_NAME)
            .with(Header::Date, httpdate::fmt_http_date(SystemTime::now()));
        headers.extend(&response.headers);

        self.imp.send_response(Response { headers, ..response })
    }
}

/// A bound listener. `serve` accepts, reads and answers one connection at a
/// time on the calling thread; the next connection waits in the listen
/// backlog until the current one has been answered.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

/// Stops a running `Server::serve` loop. Safe to call from a signal handler
/// thread, and more than once.
#[derive(Clone)]
pub struct ShutdownHandle {
    stopping: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        // The serving loop only notices the flag once accept() returns.
        let _ = TcpStream::connect_timeout(&self.wake_addr, Duration::from_secs(1));
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(bind_address: A) -> Result<Server, BindError> {
        let listener = TcpListener::bind(bind_address)?;
        let local_addr = listener.local_addr()?;

        let shutdown = ShutdownHandle {
            stopping: Arc::new(AtomicBool::new(false)),
            wake_addr: wake_address(local_addr),
        };

        log::debug!("Listening on {}", local_addr);

        Ok(Server { listener, local_addr, shutdown })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Blocks until a `ShutdownHandle` fires. No timeouts are set on
    /// connections, so a client that never finishes its request holds up
    /// everyone behind it.
    pub fn serve<H: Handler + ?Sized>(&self, handler: &H) {
        for stream in self.listener.incoming() {
            if self.shutdown.is_stopping() {
                log::debug!("Shutdown requested; leaving serve loop");
                break;
            }

            match stream {
                Ok(stream) => serve_connection(stream, handler),
                Err(e) => log::warn!("Unable to accept connection: {:?}", e),
            }
        }
    }
}

fn wake_address(local_addr: SocketAddr) -> SocketAddr {
    match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local_addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local_addr.port()),
        _ => local_addr,
    }
}

fn serve_connection<H: Handler + ?Sized>(stream: TcpStream, handler: &H) {
    let remote_addr = stream.peer_addr().ok();

    let responder = match stream.try_clone() {
        Err(e) => {
            log::error!("Unable to clone stream objects for response: {:?}", e);
            return;
        }
        Ok(s) => Responder {
            imp: Box::new(new_response_writer_1_0(s)),
        },
    };

    match parse_request(stream, remote_addr) {
        Err(HttpError::EmptyRequest) => {
            log::trace!("Empty request from {:?}", remote_addr);
        }
        Err(HttpError::StreamError(e)) => {
            log::debug!("Got error reading http request from {:?}: {:?}", remote_addr, e);
        }
        Err(HttpError::LineTooLong) => {
            log::debug!("Over-long line from {:?}", remote_addr);
        }
        Err(HttpError::ClientError(status, reason, request_line)) => {
            log::debug!("Should respond to client with {} (reason: {})", status, reason);
            let rejection = Rejection { status, reason, request_line, remote_addr };
            if let Err(e) = responder.send_response(handler.reject(&rejection)) {
                log::error!("Unable to write {} response: {:?}", status, e);
            }
        }
        Ok(req) => {
            log::debug!("Handling request: {:?} : {:?}", req.method(), req.target());
            let mut response = handler.handle(&req);
            if *req.method() == Method::HEAD {
                response = response.without_body();
            }
            if let Err(e) = responder.send_response(response) {
                log::error!("Unable to write response for \"{}\": {:?}", req.request_line(), e);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("Unable to listen on http port")]
    HttpListenError(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Error reading request")]
    StreamError(#[from] io::Error),
    #[error("Connection closed without a request")]
    EmptyRequest,
    #[error("Line exceeds {} bytes", LINE_LEN_LIMIT)]
    LineTooLong,
    #[error("Bad client request: {0} ({1})")]
    ClientError(u16, &'static str, String),
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        414 => "URI Too Long",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}

trait ResponseWriter {
    fn set_status(&mut self, status: u16) -> Result<(), io::Error>;
    fn set_headers(&mut self, headers: &Headers) -> Result<(), io::Error>;
    fn stream_body(&mut self, reader: &mut dyn Read) -> Result<(), io::Error>;
    fn send_response(&mut self, response: Response) -> Result<(), io::Error>;
}

#[derive(Debug, PartialEq, Eq)]
enum ResponseState {
    Status,
    Headers,
    Body,
}

struct ResponseWriterImpl<Stream>
where
    Stream: Write,
{
    stream: Stream,
    state: ResponseState,
    status: Option<u16>,
}

fn new_response_writer_1_0<Stream>(s: Stream) -> ResponseWriterImpl<BufWriter<Stream>>
where
    Stream: Write + Send + 'static,
{
    ResponseWriterImpl {
        stream: BufWriter::new(s),
        state: ResponseState::Status,
        status: None,
    }
}

impl<Stream> Drop for ResponseWriterImpl<Stream> where Stream: Write {
    fn drop(&mut self) {
        log::trace!("Closing response ({})", self.status.unwrap_or(0));
    }
}

impl<Stream> ResponseWriter for ResponseWriterImpl<Stream>
where
    Stream: Write,
{
    fn set_status(&mut self, status: u16) -> Result<(), io::Error> {
        assert!(
            self.state == ResponseState::Status,
            "Invalid state: status code has already been sent; cannot update"
        );
        log::trace!("HTTP/1.0 {} {}", status, reason_phrase(status));
        write!(self.stream, "HTTP/1.0 {} {}\r\n", status, reason_phrase(status))?;
        self.state = ResponseState::Headers;
        self.status = Some(status);
        Ok(())
    }

    fn set_headers(&mut self, headers: &Headers) -> Result<(), io::Error> {
        match self.state {
            ResponseState::Status => {
                panic!("Invalid state: status code has not yet been sent; cannot start headers")
            }
            ResponseState::Headers => {}
            ResponseState::Body => {
                panic!("Invalid state: headers have already been sent; cannot update")
            }
        };

        for (h_name, h_value) in headers.iter() {
            log::trace!("Writing header: {}: {}", h_name.as_header_string(), h_value);
            write!(self.stream, "{}: {}\r\n", h_name.as_header_string(), h_value)?;
        }
        write!(self.stream, "\r\n")?;

        self.state = ResponseState::Body;

        Ok(())
    }

    fn stream_body(&mut self, mut reader: &mut dyn Read) -> Result<(), io::Error> {
        match self.state {
            ResponseState::Status => {
                panic!("Invalid state: status code has not yet been sent; cannot start body")
            }
            ResponseState::Headers => write!(self.stream, "\r\n")?,
            ResponseState::Body => (),
        }
        self.state = ResponseState::Body;
        let copied = io::copy(&mut reader, &mut self.stream)?;
        log::trace!("Copied {} body bytes to response", copied);

        Ok(())
    }

    fn send_response(&mut self, response: Response) -> Result<(), io::Error> {
        assert!(
            self.state == ResponseState::Status,
            "Invalid state: response has already started"
        );

        self.set_status(response.status)?;
        self.set_headers(&response.headers)?;

        if let Some(mut body_stream) = response.stream {
            self.stream_body(&mut body_stream)?;
        }

        self.stream.flush()
    }
}

pub struct Response {
    status: u16,
    stream: Option<Box<dyn Read>>,
    headers: Headers,
    error_message: Option<String>,
}

pub struct ResponseBuilder {
    status: u16,
    stream: Option<Box<dyn Read>>,
    headers: Headers,
}

impl Response {
    pub fn builder(status: u16) -> ResponseBuilder {
        ResponseBuilder {
            status,
            stream: None,
            headers: Headers::default(),
        }
    }

    /// An error response with a short HTML explanation.
    pub fn error(status: u16, message: &str) -> Self {
        let page = format!(
            "<!DOCTYPE HTML>\n\
            <html lang=\"en\">\n\
            <head>\n\
            <meta charset=\"utf-8\">\n\
            <title>Error response</title>\n\
            </head>\n\
            <body>\n\
            <h1>Error response</h1>\n\
            <p>Error code: {} {}</p>\n\
            <p>Message: {}.</p>\n\
            </body>\n\
            </html>\n",
            status, reason_phrase(status), escape_html(message));

        let mut response = Response::builder(status)
            .content_type("text/html;charset=utf-8")
            .header(Header::Connection, "close")
            .body_from_string(&page)
            .build();
        response.error_message = Some(message.to_string());
        response
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The explanation given to `Response::error`, if this is an error page.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn has_body(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops the body, keeping the headers (including `Content-Length`).
    pub fn without_body(mut self) -> Self {
        self.stream = None;
        self
    }

    pub fn into_body_bytes(self) -> Result<Vec<u8>, io::Error> {
        let mut result = Vec::new();
        if let Some(mut stream) = self.stream {
            stream.read_to_end(&mut result)?;
        }
        Ok(result)
    }
}

impl ResponseBuilder {
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(Header::ContentType, content_type)
    }

    pub fn header<V: Into<String>>(mut self, header: Header, value: V) -> Self {
        self.headers.set(header, value);
        self
    }

    pub fn send_file(mut self, f: File, len: u64) -> Self {
        self.headers.set(Header::ContentLength, len.to_string());
        self.stream = Some(Box::new(f));
        self
    }

    pub fn body(mut self, b: Vec<u8>) -> Self {
        if !self.headers.contains(Header::ContentLength) {
            self.headers.set(Header::ContentLength, b.len().to_string());
        }
        self.stream = Some(Box::new(Cursor::new(b)));
        self
    }

    pub fn body_from_string(self, s: &str) -> Self {
        self.body(s.as_bytes().to_vec())
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            stream: self.stream,
            error_message: None,
        }
    }
}

fn read_until_limited<R>(reader: &mut BufReader<R>, needle: u8, line_len_limit: usize) -> Result<Vec<u8>, HttpError>
    where R: Read {

    let mut buf = Vec::new();
    while buf.len() < line_len_limit {
        let cur = reader.fill_buf()?;
        if cur.is_empty() {
            if buf.is_empty() {
                return Err(HttpError::StreamError(io::ErrorKind::UnexpectedEof.into()));
            }
            return Ok(buf);
        }
        if let Some(newline) = cur.iter().position(|&b| b == needle) {
            buf.extend_from_slice(&cur[..newline]);
            reader.consume(newline + 1);
            return Ok(buf);
        } else {
            let to_consume = cur.len().min(line_len_limit - buf.len());
            buf.extend_from_slice(&cur[..to_consume]);
            reader.consume(to_consume);
        }
    }

    Err(HttpError::LineTooLong)
}

fn parse_version(token: &str) -> Result<HttpProtocolVersion, (u16, &'static str)> {
    let bad_version = (400, "Bad request version");
    let number = token.strip_prefix("HTTP/").ok_or(bad_version)?;
    let mut parts = number.splitn(2, '.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or(bad_version)?;
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or(bad_version)?;

    match (major, minor) {
        (1, 0) => Ok(HttpProtocolVersion::H1_0),
        (1, _) => Ok(HttpProtocolVersion::H1_1),
        (m, _) if m >= 2 => Err((505, "Invalid HTTP version")),
        _ => Err(bad_version),
    }
}

fn parse_request<R>(stream: R, remote_addr: Option<SocketAddr>) -> Result<Request, HttpError>
where
    R: Read,
{
    let mut stream = BufReader::new(stream);

    let request_line = match read_until_limited(&mut stream, b'\n', LINE_LEN_LIMIT) {
        Err(HttpError::StreamError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(HttpError::EmptyRequest)
        }
        Err(HttpError::LineTooLong) => {
            return Err(HttpError::ClientError(414, "Request-URI Too Long", String::new()))
        }
        other => other?,
    };
    let request_line = String::from_utf8_lossy(&request_line).trim_end().to_string();
    let reject = |status: u16, reason: &'static str| HttpError::ClientError(status, reason, request_line.clone());

    let words: Vec<&str> = request_line.split_whitespace().collect();
    let (method, target, version) = match words.as_slice() {
        [] => return Err(HttpError::EmptyRequest),
        [method, target, version] => {
            let version = parse_version(version).map_err(|(status, reason)| reject(status, reason))?;
            (Method::from_token(method), *target, version)
        }
        _ => return Err(reject(400, "Bad request syntax")),
    };
    log::trace!("Request line: {} {} {}", method, target, version.as_str());

    let mut headers = Headers::default();

    loop {
        let line = match read_until_limited(&mut stream, b'\n', LINE_LEN_LIMIT) {
            Err(HttpError::LineTooLong) => return Err(reject(431, "Line too long")),
            other => other?,
        };
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            break;
        }

        if headers.len() >= MAX_HEADERS {
            log::warn!("Stopping after first {} headers", MAX_HEADERS);
            return Err(reject(431, "Too many headers"));
        }

        let mut parts = line.splitn(2, |&b| b == b':');
        let key = parts.next().unwrap_or(&[]);
        if key.is_empty() || key.iter().any(|b| b.is_ascii_whitespace()) {
            return Err(reject(400, "Bad header name"));
        }
        let value = parts.next().ok_or_else(|| reject(400, "Bad header value"))?;
        let value = String::from_utf8_lossy(value).trim().to_string();

        headers.set(Header::from_name(&String::from_utf8_lossy(key)), value);
    }

    let mut request = Request::new(method, target)
        .with_version(version)
        .with_headers(headers);
    if let Some(addr) = remote_addr {
        request = request.with_remote_addr(addr);
    }

    Ok(request)
}
