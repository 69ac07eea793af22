use std::fs;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use labhttp::{Handler, Server, ShutdownHandle};
use xss_lab::access_log::{AccessLog, AccessLogStyle};
use xss_lab::app;
use xss_lab::config::ServerConfig;
use xss_lab::csp::CspMode;
use xss_lab::exfil::ExfilLogger;

struct RunningServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    worker: Option<JoinHandle<()>>,
}

impl RunningServer {
    fn start<H: Handler + Send + 'static>(handler: H) -> Self {
        let server = Server::bind("127.0.0.1:0").expect("binding test server");
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let worker = thread::spawn(move || server.serve(&handler));
        RunningServer { addr, shutdown, worker: Some(worker) }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn get(url: &str) -> ureq::Response {
    match ureq::get(url).call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(_, resp)) => resp,
        Err(e) => panic!("request to {} failed: {}", url, e),
    }
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Setting up temp directory");
    fs::write(dir.path().join("index.html"), "<html><body><script src=\"script.js\"></script></body></html>").unwrap();
    fs::write(dir.path().join("script.js"), "console.log('hi');").unwrap();
    dir
}

fn static_server(config: ServerConfig) -> RunningServer {
    let config = config.resolve().expect("resolving test site");
    RunningServer::start(app::static_handler(&config))
}

#[test]
fn exfil_logger_acknowledges_any_query() {
    let server = RunningServer::start(AccessLog::new(ExfilLogger::new(), AccessLogStyle::Off));

    for path in &["/?data=abc123", "/?x=1&x=2", "/", "/?%zz&&=="] {
        let resp = get(&server.url(path));
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
        assert_eq!(resp.into_string().unwrap(), "Data received");
    }
}

#[test]
fn strict_server_sends_policy_on_success_and_error() {
    let dir = site();
    let server = static_server(ServerConfig::configurable(9000, dir.path().to_path_buf(), CspMode::Strict));

    let resp = get(&server.url("/index.html"));
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.header("Content-Security-Policy"), Some("script-src 'self'"));
    assert!(resp.into_string().unwrap().contains("script.js"));

    let resp = get(&server.url("/does-not-exist.html"));
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.header("Content-Security-Policy"), Some("script-src 'self'"));
}

#[test]
fn unprotected_server_sends_no_policy() {
    let dir = site();
    let server = static_server(ServerConfig::configurable(8080, dir.path().to_path_buf(), CspMode::Disabled));

    for path in &["/", "/script.js", "/nope"] {
        let resp = get(&server.url(path));
        assert_eq!(resp.header("Content-Security-Policy"), None, "{}", path);
        assert_eq!(resp.header("Cache-Control"), None, "{}", path);
    }
}

#[test]
fn minimal_server_always_defeats_caching() {
    let dir = site();
    for mode in vec![CspMode::Disabled, CspMode::Strict] {
        let mut config = ServerConfig::minimal(mode);
        config.dist = dir.path().to_path_buf();
        let server = static_server(config);

        for path in &["/", "/script.js", "/nope"] {
            let resp = get(&server.url(path));
            assert_eq!(resp.header("Cache-Control"), Some("no-store, no-cache, must-revalidate, max-age=0"));
            assert_eq!(resp.header("Pragma"), Some("no-cache"));
            assert_eq!(resp.header("Expires"), Some("0"));
            assert_eq!(resp.header("Content-Security-Policy").is_some(), mode == CspMode::Strict);
        }
    }
}
