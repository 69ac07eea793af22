use std::env;
use std::io;
use std::path::PathBuf;

use labhttp::Headers;

use super::access_log::AccessLogStyle;
use super::csp::{self, CspMode};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DIST: &str = "some-frontend";
pub const MINIMAL_USAGE: &str = "Usage: csp-server-minimal [--no-csp | --strict-csp]";

/// Which of the two static servers a configuration belongs to. Decides the
/// startup output and the access-log format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Configurable,
    Minimal,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dist: PathBuf,
    pub csp_mode: CspMode,
    pub extra_headers: Headers,
    pub variant: Variant,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Distribution directory not found: {}", .0.to_string_lossy())]
    DistNotFound(PathBuf),
    #[error("directory not found: {}", .0.to_string_lossy())]
    DirectoryNotFound(PathBuf),
    #[error("{}", MINIMAL_USAGE)]
    Usage,
    #[error("Unable to determine current working directory: {0}")]
    WorkingDirectory(#[source] io::Error),
}

impl Error {
    /// A follow-up line telling the operator how to fix things, if there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::DistNotFound(_) => Some(format!(
                "Please build the frontend first so its static files are available (e.g. in ./{})",
                DEFAULT_DIST)),
            _ => None,
        }
    }
}

impl ServerConfig {
    pub fn configurable(port: u16, dist: PathBuf, csp_mode: CspMode) -> Self {
        ServerConfig {
            host: "0.0.0.0".into(),
            port,
            dist,
            csp_mode,
            extra_headers: Headers::default(),
            variant: Variant::Configurable,
        }
    }

    pub fn minimal(csp_mode: CspMode) -> Self {
        ServerConfig {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            dist: PathBuf::from(DEFAULT_DIST),
            csp_mode,
            extra_headers: csp::cache_busting_headers(),
            variant: Variant::Minimal,
        }
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Headers every response from this server carries.
    pub fn response_headers(&self) -> Headers {
        let mut headers = self.csp_mode.headers();
        headers.extend(&self.extra_headers);
        headers
    }

    pub fn access_log_style(&self) -> AccessLogStyle {
        match self.variant {
            Variant::Configurable => AccessLogStyle::Timestamped,
            Variant::Minimal => AccessLogStyle::Standard,
        }
    }

    /// Makes `dist` absolute and checks that it is a directory.
    pub fn resolve(mut self) -> Result<Self, Error> {
        let absolute = if self.dist.is_absolute() {
            self.dist.clone()
        } else {
            env::current_dir().map_err(Error::WorkingDirectory)?.join(&self.dist)
        };

        if !absolute.is_dir() {
            log::debug!("Serve directory missing: {}", absolute.to_string_lossy());
            return Err(match self.variant {
                Variant::Configurable => Error::DistNotFound(absolute),
                Variant::Minimal => Error::DirectoryNotFound(self.dist),
            });
        }

        self.dist = absolute.canonicalize().unwrap_or(absolute);
        Ok(self)
    }
}

/// The minimal server takes exactly one argument, and it has to be one of
/// the two CSP flags.
pub fn parse_minimal_args<I, S>(args: I) -> Result<CspMode, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<S> = args.into_iter().collect();
    match args.as_slice() {
        [flag] => CspMode::from_flag(flag.as_ref()).ok_or(Error::Usage),
        _ => Err(Error::Usage),
    }
}
