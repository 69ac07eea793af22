use std::ffi::OsString;
use std::path::PathBuf;

use clap::{App, Arg, ArgGroup, ArgMatches};

use super::config::{ServerConfig, DEFAULT_DIST, DEFAULT_PORT};
use super::csp::CspMode;

const EXAMPLES: &str = "\
Examples:
  csp-server --no-csp          Run without CSP (XSS works)
  csp-server --strict-csp      Run with strict CSP (XSS blocked)
  csp-server --no-csp -p 3000  Run on port 3000 without CSP";

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("csp-server")
        .version(clap::crate_version!())
        .about("HTTP server for XSS/CSP demonstration")
        .after_help(EXAMPLES)
        .arg(
            Arg::with_name("no-csp")
                .long("no-csp")
                .help("Run without CSP headers (allows XSS)"))
        .arg(
            Arg::with_name("strict-csp")
                .long("strict-csp")
                .help("Run with strict CSP: script-src 'self' (blocks XSS)"))
        .group(
            ArgGroup::with_name("csp-mode")
                .args(&["no-csp", "strict-csp"])
                .required(true))
        .arg(
            Arg::with_name("port")
                .long("port")
                .short("p")
                .help("Port to run the server on")
                .takes_value(true)
                .default_value("8080")
                .validator(validate_port))
        .arg(
            Arg::with_name("dist")
                .long("dist")
                .short("d")
                .help("Path to the frontend files")
                .takes_value(true)
                .default_value(DEFAULT_DIST))
}

/// Parses a full argument list (program name first).
pub fn parse<I, T>(args: I) -> Result<ServerConfig, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app().get_matches_from_safe(args)?;
    Ok(config_from(&matches))
}

fn config_from(matches: &ArgMatches) -> ServerConfig {
    let csp_mode = if matches.is_present("strict-csp") {
        CspMode::Strict
    } else {
        CspMode::Disabled
    };
    let port = matches.value_of("port")
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let dist = PathBuf::from(matches.value_of("dist").unwrap_or(DEFAULT_DIST));

    ServerConfig::configurable(port, dist, csp_mode)
}

fn validate_port(value: String) -> Result<(), String> {
    value.parse::<u16>()
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a valid port number", value))
}
