use anyhow::{Context, Result};
use labhttp::{files::StaticFiles, with_headers, Server, WithHeaders};

use super::access_log::{AccessLog, AccessLogStyle};
use super::config::{ServerConfig, Variant};
use super::exfil::{self, ExfilLogger};

pub type StaticHandler = AccessLog<WithHeaders<StaticFiles>>;

/// File serving for `config.dist`, with the configured response headers
/// and access logging layered on top.
pub fn static_handler(config: &ServerConfig) -> StaticHandler {
    let files = StaticFiles::new(config.dist.clone());
    AccessLog::new(with_headers(files, config.response_headers()), config.access_log_style())
}

pub fn startup_message(config: &ServerConfig) -> String {
    match config.variant {
        Variant::Minimal => format!("Serving {} (CSP: {})\n", config.url(), config.csp_mode),
        Variant::Configurable => {
            let rule = "=".repeat(60);
            format!(
                "{rule}\n\
                XSS/CSP Demo Server\n\
                {rule}\n\
                Server running on: {url}\n\
                CSP Mode: {mode}\n  \
                - {effect}\n\
                Serving files from: {dist}\n\
                {rule}\n\
                Press Ctrl+C to stop the server\n\n",
                rule = rule,
                url = config.url(),
                mode = config.csp_mode.as_str().to_uppercase(),
                effect = config.csp_mode.effect(),
                dist = config.dist.to_string_lossy())
        }
    }
}

/// Runs one of the static servers until interrupted. `config` should
/// already have been through `ServerConfig::resolve`.
pub fn serve_static(config: ServerConfig) -> Result<()> {
    let server = Server::bind((config.host.as_str(), config.port))
        .with_context(|| format!("Binding {}:{}", config.host, config.port))?;
    log::info!("Serving {} on {}", config.dist.to_string_lossy(), server.local_addr());

    print!("{}", startup_message(&config));
    stop_on_interrupt(&server)?;

    server.serve(&static_handler(&config));

    println!("\n\nShutting down server...");
    Ok(())
}

pub fn serve_exfil() -> Result<()> {
    let server = Server::bind((exfil::HOST, exfil::PORT))
        .with_context(|| format!("Binding {}:{}", exfil::HOST, exfil::PORT))?;
    log::info!("Exfiltration logger on {}", server.local_addr());

    print!("{}", exfil::startup_banner());
    stop_on_interrupt(&server)?;

    server.serve(&AccessLog::new(ExfilLogger::new(), AccessLogStyle::Off));

    println!("\n\nShutting down server...");
    Ok(())
}

fn stop_on_interrupt(server: &Server) -> Result<()> {
    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        log::debug!("Interrupt received");
        shutdown.shutdown();
    })
    .context("Installing Ctrl-C handler")
}
