//! Demonstration servers for an XSS/CSP walkthrough.
//!
//! `csp-server` and `csp-server-minimal` serve a prebuilt frontend with or
//! without a `Content-Security-Policy` header; `exfil-logger` prints
//! whatever an injected payload sends it.

pub mod access_log;
pub mod app;
pub mod cli;
pub mod config;
pub mod csp;
pub mod exfil;

pub use anyhow::Result;
