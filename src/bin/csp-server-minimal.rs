use std::{env, process};

use xss_lab::config::{self, ServerConfig};
use xss_lab::{app, Result};

fn main() -> Result<()> {
    pretty_env_logger::init_timed();

    let csp_mode = match config::parse_minimal_args(env::args().skip(1)) {
        Ok(mode) => mode,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    let config = match ServerConfig::minimal(csp_mode).resolve() {
        Ok(config) => config,
        Err(e) => {
            println!("Error: {}", e);
            process::exit(1);
        }
    };

    app::serve_static(config)
}
